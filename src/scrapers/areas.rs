//! Research-area taxonomy.
//!
//! The subject page (`/subject/`) lists the top-level areas as
//! `<span>NAME</span><span>[COUNT]</span>` pairs. The numeric subject code of
//! each area is not on that page; it comes from a fixed table of name
//! fragments (mirroring the site's own `cargarArea` script), evaluated in
//! order after accents are stripped. A name matching none of them is fatal:
//! the table needs updating.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{Area, ListedArea};
use crate::resilience::PageSource;
use crate::utils::strip_accents;

pub const SUBJECT_PATH: &str = "/subject/";

/// Ordered `(fragment, subject code)` pairs. First match wins.
pub const AREA_CODES: &[(&str, u32)] = &[
    ("NATURALES", 1),
    ("TECNOLOGIAS", 53),
    ("MEDICAS", 108),
    ("AGRICOLAS", 174),
    ("SOCIALES", 192),
    ("HUMANIDADES", 225),
];

static ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("#aspect_conicet_VerArea_list_nivel1 .ds-simple-list-item").unwrap()
});
static SPAN_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static NAME_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(.+?)\s*\[(\d+)\]\s*$").unwrap());

/// Resolve an area name to its subject code.
///
/// # Errors
///
/// [`Error::UnknownAreaName`] when no fragment matches.
pub fn resolve(name: &str) -> Result<u32> {
    let normalized = strip_accents(name);
    AREA_CODES
        .iter()
        .find(|(fragment, _)| normalized.contains(fragment))
        .map(|(_, code)| *code)
        .ok_or_else(|| Error::UnknownAreaName(name.to_string()))
}

/// Parse the subject page into areas with their advertised counts.
pub fn parse_areas(html: &str) -> Result<Vec<ListedArea>> {
    let document = Html::parse_document(html);
    let mut areas = Vec::new();

    for item in document.select(&ITEM_SELECTOR) {
        let spans: Vec<String> = item
            .select(&SPAN_SELECTOR)
            .map(|s| s.text().collect::<String>())
            .collect();

        let (name, count) = if spans.len() == 2 {
            (spans[0].trim().to_string(), spans[1].trim().to_string())
        } else {
            let text = item.text().collect::<String>();
            match NAME_COUNT.captures(&text) {
                Some(caps) => (caps[1].to_string(), caps[2].to_string()),
                None => continue,
            }
        };

        let count = match count.trim_matches(|c| c == '[' || c == ']').parse::<u32>() {
            Ok(count) => count,
            Err(e) => {
                warn!(%name, %count, error = %e, "Skipping area with unreadable count");
                continue;
            }
        };

        areas.push(ListedArea {
            area: Area {
                id: resolve(&name)?,
                name,
            },
            count,
        });
    }

    Ok(areas)
}

/// Which areas an operation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaSelection {
    All,
    /// Areas whose name contains this text, ignoring case and accents.
    Named(String),
}

/// The site's areas, fetched once per run.
#[derive(Debug)]
pub struct AreaCatalog<S> {
    source: S,
    areas: OnceCell<Vec<ListedArea>>,
}

impl<S: PageSource> AreaCatalog<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            areas: OnceCell::new(),
        }
    }

    /// All areas in page order.
    #[instrument(level = "info", skip_all)]
    pub async fn list_areas(&self) -> Result<&[ListedArea]> {
        let areas = self
            .areas
            .get_or_try_init(|| async {
                let html = self.source.get(SUBJECT_PATH).await?;
                let areas = parse_areas(&html)?;
                info!(count = areas.len(), "Loaded area catalog");
                Ok::<_, Error>(areas)
            })
            .await?;
        Ok(areas)
    }

    /// Areas covered by `selection`.
    ///
    /// # Errors
    ///
    /// [`Error::AreaNotFound`] when a named selection matches nothing.
    pub async fn select(&self, selection: &AreaSelection) -> Result<Vec<ListedArea>> {
        let areas = self.list_areas().await?;
        match selection {
            AreaSelection::All => Ok(areas.to_vec()),
            AreaSelection::Named(query) => {
                let query = strip_accents(query).to_uppercase();
                let selected: Vec<ListedArea> = areas
                    .iter()
                    .filter(|a| strip_accents(&a.area.name).to_uppercase().contains(&query))
                    .cloned()
                    .collect();
                if selected.is_empty() {
                    Err(Error::AreaNotFound(query))
                } else {
                    Ok(selected)
                }
            }
        }
    }
}
