//! Author profile pages (`/author/<id>`).

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::instrument;

use crate::error::Result;
use crate::resilience::PageSource;

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#aspect_conicet_VerAutor_table_datos tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// The labelled fields of an author's profile table. Absent labels stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorProfile {
    pub title: Option<String>,
    pub grade: Option<String>,
    pub field: Option<String>,
    pub specialty: Option<String>,
}

pub fn profile_path(author_id: &str) -> String {
    format!("/author/{author_id}")
}

/// Read the profile table by label: the first cell of a row names the field,
/// the last cell holds its value.
pub fn parse_profile(html: &str) -> AuthorProfile {
    let document = Html::parse_document(html);
    let mut profile = AuthorProfile::default();

    for row in document.select(&ROW_SELECTOR) {
        let cells: Vec<String> = row
            .select(&CELL_SELECTOR)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();
        let (Some(label), Some(value)) = (cells.first(), cells.last()) else {
            continue;
        };

        let slot = match label.as_str() {
            "Título" => &mut profile.title,
            "Grado" => &mut profile.grade,
            "Campo de aplicación" => &mut profile.field,
            "Especialidad" => &mut profile.specialty,
            _ => continue,
        };
        *slot = Some(value.clone());
    }

    profile
}

#[instrument(level = "info", skip(source))]
pub async fn fetch_profile<S: PageSource>(source: &S, author_id: &str) -> Result<AuthorProfile> {
    let html = source.get(&profile_path(author_id)).await?;
    Ok(parse_profile(&html))
}
