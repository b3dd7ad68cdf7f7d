//! Keyword and timeline aggregation over the article cache.
//!
//! The indexer walks every cached article once, repairing incomplete ones
//! through the [`ArticleFetcher`] on the way, and buckets those with
//! `citation_keywords` into their area. Articles issued before [`MIN_YEAR`]
//! are left out.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::Result;
use crate::models::{Area, Article, ArticleSummary, KeywordCount, KeywordSummary};
use crate::resilience::PageSource;
use crate::scrapers::article::ArticleFetcher;

/// Oldest publication year included in indexes and in the database.
pub const MIN_YEAR: i32 = 2007;

pub const KEYWORDS_FIELD: &str = "citation_keywords";

/// Split a `citation_keywords` value into normalized tags.
///
/// Tokens are trimmed and lowercased; empty tokens, integers, and absolute
/// URLs are dropped. Order is kept.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     parse_keywords("Machine Learning; 123; http://x.org; IoT"),
///     vec!["machine learning", "iot"]
/// );
/// ```
pub fn parse_keywords(content: &str) -> Vec<String> {
    content
        .split(';')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .filter(|token| token.parse::<i32>().is_err())
        .filter(|token| !is_absolute_url(token))
        .collect()
}

/// A token is a URL when it parses with a host or a hierarchical path
/// (`http://x.org/a b`), or parses as a whole without any whitespace
/// (`doi:10.1000/182`). `covid-19: impacto` is a keyword.
fn is_absolute_url(token: &str) -> bool {
    match Url::parse(token) {
        Ok(url) => url.has_host() || !url.cannot_be_a_base() || !token.contains(char::is_whitespace),
        Err(_) => false,
    }
}

/// Everything the index knows about one area.
#[derive(Debug, Clone)]
pub struct AreaAggregate {
    pub area: Area,
    pub articles: Vec<ArticleSummary>,
    /// keyword -> number of articles carrying it
    pub keywords: HashMap<String, u64>,
    /// keyword -> year -> number of articles
    pub timeline: BTreeMap<String, BTreeMap<i32, u64>>,
}

impl AreaAggregate {
    pub fn new(area: Area) -> Self {
        Self {
            area,
            articles: Vec::new(),
            keywords: HashMap::new(),
            timeline: BTreeMap::new(),
        }
    }

    /// Add an article if it passes the index filters. Returns whether it was added.
    pub fn add(&mut self, article: &Article) -> bool {
        if article.year() < MIN_YEAR {
            return false;
        }
        let Some(citation) = article.meta(KEYWORDS_FIELD) else {
            return false;
        };

        let tags = parse_keywords(citation);
        let year = article.year();
        for tag in &tags {
            *self.keywords.entry(tag.clone()).or_default() += 1;
            *self
                .timeline
                .entry(tag.clone())
                .or_default()
                .entry(year)
                .or_default() += 1;
        }

        self.articles.push(ArticleSummary {
            title: article
                .title
                .as_deref()
                .or_else(|| article.title_from_metadata())
                .unwrap_or_default()
                .to_string(),
            url: article.handle.clone(),
            year,
            tags,
        });
        true
    }

    /// Keywords by descending frequency, ties in alphabetical order.
    pub fn keyword_summary(&self) -> KeywordSummary {
        let keywords = self
            .keywords
            .iter()
            .sorted_by(|(ka, va), (kb, vb)| vb.cmp(va).then_with(|| ka.cmp(kb)))
            .map(|(key, value)| KeywordCount {
                key: key.clone(),
                value: *value,
            })
            .collect();
        KeywordSummary {
            area: self.area.clone(),
            keywords,
        }
    }
}

pub struct Indexer<'a, S> {
    fetcher: &'a ArticleFetcher<S>,
}

impl<'a, S: PageSource> Indexer<'a, S> {
    pub fn new(fetcher: &'a ArticleFetcher<S>) -> Self {
        Self { fetcher }
    }

    /// Aggregate the cache into one [`AreaAggregate`] per requested area.
    ///
    /// # Errors
    ///
    /// Only fatal errors and cache directory failures abort; a failed repair
    /// skips that article.
    #[instrument(level = "info", skip_all, fields(areas = areas.len()))]
    pub async fn build_index(&self, areas: &[Area]) -> Result<Vec<AreaAggregate>> {
        let mut aggregates: Vec<AreaAggregate> =
            areas.iter().cloned().map(AreaAggregate::new).collect();
        let cache = self.fetcher.cache();
        let ids = cache.ids().await?;
        info!(cached = ids.len(), "Indexing article cache");

        for id in ids {
            let Some(article) = cache.read(&id).await? else {
                continue;
            };

            let article = match self.fetcher.ensure_complete(article).await {
                Ok(article) => article,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%id, error = %e, "Could not refresh article; skipping");
                    continue;
                }
            };

            let Some(area) = article.area.as_ref() else {
                warn!(%id, "Article still has no area; skipping");
                continue;
            };
            if let Some(aggregate) = aggregates.iter_mut().find(|a| a.area.id == area.id) {
                if !aggregate.add(&article) {
                    debug!(%id, "Article filtered out of the index");
                }
            }
        }

        for aggregate in &aggregates {
            info!(
                area = %aggregate.area.name,
                articles = aggregate.articles.len(),
                keywords = aggregate.keywords.len(),
                "Indexed area"
            );
        }
        Ok(aggregates)
    }
}
