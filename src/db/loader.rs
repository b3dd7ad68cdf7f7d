//! Cache -> database loading.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use crate::db::{AuthorRow, Database, PublicationRow};
use crate::error::Result;
use crate::indexer::{KEYWORDS_FIELD, MIN_YEAR, parse_keywords};
use crate::models::{Area, Article, Author};
use crate::resilience::PageSource;
use crate::scrapers::article::ArticleFetcher;
use crate::scrapers::author::{AuthorProfile, fetch_profile};
use crate::utils::article_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub inserted: usize,
    /// Already in the database.
    pub existing: usize,
    /// Eligible but inside the `skip` window.
    pub skipped: usize,
    pub failed: usize,
}

pub struct Loader<'a, S> {
    fetcher: &'a ArticleFetcher<S>,
    db: &'a Database,
}

impl<'a, S: PageSource> Loader<'a, S> {
    pub fn new(fetcher: &'a ArticleFetcher<S>, db: &'a Database) -> Self {
        Self { fetcher, db }
    }

    /// Insert cached publications, in id order, into the database.
    ///
    /// Articles older than [`MIN_YEAR`] are ignored. Incomplete ones are
    /// refreshed first and ignored if they stay incomplete. The first `skip`
    /// eligible articles are passed over, and loading stops once `take` new
    /// publications were inserted.
    ///
    /// # Errors
    ///
    /// Fatal errors abort; any other failure is logged against its article.
    #[instrument(level = "info", skip(self))]
    pub async fn load(&self, skip: usize, take: Option<usize>) -> Result<LoadStats> {
        let mut stats = LoadStats::default();
        if take == Some(0) {
            return Ok(stats);
        }

        let cache = self.fetcher.cache();
        let mut eligible = 0;

        for id in cache.ids().await? {
            let Some(article) = cache.read(&id).await? else {
                continue;
            };
            if article.year() < MIN_YEAR {
                continue;
            }

            let article = match self.fetcher.ensure_complete(article).await {
                Ok(article) => article,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%id, error = %e, "Could not refresh article; skipping");
                    stats.failed += 1;
                    continue;
                }
            };
            if article.year() < MIN_YEAR {
                continue;
            }
            let Some(area) = article.area.clone().filter(|_| article.is_complete()) else {
                warn!(%id, "Article is still incomplete; skipping");
                continue;
            };

            if eligible < skip {
                eligible += 1;
                stats.skipped += 1;
                continue;
            }
            eligible += 1;

            let pub_id = article_id(&article.handle).unwrap_or_else(|| id.clone());
            match self.load_one(pub_id, area, &article).await {
                Ok(true) => {
                    stats.inserted += 1;
                    info!(%id, inserted = stats.inserted, "Loaded publication");
                    if take.is_some_and(|take| stats.inserted >= take) {
                        break;
                    }
                }
                Ok(false) => {
                    debug!(%id, "Publication already loaded");
                    stats.existing += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%id, error = %e, "Could not load publication");
                    stats.failed += 1;
                }
            }
        }

        info!(
            inserted = stats.inserted,
            existing = stats.existing,
            skipped = stats.skipped,
            failed = stats.failed,
            "Load finished"
        );
        Ok(stats)
    }

    async fn load_one(&self, pub_id: String, area: Area, article: &Article) -> Result<bool> {
        if self.db.has_publication(&pub_id).await? {
            return Ok(false);
        }

        let ids = article
            .authors
            .iter()
            .chain(&article.collaborators)
            .map(|a| a.id.clone())
            .collect();
        let known = self.db.known_authors(ids).await?;

        // profiles are fetched before the transaction opens
        let mut profiles: HashMap<String, AuthorProfile> = HashMap::new();
        for author in article.authors.iter().chain(&article.collaborators) {
            if known.contains(&author.id) || profiles.contains_key(&author.id) {
                continue;
            }
            let profile = fetch_profile(self.fetcher.source(), &author.id).await?;
            profiles.insert(author.id.clone(), profile);
        }
        let rows = |authors: &[Author]| -> Vec<AuthorRow> {
            authors
                .iter()
                .map(|a| AuthorRow {
                    id: a.id.clone(),
                    name: a.name.clone(),
                    profile: profiles.get(&a.id).cloned(),
                })
                .collect()
        };

        let row = PublicationRow {
            id: pub_id,
            area,
            title: article
                .title
                .as_deref()
                .or_else(|| article.title_from_metadata())
                .unwrap_or_default()
                .to_string(),
            url: article.handle.clone(),
            date: article.date,
            authors: rows(&article.authors),
            collaborators: rows(&article.collaborators),
            tags: article.meta(KEYWORDS_FIELD).map(parse_keywords).unwrap_or_default(),
            metadata: article.metadata.clone(),
        };
        self.db.insert_publication(row).await
    }
}
