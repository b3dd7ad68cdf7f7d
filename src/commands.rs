//! The operations behind each subcommand.
//!
//! Every operation logs its own failures and reports a plain success flag;
//! `main` turns that into the process exit code. Per-article problems are
//! logged and skipped without failing the operation. Fatal errors and
//! failures of the operation's own inputs (the listing, the cache directory,
//! the database) fail it.

use std::path::PathBuf;
use std::pin::pin;

use futures::StreamExt;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::cache::ArticleCache;
use crate::config::Config;
use crate::db::Database;
use crate::db::loader::Loader;
use crate::error::{Error, Result};
use crate::indexer::Indexer;
use crate::models::{Area, ListedArea};
use crate::outputs::json;
use crate::resilience::PageSource;
use crate::scrapers::areas::AreaSelection;
use crate::scrapers::article::ArticleFetcher;
use crate::scrapers::listing::PageCrawler;
use crate::utils::{article_id, ensure_writable_dir};

/// What happened to one listed article during a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrawlOutcome {
    Cached,
    Repaired,
    Fetched,
}

pub struct Pipeline<S> {
    fetcher: ArticleFetcher<S>,
    crawler: PageCrawler<S>,
    output_dir: PathBuf,
    database: PathBuf,
    database_template: Option<PathBuf>,
}

impl<S: PageSource + Clone> Pipeline<S> {
    pub fn new(config: &Config, source: S) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self {
            fetcher: ArticleFetcher::new(source.clone(), ArticleCache::new(&config.cache_dir)),
            crawler: PageCrawler::new(source, base),
            output_dir: config.cache_dir.clone(),
            database: config.database_path(),
            database_template: config.database_template.clone(),
        })
    }
}

impl<S: PageSource> Pipeline<S> {
    #[cfg(test)]
    pub fn fetcher(&self) -> &ArticleFetcher<S> {
        &self.fetcher
    }

    #[cfg(test)]
    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    /// Fetch a single article, optionally pinning it to the area whose name
    /// contains `area`.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str, area: Option<&str>) -> bool {
        let known_area = match area {
            Some(name) => match self.named_area(name).await {
                Ok(area) => Some(area),
                Err(e) => {
                    error!(error = %e, "Cannot resolve area");
                    return false;
                }
            },
            None => None,
        };

        match self.fetcher.fetch(url, known_area).await {
            Ok(_) => true,
            Err(e) => {
                error!(%url, error = %e, "Fetch failed");
                false
            }
        }
    }

    async fn named_area(&self, name: &str) -> Result<Area> {
        let selected = self
            .fetcher
            .catalog()
            .select(&AreaSelection::Named(name.to_string()))
            .await?;
        selected
            .into_iter()
            .next()
            .map(|listed| listed.area)
            .ok_or_else(|| Error::AreaNotFound(name.to_string()))
    }

    /// Crawl the selected areas from `start_page`, fetching every listed
    /// article that is not already complete in the cache.
    #[instrument(level = "info", skip(self))]
    pub async fn crawl(&self, selection: &AreaSelection, start_page: u32) -> bool {
        let areas = match self.fetcher.catalog().select(selection).await {
            Ok(areas) => areas,
            Err(e) => {
                error!(error = %e, "Cannot list areas");
                return false;
            }
        };
        if let Err(e) = ensure_writable_dir(self.fetcher.cache().dir()).await {
            error!(path = %self.fetcher.cache().dir().display(), error = %e, "Cache directory is not writable");
            return false;
        }

        let mut ok = true;
        for listed in &areas {
            match self.crawl_area(listed, start_page).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    error!(area = %listed.area.name, error = %e, "Fatal error; aborting crawl");
                    return false;
                }
                Err(e) => {
                    error!(area = %listed.area.name, error = %e, "Listing failed; moving to the next area");
                    ok = false;
                }
            }
        }
        ok
    }

    async fn crawl_area(&self, listed: &ListedArea, start_page: u32) -> Result<()> {
        info!(area = %listed.area.name, count = listed.count, start_page, "Crawling area");
        let mut urls = pin!(self.crawler.crawl(listed, start_page));

        while let Some(url) = urls.next().await {
            let url = url?;
            match self.crawl_one(&url, &listed.area).await {
                Ok(outcome) => debug!(%url, ?outcome, "Article done"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(%url, error = %e, "Skipping article"),
            }
        }
        Ok(())
    }

    async fn crawl_one(&self, url: &str, area: &Area) -> Result<CrawlOutcome> {
        let id = article_id(url).ok_or_else(|| Error::InvalidArticleUrl(url.to_string()))?;
        let cache = self.fetcher.cache();

        if let Some(mut cached) = cache.read(&id).await? {
            if !cached.metadata.is_empty() && !cached.authors.is_empty() {
                if cached.area.is_some() && cached.title.is_some() {
                    return Ok(CrawlOutcome::Cached);
                }
                // enough data to repair without a network round-trip
                if cached.area.is_none() {
                    cached.area = Some(area.clone());
                }
                if cached.title.is_none() {
                    cached.title = cached.title_from_metadata().map(String::from);
                }
                cache.write(&id, &cached).await?;
                info!(%id, "Repaired cached article");
                return Ok(CrawlOutcome::Repaired);
            }
        }

        self.fetcher.fetch(url, Some(area.clone())).await?;
        Ok(CrawlOutcome::Fetched)
    }

    /// Aggregate the cache for the selected areas and write the index files.
    #[instrument(level = "info", skip(self))]
    pub async fn index(&self, selection: &AreaSelection) -> bool {
        match self.try_index(selection).await {
            Ok(paths) => {
                info!(files = paths.len(), dir = %self.output_dir.display(), "Index written");
                true
            }
            Err(e) => {
                error!(error = %e, "Indexing failed");
                false
            }
        }
    }

    async fn try_index(&self, selection: &AreaSelection) -> Result<Vec<PathBuf>> {
        let areas: Vec<Area> = self
            .fetcher
            .catalog()
            .select(selection)
            .await?
            .into_iter()
            .map(|listed| listed.area)
            .collect();
        ensure_writable_dir(&self.output_dir).await?;

        let aggregates = Indexer::new(&self.fetcher).build_index(&areas).await?;
        let mut paths = Vec::new();
        for aggregate in &aggregates {
            paths.extend(json::write_area(aggregate, &self.output_dir).await?);
        }
        paths.push(json::write_combined_keywords(&aggregates, &self.output_dir).await?);
        Ok(paths)
    }

    /// Load the cache into the database, skipping the first `skip` eligible
    /// articles and stopping after `take` insertions.
    #[instrument(level = "info", skip(self))]
    pub async fn load(&self, skip: usize, take: Option<usize>) -> bool {
        let db = match Database::open_or_init(&self.database, self.database_template.as_deref()).await {
            Ok(db) => db,
            Err(e) => {
                error!(error = %e, "Cannot open database");
                return false;
            }
        };

        match Loader::new(&self.fetcher, &db).load(skip, take).await {
            Ok(stats) => {
                info!(path = %db.path().display(), ?stats, "Database populated");
                true
            }
            Err(e) => {
                error!(error = %e, "Populate failed");
                false
            }
        }
    }

    /// Crawl every area, then index every area.
    pub async fn sync(&self) -> bool {
        if !self.crawl(&AreaSelection::All, 0).await {
            return false;
        }
        self.index(&AreaSelection::All).await
    }
}
