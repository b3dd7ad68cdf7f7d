//! On-disk article cache.
//!
//! One pretty-printed JSON file per article under `<cache_dir>/pubs/<id>.json`.
//! Serialization is deterministic (fixed field order, two-space indentation),
//! so writing an unchanged record produces identical bytes, and such writes
//! are skipped altogether.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::models::Article;

#[derive(Debug, Clone)]
pub struct ArticleCache {
    dir: PathBuf,
}

impl ArticleCache {
    /// A cache rooted at `<cache_dir>/pubs`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join("pubs"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Read a cached article.
    ///
    /// A missing file is `None`. So is a file that no longer deserializes;
    /// it is logged and will be overwritten by the next successful fetch.
    pub async fn read(&self, id: &str) -> Result<Option<Article>> {
        let path = self.path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(article) => Ok(Some(article)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache entry; treating as missing");
                Ok(None)
            }
        }
    }

    /// Combine an optional cached record with a freshly resolved one.
    pub fn merge(existing: Option<&Article>, patch: Article) -> Article {
        match existing {
            Some(existing) => existing.merge(&patch),
            None => patch,
        }
    }

    /// Persist `article` under `id`. Returns `false` when the file already
    /// held exactly these bytes and nothing was written.
    #[instrument(level = "debug", skip(self, article))]
    pub async fn write(&self, id: &str, article: &Article) -> Result<bool> {
        let json = serde_json::to_string_pretty(article)?;
        let path = self.path(id);

        match fs::read(&path).await {
            Ok(current) if current == json.as_bytes() => {
                debug!("Cache entry unchanged");
                return Ok(false);
            }
            _ => {}
        }

        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, json).await?;
        debug!(path = %path.display(), "Wrote cache entry");
        Ok(true)
    }

    /// Ids of all cached articles, sorted.
    pub async fn ids(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
