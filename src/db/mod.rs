//! Normalized SQLite store for cached publications.
//!
//! # Submodules
//!
//! - [`schema`]: table definitions, applied idempotently on open
//! - [`interner`]: string -> id interning for metadata and keywords
//! - [`loader`]: walks the article cache and inserts publications
//!
//! Every publication is written in a single transaction together with the
//! strings, metadata rows, area and authors it introduces, so an interrupted
//! load leaves no partial publication behind.

pub mod interner;
pub mod loader;
pub mod schema;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};
use tokio::fs;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Area, MetaField};
use crate::scrapers::author::AuthorProfile;

use interner::Interner;
use schema::SCHEMA;

/// An author or collaborator of a publication.
///
/// `profile` is only set for authors missing from the `author` table; known
/// authors are referenced by id without being rewritten.
#[derive(Debug, Clone)]
pub struct AuthorRow {
    pub id: String,
    pub name: String,
    pub profile: Option<AuthorProfile>,
}

/// Everything needed to insert one `pub` row and its dependencies.
#[derive(Debug, Clone)]
pub struct PublicationRow {
    pub id: String,
    pub area: Area,
    pub title: String,
    pub url: String,
    pub date: NaiveDate,
    pub authors: Vec<AuthorRow>,
    pub collaborators: Vec<AuthorRow>,
    pub tags: Vec<String>,
    pub metadata: Vec<MetaField>,
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open the database at `path`, initialising it first when missing.
    ///
    /// A missing file is copied from `template` when one is given and exists,
    /// otherwise it is created empty. The schema is applied in both cases, so
    /// a template holding only some of the tables is completed on open.
    ///
    /// # Errors
    ///
    /// Any failure here is reported as the fatal [`Error::DatabaseInit`].
    pub async fn open_or_init(path: &Path, template: Option<&Path>) -> Result<Self> {
        let init_error = |reason: String| Error::DatabaseInit {
            path: path.to_path_buf(),
            reason,
        };

        if !fs::try_exists(path).await.unwrap_or(false) {
            warn!(path = %path.display(), "Database not found, initialising");
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| init_error(e.to_string()))?;
            }
            match template {
                Some(template) if fs::try_exists(template).await.unwrap_or(false) => {
                    fs::copy(template, path)
                        .await
                        .map_err(|e| init_error(format!("copying {}: {e}", template.display())))?;
                    info!(template = %template.display(), "Copied database template");
                }
                Some(template) => {
                    warn!(template = %template.display(), "Database template not found, creating from schema");
                }
                None => debug!("Creating database from schema"),
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| init_error(e.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| init_error(e.to_string()))?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn has_publication(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let found = self
            .conn
            .call(move |conn| {
                let found = conn
                    .query_row("SELECT 1 FROM pub WHERE id = ?1", params![id], |_| Ok(()))
                    .optional()?;
                Ok(found.is_some())
            })
            .await?;
        Ok(found)
    }

    /// The subset of `ids` already present in the `author` table.
    pub async fn known_authors(&self, ids: Vec<String>) -> Result<HashSet<String>> {
        let known = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT 1 FROM author WHERE id = ?1")?;
                let mut known = HashSet::new();
                for id in ids {
                    if stmt.exists(params![id])? {
                        known.insert(id);
                    }
                }
                Ok(known)
            })
            .await?;
        Ok(known)
    }

    /// Insert a publication with its strings, metadata, area and new authors.
    ///
    /// Returns `false` without writing anything when a `pub` row with the
    /// same id already exists.
    pub async fn insert_publication(&self, row: PublicationRow) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let exists = tx
                    .query_row("SELECT 1 FROM pub WHERE id = ?1", params![row.id], |_| Ok(()))
                    .optional()?
                    .is_some();
                if exists {
                    return Ok(false);
                }

                let (tags, metas) = {
                    let mut interner = Interner::new(&tx);
                    let tags = row
                        .tags
                        .iter()
                        .map(|tag| interner.intern(tag))
                        .collect::<rusqlite::Result<Vec<_>>>()?;

                    let mut metas = Vec::with_capacity(row.metadata.len());
                    for meta in &row.metadata {
                        let name = interner.intern(&meta.name)?;
                        let content = interner.intern(&meta.content)?;
                        let lang = meta.lang.as_deref().map(|l| interner.intern(l)).transpose()?;
                        let existing: Option<i64> = tx
                            .query_row(
                                "SELECT id FROM meta WHERE name = ?1 AND content = ?2 AND lang IS ?3",
                                params![name, content, lang],
                                |r| r.get(0),
                            )
                            .optional()?;
                        let id = match existing {
                            Some(id) => id,
                            None => {
                                tx.execute(
                                    "INSERT INTO meta (name, content, lang) VALUES (?1, ?2, ?3)",
                                    params![name, content, lang],
                                )?;
                                tx.last_insert_rowid()
                            }
                        };
                        metas.push(id);
                    }
                    (tags, metas)
                };

                tx.execute(
                    "INSERT OR IGNORE INTO area (id, name) VALUES (?1, ?2)",
                    params![row.area.id, row.area.name],
                )?;

                for author in row.authors.iter().chain(&row.collaborators) {
                    let Some(profile) = &author.profile else {
                        continue;
                    };
                    tx.execute(
                        "INSERT OR IGNORE INTO author (id, name, title, grade, field, specialty)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            author.id,
                            author.name,
                            profile.title,
                            profile.grade,
                            profile.field,
                            profile.specialty,
                        ],
                    )?;
                }

                tx.execute(
                    "INSERT INTO pub (id, area, title, url, date, authors, collabs, tags, meta)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        row.id,
                        row.area.id,
                        row.title,
                        row.url,
                        row.date.format("%Y-%m-%d").to_string(),
                        join_ids(row.authors.iter().map(|a| &a.id)),
                        join_ids(row.collaborators.iter().map(|a| &a.id)),
                        join_ids(&tags),
                        join_ids(&metas),
                    ],
                )?;

                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(inserted)
    }

    #[cfg(test)]
    pub async fn count(&self, table: &'static str) -> Result<i64> {
        let count = self
            .conn
            .call(move |conn| {
                let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub async fn query_string(&self, sql: &'static str) -> Result<String> {
        let value = self
            .conn
            .call(move |conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
            .await?;
        Ok(value)
    }
}

fn join_ids<I>(ids: I) -> String
where
    I: IntoIterator,
    I::Item: ToString,
{
    ids.into_iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}
