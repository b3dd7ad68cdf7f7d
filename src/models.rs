//! Data models for cached publications and their derived representations.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Area`]: A top-level research area of the repository's subject taxonomy
//! - [`MetaField`]: One raw `<meta>` entry scraped from an article page
//! - [`Author`]: An author or collaborator, keyed by profile slug
//! - [`Article`]: The cached record of one publication
//! - [`ArticleSummary`] and [`KeywordSummary`]: Derived index output
//!
//! The models serialize with PascalCase field names to match the cache and
//! index files consumed by the browser front-end.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A top-level research area.
///
/// The `id` is the repository's internal subject code, derived from the
/// name by [`crate::scrapers::areas::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Area {
    pub id: u32,
    pub name: String,
}

/// An area as listed on the subject page, with its advertised article count.
///
/// The count is a display hint only; crawling never uses it to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedArea {
    pub area: Area,
    pub count: u32,
}

/// One `<meta name=.. content=..>` entry from an article's `<head>`.
///
/// Names repeat freely (an article has many `DC.subject` entries, for example).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetaField {
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl MetaField {
    pub fn new(name: impl Into<String>, content: impl Into<String>, lang: Option<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            lang,
        }
    }
}

/// An author or collaborator.
///
/// `id` is the trailing segment of the author's `/author/<id>` profile URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// The cached record of one publication.
///
/// Records are treated as immutable values: a re-fetch produces a patch that
/// is combined with the cached record through [`Article::merge`], which only
/// ever fills fields that are still empty.
///
/// # JSON Schema
///
/// ```text
/// { "Area": {..}?, "Title": ..?, "Handle": .., "Date": "YYYY-MM-DD",
///   "Metadata": [..], "Authors": [..], "Collaborators": [..] }
/// ```
///
/// Null fields are omitted on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Article {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub handle: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub metadata: Vec<MetaField>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub collaborators: Vec<Author>,
}

impl Article {
    /// Content of the first metadata field called `name`.
    pub fn meta(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.content.as_str())
    }

    /// Title as recorded, falling back to `DC.title` / `citation_title` in the metadata.
    pub fn title_from_metadata(&self) -> Option<&str> {
        self.meta("DC.title").or_else(|| self.meta("citation_title"))
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// An article is trustworthy as cached when it has an area and at least one author.
    ///
    /// Incomplete articles are re-fetched wherever they are consumed.
    pub fn is_complete(&self) -> bool {
        self.area.is_some() && !self.authors.is_empty()
    }

    /// Combine this cached record with a freshly resolved `patch`.
    ///
    /// Scalar fields keep their existing value and are only filled from the
    /// patch when still empty. Lists are ordered unions: existing entries
    /// first, then patch entries not already present.
    pub fn merge(&self, patch: &Article) -> Article {
        Article {
            area: self.area.clone().or_else(|| patch.area.clone()),
            title: self.title.clone().or_else(|| patch.title.clone()),
            handle: if self.handle.is_empty() {
                patch.handle.clone()
            } else {
                self.handle.clone()
            },
            date: self.date,
            metadata: union_by(&self.metadata, &patch.metadata, |a, b| a == b),
            authors: union_by(&self.authors, &patch.authors, |a, b| a.id == b.id),
            collaborators: union_by(&self.collaborators, &patch.collaborators, |a, b| {
                a.id == b.id
            }),
        }
    }
}

fn union_by<T: Clone>(base: &[T], extra: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<T> {
    let mut merged = base.to_vec();
    for item in extra {
        if !merged.iter().any(|m| same(m, item)) {
            merged.push(item.clone());
        }
    }
    merged
}

/// One entry of a per-area index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArticleSummary {
    pub title: String,
    /// The article's canonical handle URL.
    pub url: String,
    pub year: i32,
    pub tags: Vec<String>,
}

/// A keyword and how many articles of the area carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeywordCount {
    pub key: String,
    pub value: u64,
}

/// Keyword frequencies of one area, ordered by descending frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeywordSummary {
    pub area: Area,
    pub keywords: Vec<KeywordCount>,
}
