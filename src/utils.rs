//! Utility functions for name normalization, ids, logging, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Accent stripping for comparing area names scraped from different pages
//! - File name sanitization for per-area output files
//! - Article id derivation from listing and handle URLs
//! - String truncation for log fields
//! - File system validation for output directories

use std::fs as stdfs;
use std::path::Path;

use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;

/// Replace the accented vowels used in the area taxonomy with their plain form.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(strip_accents("TECNOLOGÍAS"), "TECNOLOGIAS");
/// ```
pub fn strip_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'Á' => 'A',
            'É' => 'E',
            'Í' => 'I',
            'Ó' => 'O',
            'Ú' | 'Ü' => 'U',
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

/// Turn an area name into a file name stem.
///
/// Accents are stripped, whitespace becomes `_`, and characters that are not
/// valid in file names on common platforms are removed.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_file_name("CIENCIAS MÉDICAS"), "CIENCIAS_MEDICAS");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    strip_accents(name.trim())
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Derive the cache id of an article from any of its URLs.
///
/// The id joins the last two path segments with `-`, so the listing URL
/// `https://ri.conicet.gov.ar/handle/11336/1234` and the handle
/// `http://hdl.handle.net/11336/1234` both map to `11336-1234`.
///
/// Returns `None` when the URL has fewer than two path segments.
pub fn article_id(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return None;
    }
    Some(segments[segments.len() - 2..].join("-"))
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("TECNOLOGÍAS"), "TECNOLOGIAS");
        assert_eq!(
            strip_accents("CIENCIAS MÉDICAS Y DE LA SALUD"),
            "CIENCIAS MEDICAS Y DE LA SALUD"
        );
        assert_eq!(strip_accents("AGRÍCOLAS"), "AGRICOLAS");
        assert_eq!(strip_accents("plain"), "plain");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("CIENCIAS MÉDICAS Y DE LA SALUD"),
            "CIENCIAS_MEDICAS_Y_DE_LA_SALUD"
        );
        assert_eq!(sanitize_file_name("A/B: C"), "AB_C");
    }

    #[test]
    fn test_article_id() {
        assert_eq!(
            article_id("https://ri.conicet.gov.ar/handle/11336/1234").as_deref(),
            Some("11336-1234")
        );
        assert_eq!(
            article_id("http://hdl.handle.net/11336/1234").as_deref(),
            Some("11336-1234")
        );
        assert_eq!(article_id("/handle/11336/99/").as_deref(), Some("11336-99"));
        assert_eq!(article_id("/handle/11336/5?show=full").as_deref(), Some("11336-5"));
        assert_eq!(article_id("/single"), None);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
        let result = truncate_for_log(&"a".repeat(500), 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
        // multi-byte characters never split
        assert!(truncate_for_log("ÍÍÍÍ", 2).starts_with("ÍÍ…"));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
