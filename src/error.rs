//! Crate-wide error type.
//!
//! Errors fall in three buckets:
//!
//! - **Per-article** (`Missing*`, `Status`, `Timeout`, parse and IO failures):
//!   the article is reported and the batch moves on.
//! - **Transient** (see [`Error::is_transient`]): absorbed by the retry policy
//!   and never seen above it unless retries are bounded.
//! - **Fatal** (see [`Error::is_fatal`]): an area name missing from the known
//!   table, or a database that could not be initialised. These abort the run.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{url} has no valid date in 'DCTERMS.issued' or 'DC.date' (found {found:?})")]
    MissingDate { url: String, found: Option<String> },

    #[error("{url} has no handle identifier in 'DC.identifier'")]
    MissingIdentifier { url: String },

    #[error("{url} has no title in 'DC.title' or 'citation_title'")]
    MissingTitle { url: String },

    #[error("{url} has no known area in 'DC.subject'")]
    MissingArea { url: String },

    #[error("Unexpected area name '{0}', the area table needs updating")]
    UnknownAreaName(String),

    #[error("No area matches '{0}'")]
    AreaNotFound(String),

    #[error("Cannot derive an article id from '{0}'")]
    InvalidArticleUrl(String),

    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("GET {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Cannot initialise database {path}: {reason}")]
    DatabaseInit { path: PathBuf, reason: String },

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Url Error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database Error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}

impl Error {
    /// Failures worth another attempt: transport errors, timeouts, and
    /// throttling or server-side HTTP statuses.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            Error::Reqwest(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }

    /// Failures that abort the whole run instead of a single article.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::UnknownAreaName(_) | Error::DatabaseInit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        let status = |code: u16| Error::Status {
            url: "/x".into(),
            status: StatusCode::from_u16(code).unwrap(),
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(
            Error::Timeout {
                url: "/x".into(),
                after: Duration::from_secs(10)
            }
            .is_transient()
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::UnknownAreaName("X".into()).is_fatal());
        assert!(!Error::MissingTitle { url: "/x".into() }.is_fatal());
        assert!(!Error::MissingArea { url: "/x".into() }.is_fatal());
    }
}
