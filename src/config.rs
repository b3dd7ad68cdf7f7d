//! YAML configuration.
//!
//! Every field is optional; an empty or missing file gives the built-in
//! configuration:
//!
//! ```yaml
//! base_url: https://ri.conicet.gov.ar
//! user_agent: conicet-scrap/0.1
//! cache_dir: cache
//! database: cache/conicet.db       # defaults to <cache_dir>/conicet.db
//! database_template: empty.db      # copied when the database is missing
//! retry:
//!   max_retries: ~                 # unbounded
//!   backoff: linear
//!   delay_secs: 5
//!   max_delay_secs: 60
//!   jitter_ms: 1000
//!   attempt_timeout_secs: 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::resilience::{Backoff, RetryPolicy};

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "conicet.yaml";

pub const DEFAULT_DATABASE_FILE: &str = "conicet.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub user_agent: String,
    /// Root of the article cache and of the index files.
    pub cache_dir: PathBuf,
    pub database: Option<PathBuf>,
    pub database_template: Option<PathBuf>,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://ri.conicet.gov.ar".to_string(),
            user_agent: concat!("conicet-scrap/", env!("CARGO_PKG_VERSION")).to_string(),
            cache_dir: PathBuf::from("cache"),
            database: None,
            database_template: None,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: Option<usize>,
    pub backoff: Backoff,
    pub delay_secs: u64,
    pub max_delay_secs: u64,
    pub jitter_ms: u64,
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            backoff: Backoff::Linear,
            delay_secs: 5,
            max_delay_secs: 60,
            jitter_ms: 1000,
            attempt_timeout_secs: 10,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        policy.max_retries = self.max_retries;
        policy.backoff = self.backoff;
        policy.delay = Duration::from_secs(self.delay_secs);
        policy.max_delay = Duration::from_secs(self.max_delay_secs);
        policy.jitter = Duration::from_millis(self.jitter_ms);
        policy.attempt_timeout = Duration::from_secs(self.attempt_timeout_secs);
        policy
    }
}

impl Config {
    /// Load from `path`, else from [`DEFAULT_CONFIG_FILE`] when present, else
    /// fall back to defaults.
    ///
    /// # Errors
    ///
    /// An explicit `path` that cannot be read, or any file that is not valid
    /// YAML for this structure.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No configuration file, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.cache_dir.join(DEFAULT_DATABASE_FILE))
    }
}
