//! Command-line interface definitions.
//!
//! One subcommand per pipeline stage, plus `sync` to run crawl and index
//! back to back. The configuration file can also be given through the
//! `CONICET_CONFIG` environment variable.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::scrapers::areas::AreaSelection;

/// Crawl the CONICET institutional repository into a local cache, keyword
/// indexes and a SQLite database.
///
/// # Examples
///
/// ```sh
/// # Crawl one area, resuming at listing page 12
/// conicet scrap --area sociales --page 12
///
/// # Rebuild the keyword indexes of every area
/// conicet index --all
///
/// # Load 500 publications after the first 1000
/// conicet populate --skip 1000 --take 500
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "CONICET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a single article into the cache
    Fetch {
        /// Article URL, absolute or relative to the site
        url: String,

        /// Area to assign, matched against area names
        #[arg(short, long)]
        area: Option<String>,
    },

    /// Crawl article listings by area
    Scrap {
        #[command(flatten)]
        areas: AreaArgs,

        /// Listing page to start from
        #[arg(short, long, default_value_t = 0)]
        page: u32,
    },

    /// Write the per-area article, keyword and timeline indexes
    Index {
        #[command(flatten)]
        areas: AreaArgs,
    },

    /// Load cached articles into the SQLite database
    Populate {
        /// Eligible articles to pass over before loading
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Stop after this many publications were inserted
        #[arg(long)]
        take: Option<usize>,
    },

    /// Crawl and then index every area
    Sync,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct AreaArgs {
    /// Process every area
    #[arg(long)]
    pub all: bool,

    /// Process the areas whose name contains this text (case and accents ignored)
    #[arg(short, long)]
    pub area: Option<String>,
}

impl AreaArgs {
    pub fn selection(&self) -> AreaSelection {
        match &self.area {
            Some(name) if !self.all => AreaSelection::Named(name.clone()),
            _ => AreaSelection::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_fetch() {
        let cli = Cli::parse_from([
            "conicet",
            "fetch",
            "https://ri.conicet.gov.ar/handle/11336/1",
            "--area",
            "sociales",
        ]);

        match cli.command {
            Command::Fetch { url, area } => {
                assert_eq!(url, "https://ri.conicet.gov.ar/handle/11336/1");
                assert_eq!(area.as_deref(), Some("sociales"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_scrap_short_flags() {
        let cli = Cli::parse_from(["conicet", "scrap", "-a", "médicas", "-p", "3"]);

        match cli.command {
            Command::Scrap { areas, page } => {
                assert_eq!(areas.selection(), AreaSelection::Named("médicas".into()));
                assert_eq!(page, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_index_all() {
        let cli = Cli::parse_from(["conicet", "index", "--all"]);

        match cli.command {
            Command::Index { areas } => assert_eq!(areas.selection(), AreaSelection::All),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_area_choice() {
        assert!(Cli::try_parse_from(["conicet", "index"]).is_err());
        assert!(Cli::try_parse_from(["conicet", "scrap", "--all", "--area", "x"]).is_err());
    }

    #[test]
    fn test_cli_populate_window() {
        let cli = Cli::parse_from(["conicet", "populate", "--skip", "10", "--take", "5"]);

        match cli.command {
            Command::Populate { skip, take } => {
                assert_eq!(skip, 10);
                assert_eq!(take, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_config() {
        let cli = Cli::parse_from(["conicet", "sync", "--config", "/etc/conicet.yaml"]);

        assert!(matches!(cli.command, Command::Sync));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/conicet.yaml")));
    }
}
