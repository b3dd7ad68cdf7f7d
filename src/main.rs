//! # CONICET Scrap
//!
//! Crawls the CONICET institutional repository (ri.conicet.gov.ar) area by
//! area and keeps a local, incrementally repaired copy of every publication's
//! metadata.
//!
//! ## Usage
//!
//! ```sh
//! conicet scrap --all
//! conicet index --all
//! conicet populate
//! ```
//!
//! ## Architecture
//!
//! 1. **Areas**: the subject page lists the research areas and their sizes
//! 2. **Crawl**: each area's paginated listing yields article URLs
//! 3. **Fetch**: article pages are parsed and merged into `pubs/<id>.json`
//! 4. **Index**: per-area article lists, keyword counts and timelines as JSON
//! 5. **Populate**: the cache is normalized into a SQLite database
//!
//! Every network request goes through one retrying [`resilience::PageSource`].

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cache;
mod cli;
mod commands;
mod config;
mod db;
mod error;
mod indexer;
mod models;
mod outputs;
mod resilience;
mod scrapers;
#[cfg(test)]
mod testing;
mod utils;

use cli::{Cli, Command};
use commands::Pipeline;
use config::Config;
use resilience::{HttpSource, Resilient};

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    let config = Config::load(args.config.as_deref())?;
    info!(base_url = %config.base_url, cache_dir = %config.cache_dir.display(), "conicet starting up");

    let policy = config.retry.to_policy().on_retry(|retry| {
        if retry.attempt % 10 == 0 {
            warn!(attempt = retry.attempt, delay = ?retry.delay, error = %retry.error, "Still retrying");
        }
    });
    let http = HttpSource::new(Url::parse(&config.base_url)?, &config.user_agent)?;
    let pipeline = Pipeline::new(&config, Resilient::new(http, policy))?;

    let ok = match &args.command {
        Command::Fetch { url, area } => pipeline.fetch(url, area.as_deref()).await,
        Command::Scrap { areas, page } => pipeline.crawl(&areas.selection(), *page).await,
        Command::Index { areas } => pipeline.index(&areas.selection()).await,
        Command::Populate { skip, take } => pipeline.load(*skip, *take).await,
        Command::Sync => pipeline.sync().await,
    };

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), ok, "Execution complete");

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
