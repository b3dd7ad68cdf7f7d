//! JSON output generation for the browser front-end.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 192-CIENCIAS_SOCIALES_Y_HUMANIDADES.json            # [{Title, Url, Year, Tags}]
//! ├── 192-CIENCIAS_SOCIALES_Y_HUMANIDADES-keywords.json   # {Area, Keywords: [{Key, Value}]}
//! ├── 192-CIENCIAS_SOCIALES_Y_HUMANIDADES-timeline.json   # {keyword: {year: count}}
//! └── keywords.json                                       # [{Area, Keywords}] for all areas
//! ```
//!
//! All files are pretty-printed so unchanged data rewrites to identical bytes.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::indexer::AreaAggregate;
use crate::models::{Area, KeywordSummary};
use crate::utils::sanitize_file_name;

pub const COMBINED_KEYWORDS_FILE: &str = "keywords.json";

/// `<id>-<NAME>` stem shared by the per-area files.
pub fn area_file_stem(area: &Area) -> String {
    format!("{}-{}", area.id, sanitize_file_name(&area.name))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).await?;
    info!(path = %path.display(), "Wrote JSON file");
    Ok(())
}

/// Write the article index, keyword summary, and keyword timeline of one area.
///
/// Returns the paths written.
#[instrument(level = "info", skip_all, fields(area = %aggregate.area.name))]
pub async fn write_area(aggregate: &AreaAggregate, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).await?;
    let stem = area_file_stem(&aggregate.area);

    let index_path = output_dir.join(format!("{stem}.json"));
    write_json(&index_path, &aggregate.articles).await?;

    let keywords_path = output_dir.join(format!("{stem}-keywords.json"));
    write_json(&keywords_path, &aggregate.keyword_summary()).await?;

    let timeline_path = output_dir.join(format!("{stem}-timeline.json"));
    write_json(&timeline_path, &aggregate.timeline).await?;

    Ok(vec![index_path, keywords_path, timeline_path])
}

/// Write the combined keyword summary of all `aggregates`.
pub async fn write_combined_keywords(aggregates: &[AreaAggregate], output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).await?;
    let summaries: Vec<KeywordSummary> = aggregates.iter().map(|a| a.keyword_summary()).collect();
    let path = output_dir.join(COMBINED_KEYWORDS_FILE);
    write_json(&path, &summaries).await?;
    Ok(path)
}
