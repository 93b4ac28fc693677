use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::matcher::FoundFile;

/// Extensions never considered for ingestion.
const IGNORED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".dll", ".exe", ".log", ".metadata", ".settings",
    ".settingsOld", ".csv.gz",
];

/// Filename patterns never considered for ingestion.
const IGNORED_PATTERNS: &[&str] = &["*binned*", "stats_agg_*"];

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Stop after this many candidate files (0 = no limit).
    pub file_limit: usize,
    /// Keep only the N newest files by modification time (0 = keep all).
    pub newest_files: usize,
}

/// Walks a source tree and collects candidate files, sorted by filename.
pub fn discover_files(dir: &Path, options: &DiscoveryOptions) -> Result<Vec<FoundFile>> {
    let pattern = dir.join("**/*");
    let pattern = pattern.to_string_lossy().to_string();

    let mut found = Vec::new();
    for entry in glob::glob(&pattern).map_err(|source| PipelineError::Pattern {
        pattern: pattern.clone(),
        source,
    })? {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!("could not read path from glob pattern: {err}");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        if is_ignored(&filename) {
            continue;
        }

        let metadata = std::fs::metadata(&path)?;
        let mtime = system_time_to_naive(metadata.modified()?);

        found.push(FoundFile {
            filename,
            path,
            size: metadata.len(),
            mtime,
        });

        if options.file_limit > 0 && found.len() >= options.file_limit {
            break;
        }
    }

    if options.newest_files > 0 && found.len() > options.newest_files {
        found.sort_by(|a, b| b.mtime.cmp(&a.mtime));
        found.truncate(options.newest_files);
        info!(
            "keeping {} newest files, based on file modification time",
            options.newest_files
        );
    }

    found.sort_by(|a, b| a.filename.cmp(&b.filename));
    info!("found {} files", found.len());
    Ok(found)
}

fn is_ignored(filename: &str) -> bool {
    if IGNORED_EXTENSIONS
        .iter()
        .any(|ext| filename.ends_with(ext))
    {
        return true;
    }
    IGNORED_PATTERNS.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|p| p.matches(filename))
            .unwrap_or(false)
    })
}

fn system_time_to_naive(time: std::time::SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}
