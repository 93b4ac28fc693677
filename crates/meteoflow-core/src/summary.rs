use chrono::NaiveDateTime;
use serde::Serialize;

/// Diagnostics for one normalized table (regular files have one, the
/// alternating format two).
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub group: Option<String>,
    pub rows: usize,
    pub variables: usize,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub frequency: String,
    pub frequency_source: String,
}

/// Per-file summary: why a file produced less output than expected is
/// always recorded here, never silently lost.
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub filename: String,
    pub descriptor_id: Option<String>,
    pub special_format: Option<String>,
    pub tables: Vec<TableSummary>,
    pub unmatched_identifiers: Vec<String>,
    /// Raw names of columns with no configuration entry.
    pub unadmitted: Vec<String>,
    pub series_emitted: usize,
    pub degraded: Option<String>,
}

impl FileSummary {
    pub fn empty(filename: impl Into<String>, degraded: Option<String>) -> Self {
        Self {
            filename: filename.into(),
            descriptor_id: None,
            special_format: None,
            tables: Vec::new(),
            unmatched_identifiers: Vec::new(),
            unadmitted: Vec::new(),
            series_emitted: 0,
            degraded,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DescriptorFailure {
    pub descriptor_id: String,
    pub filename: String,
    pub message: String,
}

/// Per-run rollup over all processed files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_total: usize,
    pub files_matched: usize,
    pub files_unmatched: usize,
    pub files_ignored: usize,
    pub series_emitted: usize,
    /// Unique "descriptor/raw-name" keys of not-admitted variables.
    pub unadmitted: Vec<String>,
    pub descriptor_failures: Vec<DescriptorFailure>,
    pub files: Vec<FileSummary>,
}

impl RunSummary {
    pub fn record_unadmitted(&mut self, descriptor_id: &str, raw_name: &str) {
        let key = format!("{descriptor_id}/{raw_name}");
        if !self.unadmitted.contains(&key) {
            self.unadmitted.push(key);
        }
    }
}
