use serde::Deserialize;

/// Row-level parsing directives for one filetype. Deserialized as part of
/// the descriptor TOML; defaults mirror the most common logger layout
/// (comma-separated, two header rows: names + units).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadDirectives {
    /// Leading physical rows to skip before header parsing.
    #[serde(default)]
    pub skip_rows: Vec<usize>,
    /// 0 = headerless (names come from the variable catalogue),
    /// 1 = names only, 2 = names + units.
    #[serde(default = "default_header_rows")]
    pub header_rows: u8,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Strings treated as missing values, in addition to empty cells.
    #[serde(default)]
    pub na_values: Vec<String>,
    /// Rows whose cell in `bad_row_column` equals one of these markers are
    /// dropped before timestamp construction.
    #[serde(default)]
    pub bad_row_markers: Vec<String>,
    #[serde(default)]
    pub bad_row_column: Option<usize>,
}

impl Default for ReadDirectives {
    fn default() -> Self {
        Self {
            skip_rows: Vec::new(),
            header_rows: default_header_rows(),
            delimiter: default_delimiter(),
            na_values: Vec::new(),
            bad_row_markers: Vec::new(),
            bad_row_column: None,
        }
    }
}

fn default_header_rows() -> u8 {
    2
}

fn default_delimiter() -> char {
    ','
}

/// How the datetime index is constructed. The three modes are mutually
/// exclusive by construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum TimestampSpec {
    /// One designated column parsed with a strftime format.
    Single { column: String, format: String },
    /// YEAR + MONTH + DAY + HOUR + MINUTE integer columns.
    Ymdhm,
    /// YEAR + day-of-year + integer HHMM time of day.
    YearDoyTime,
}

/// One record-type identifier group of an alternating-format file: a single
/// id or several ids that share a variable catalogue.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordGroupSpec {
    One(i64),
    Many(Vec<i64>),
}

impl RecordGroupSpec {
    pub fn ids(&self) -> Vec<i64> {
        match self {
            RecordGroupSpec::One(id) => vec![*id],
            RecordGroupSpec::Many(ids) => ids.clone(),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        match self {
            RecordGroupSpec::One(one) => *one == id,
            RecordGroupSpec::Many(ids) => ids.contains(&id),
        }
    }

    /// Stable label for diagnostics and group tagging, e.g. "203" or "1+2".
    pub fn label(&self) -> String {
        match self {
            RecordGroupSpec::One(id) => id.to_string(),
            RecordGroupSpec::Many(ids) => ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join("+"),
        }
    }
}

/// Identifier column + the two groups of an alternating-format descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordGroups {
    /// Zero-based column index carrying the record-type identifier.
    pub column: usize,
    pub groups: Vec<RecordGroupSpec>,
}
