use std::fmt;

use polars::prelude::PolarsError;
use thiserror::Error;

/// One failed reading strategy, kept so diagnostics can show the whole
/// fallback trail when a file ends up contributing zero rows.
#[derive(Debug, Clone)]
pub struct ReadAttempt {
    pub strategy: &'static str,
    pub message: String,
}

impl ReadAttempt {
    pub fn new(strategy: &'static str, message: impl Into<String>) -> Self {
        Self {
            strategy,
            message: message.into(),
        }
    }
}

impl fmt::Display for ReadAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("column '{column}' not present in table")]
    MissingColumn { column: String },

    #[error("no location column (LOCATION/INLET) in sequential-format table")]
    MissingLocationColumn,

    #[error("alternating format requires exactly 2 record groups, found {found}")]
    RecordGroupCount { found: usize },

    #[error("record-group column index {index} out of range (width {width})")]
    RecordColumnOutOfRange { index: usize, width: usize },

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}
