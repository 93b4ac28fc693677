mod alternating;
mod sequential;

pub use alternating::restructure_alternating;
pub use sequential::restructure_sequential;

use crate::model::NormalizedTable;

/// Non-tabular raw layouts that need restructuring before resolution,
/// recognized by substring tags in the filetype identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialFormatTag {
    /// Measurements for several locations stored in sequential rows.
    Sequential,
    /// Two record types interleaved row by row in one file.
    Alternating,
}

impl SpecialFormatTag {
    pub fn from_filetype_id(id: &str) -> Option<Self> {
        if id.contains("-SEQ-") {
            Some(SpecialFormatTag::Sequential)
        } else if id.contains("-ALTERNATING-") {
            Some(SpecialFormatTag::Alternating)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialFormatTag::Sequential => "-SEQ-",
            SpecialFormatTag::Alternating => "-ALTERNATING-",
        }
    }
}

/// Restructured tables plus identifiers found in the data that no
/// configuration entry covers. Unmatched identifiers are a diagnostic,
/// not an error.
#[derive(Debug)]
pub struct SpecialFormatOutcome {
    pub tables: Vec<NormalizedTable>,
    pub unmatched_identifiers: Vec<String>,
}
