use std::path::PathBuf;

use chrono::{NaiveDateTime, NaiveTime};

use meteoflow_parser::SpecialFormatTag;

use crate::config::{FiletypeCatalogue, FiletypeDescriptor};

/// A candidate file found by discovery, before classification.
#[derive(Debug, Clone)]
pub struct FoundFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub mtime: NaiveDateTime,
}

impl FoundFile {
    /// Ancestor folder names, nearest parent first.
    pub fn ancestors(&self) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = self.path.parent();
        while let Some(dir) = current {
            if let Some(name) = dir.file_name() {
                segments.push(name.to_string_lossy().to_string());
            }
            current = dir.parent();
        }
        segments
    }
}

/// Terminal classification state of one file.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Matched {
        descriptor_id: String,
        filedate: NaiveDateTime,
        special_format: Option<SpecialFormatTag>,
    },
    /// Matched a descriptor that is globally disabled for scanning.
    Ignored { descriptor_id: String },
    /// No descriptor matched. Not an error.
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub file: FoundFile,
    pub assignment: Assignment,
}

/// One way of obtaining a file's nominal date, tried in the order the
/// descriptor declares them.
#[derive(Debug, Clone)]
enum DateStrategy {
    /// strftime format anchored at the start of the filename.
    FilenameFormat(String),
    /// Month folder under a year folder somewhere up the path.
    FromFilepath,
    /// File modification time; for filetypes whose names carry no date.
    Mtime,
}

impl DateStrategy {
    fn from_config(entry: &str) -> Self {
        match entry {
            "from_filepath" => DateStrategy::FromFilepath,
            "mtime" => DateStrategy::Mtime,
            format => DateStrategy::FilenameFormat(format.to_string()),
        }
    }

    fn apply(&self, file: &FoundFile, ancestors: &[String]) -> Option<NaiveDateTime> {
        match self {
            DateStrategy::FilenameFormat(format) => {
                parse_filename_date(&file.filename, format)
            }
            DateStrategy::FromFilepath => date_from_filepath(ancestors),
            DateStrategy::Mtime => Some(file.mtime),
        }
    }
}

/// Classifies one file against the catalogue. Descriptors are scanned in
/// catalogue order and the first full match wins, which fixes the behavior
/// when several descriptors could claim the same filename.
pub fn classify(file: FoundFile, catalogue: &FiletypeCatalogue) -> DiscoveredFile {
    let ancestors = file.ancestors();

    for descriptor in catalogue.iter() {
        if !matches_pattern(descriptor, &file.filename) {
            continue;
        }
        if let Some(required) = &descriptor.required_ancestor {
            if !ancestors.iter().any(|segment| segment == required) {
                continue;
            }
        }
        let Some(filedate) = nominal_date(descriptor, &file, &ancestors) else {
            continue;
        };
        if filedate < descriptor.valid_from || filedate > descriptor.valid_to {
            continue;
        }

        let assignment = if descriptor.scanner_enabled {
            Assignment::Matched {
                descriptor_id: descriptor.id.clone(),
                filedate,
                special_format: descriptor.special_format(),
            }
        } else {
            Assignment::Ignored {
                descriptor_id: descriptor.id.clone(),
            }
        };
        return DiscoveredFile { file, assignment };
    }

    DiscoveredFile {
        file,
        assignment: Assignment::Unmatched,
    }
}

fn matches_pattern(descriptor: &FiletypeDescriptor, filename: &str) -> bool {
    descriptor.patterns.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|p| p.matches(filename))
            .unwrap_or(false)
    })
}

fn nominal_date(
    descriptor: &FiletypeDescriptor,
    file: &FoundFile,
    ancestors: &[String],
) -> Option<NaiveDateTime> {
    descriptor
        .date_formats
        .iter()
        .map(|entry| DateStrategy::from_config(entry))
        .find_map(|strategy| strategy.apply(file, ancestors))
}

/// Parses the nominal date from a filename prefix. The parse window is
/// derived from the format string length (a `%Y` renders two characters
/// wider than it is written) so that trailing incrementing suffixes do not
/// break the strict parse.
fn parse_filename_date(filename: &str, format: &str) -> Option<NaiveDateTime> {
    let window = format.len() + 2;
    let slice = filename.get(..window.min(filename.len()))?;

    let mut parsed = chrono::format::Parsed::new();
    chrono::format::parse(
        &mut parsed,
        slice,
        chrono::format::StrftimeItems::new(format),
    )
    .ok()?;
    let date = parsed.to_naive_date().ok()?;
    let time = parsed
        .to_naive_time()
        .unwrap_or_else(|_| NaiveTime::from_hms_opt(0, 0, 0).expect("midnight"));
    Some(date.and_time(time))
}

/// First day of the month when the parent folder is a month (01-12) under
/// a 4-digit year folder (1900-2099).
fn date_from_filepath(ancestors: &[String]) -> Option<NaiveDateTime> {
    let month_segment = ancestors.first()?;
    let year_segment = ancestors.get(1)?;

    let month = parse_month(month_segment)?;
    let year = parse_year(year_segment)?;

    chrono::NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_month(segment: &str) -> Option<u32> {
    if segment.len() != 2 || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let month: u32 = segment.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

fn parse_year(segment: &str) -> Option<i32> {
    if segment.len() != 4 || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = segment.parse().ok()?;
    (1900..=2099).contains(&year).then_some(year)
}
