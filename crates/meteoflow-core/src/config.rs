use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

use meteoflow_parser::{ReadDirectives, RecordGroups, SpecialFormatTag, TimestampSpec};

use crate::error::{PipelineError, Result};

/// Sentinel for units or fields without a resolvable configuration entry.
pub const NOT_DEFINED: &str = "-not-defined-";

/// Declared sampling interval of a filetype. A list is only meaningful for
/// alternating-format files, where each record group samples at its own
/// interval; a list anywhere else is a configuration authoring bug.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FrequencySpec {
    One(String),
    PerGroup(Vec<String>),
}

impl FrequencySpec {
    /// Declared interval for the record group at `group_idx` (0 for
    /// regular formats).
    pub fn for_group(&self, group_idx: usize) -> Option<&str> {
        match self {
            FrequencySpec::One(freq) => Some(freq.as_str()),
            FrequencySpec::PerGroup(freqs) => freqs.get(group_idx).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    Gain,
    Offset,
}

/// Time-windowed gain or offset replacement. Timestamps are naive and
/// compared directly against file timestamps; no timezone conversion is
/// attempted.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorrectionWindow {
    pub kind: CorrectionKind,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub value: f64,
}

impl CorrectionWindow {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.from && ts <= self.to
    }
}

/// Directive attaching a derived-function computation to a raw variable.
/// The named variable is the primary input; `inputs` list any auxiliary
/// raw columns the function consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveSpec {
    pub func: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Metadata of the derived variable; each function provides defaults
    /// when these are absent.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub measurement: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
}

/// One raw variable of a filetype: canonical identity, units, gain/offset
/// and the optional correction/derivation directives.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarEntry {
    pub raw: String,
    /// Canonical field name; empty or absent keeps the raw name.
    #[serde(default)]
    pub field: Option<String>,
    pub measurement: String,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default = "default_gain")]
    pub gain: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub correction: Option<CorrectionWindow>,
    #[serde(default)]
    pub derive: Option<DeriveSpec>,
}

impl VarEntry {
    pub fn canonical_field(&self) -> &str {
        match self.field.as_deref() {
            Some(field) if !field.is_empty() => field,
            _ => self.raw.as_str(),
        }
    }
}

fn default_gain() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_data_version() -> String {
    "raw".to_string()
}

/// Declarative description of one filetype: how to recognize its files,
/// how to parse them and what the raw variables mean. Immutable once
/// loaded; referenced, never mutated, by the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiletypeDescriptor {
    pub id: String,
    /// Glob patterns; a file must match at least one.
    pub patterns: Vec<String>,
    /// Date strategies tried in declared order. Each entry is a strftime
    /// format anchored at the start of the filename, or one of the
    /// sentinels `"from_filepath"` (infer month/year from ancestor
    /// folders) and `"mtime"` (use the file modification time).
    #[serde(default)]
    pub date_formats: Vec<String>,
    pub valid_from: NaiveDateTime,
    pub valid_to: NaiveDateTime,
    #[serde(default = "default_data_version")]
    pub data_version: String,
    /// Folder name that must appear among the file's ancestors.
    #[serde(default)]
    pub required_ancestor: Option<String>,
    /// False marks the filetype as globally ignored: matching files reach
    /// a terminal *ignored* state distinct from *unmatched*.
    #[serde(default = "default_true")]
    pub scanner_enabled: bool,
    pub raw_frequency: FrequencySpec,
    #[serde(default)]
    pub read: ReadDirectives,
    pub timestamp: TimestampSpec,
    /// Parse hpos/vpos/repl position indices from canonical field names.
    #[serde(default = "default_true")]
    pub position_indices: bool,
    /// Known location identifiers for sequential-format files; locations
    /// found in the data but not listed here are reported.
    #[serde(default)]
    pub locations: Vec<String>,
    /// Record-type identifier groups, alternating formats only.
    #[serde(default)]
    pub record_groups: Option<RecordGroups>,
    #[serde(default)]
    pub variables: Vec<VarEntry>,
    /// Second variable catalogue, alternating formats only.
    #[serde(default)]
    pub variables2: Vec<VarEntry>,
}

impl FiletypeDescriptor {
    pub fn special_format(&self) -> Option<SpecialFormatTag> {
        SpecialFormatTag::from_filetype_id(&self.id)
    }

    /// Variable catalogue for the record group at `group_idx`.
    pub fn catalogue_for_group(&self, group_idx: usize) -> &[VarEntry] {
        if group_idx == 0 {
            &self.variables
        } else {
            &self.variables2
        }
    }

    pub fn raw_names(catalogue: &[VarEntry]) -> Vec<String> {
        catalogue.iter().map(|entry| entry.raw.clone()).collect()
    }

    /// Rejects configuration authoring bugs. These abort processing of the
    /// descriptor; they are never data errors.
    pub fn validate(&self) -> Result<()> {
        let alternating = self.special_format() == Some(SpecialFormatTag::Alternating);

        if matches!(self.raw_frequency, FrequencySpec::PerGroup(_)) && !alternating {
            return Err(PipelineError::config(
                &self.id,
                "list-valued raw_frequency is only allowed for alternating formats",
            ));
        }
        if !self.variables2.is_empty() && !alternating {
            return Err(PipelineError::config(
                &self.id,
                "variables2 is only allowed for alternating formats",
            ));
        }
        if alternating {
            let Some(groups) = &self.record_groups else {
                return Err(PipelineError::config(
                    &self.id,
                    "alternating formats require record_groups",
                ));
            };
            if groups.groups.len() != 2 {
                return Err(PipelineError::config(
                    &self.id,
                    format!(
                        "alternating formats require exactly 2 record groups, found {}",
                        groups.groups.len()
                    ),
                ));
            }
            if self.variables2.is_empty() {
                return Err(PipelineError::config(
                    &self.id,
                    "alternating formats require a variables2 catalogue",
                ));
            }
        }
        if self.patterns.is_empty() {
            return Err(PipelineError::config(&self.id, "no filename patterns"));
        }
        for pattern in &self.patterns {
            glob::Pattern::new(pattern).map_err(|source| PipelineError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        if self.valid_from > self.valid_to {
            return Err(PipelineError::config(
                &self.id,
                "valid_from is after valid_to",
            ));
        }
        Ok(())
    }
}

/// Ordered catalogue of filetype descriptors. Iteration order is the
/// classification order and therefore part of the contract: descriptors
/// are kept sorted by id, so the first matching descriptor is
/// deterministic regardless of filesystem enumeration order.
#[derive(Debug, Clone, Default)]
pub struct FiletypeCatalogue {
    descriptors: Vec<FiletypeDescriptor>,
}

impl FiletypeCatalogue {
    /// Descriptor validation is deferred to processing time so that one
    /// misauthored descriptor aborts only its own files, not the run.
    pub fn new(mut descriptors: Vec<FiletypeDescriptor>) -> Self {
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        Self { descriptors }
    }

    /// Loads every `*.toml` descriptor file under `dir` (recursively).
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let pattern = dir.join("**/*.toml");
        let pattern = pattern.to_string_lossy();
        let mut descriptors = Vec::new();
        for entry in glob::glob(&pattern).map_err(|source| PipelineError::Pattern {
            pattern: pattern.to_string(),
            source,
        })? {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!("skipping unreadable descriptor path: {err}");
                    continue;
                }
            };
            let content = std::fs::read_to_string(&path)?;
            let descriptor: FiletypeDescriptor =
                toml::from_str(&content).map_err(|source| PipelineError::DescriptorParse {
                    path: path.display().to_string(),
                    source,
                })?;
            descriptors.push(descriptor);
        }
        Ok(Self::new(descriptors))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FiletypeDescriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, id: &str) -> Option<&FiletypeDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Translation table from raw unit strings to naming-convention units.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitMapper {
    #[serde(default)]
    units: BTreeMap<String, String>,
}

impl UnitMapper {
    pub fn new(units: BTreeMap<String, String>) -> Self {
        Self { units }
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| PipelineError::DescriptorParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Naming-convention units for a variable. Units assigned in the
    /// descriptor win over units found in the file; known raw units are
    /// translated; anything else resolves to the `-not-defined-` sentinel.
    /// An empty mapping entry keeps the raw string as-is.
    pub fn resolve(&self, raw_units: &str, assigned_units: Option<&str>) -> String {
        let effective = assigned_units.unwrap_or(raw_units);
        match self.units.get(effective) {
            Some(mapped) if !mapped.is_empty() => mapped.clone(),
            Some(_) => effective.to_string(),
            None => NOT_DEFINED.to_string(),
        }
    }
}
