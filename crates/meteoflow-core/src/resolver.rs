use std::collections::HashSet;

use tracing::warn;

use meteoflow_parser::{ColumnId, NormalizedTable, SpecialFormatTag};

use crate::config::{CorrectionKind, FiletypeDescriptor, UnitMapper, VarEntry};
use crate::derive::{DeriveContext, DerivedFunction};
use crate::error::{PipelineError, Result};

/// Sentinel for position indices that cannot be read from a field name.
pub const POSITION_NOT_GIVEN: &str = "-not-given-";

/// Depth assumed when the vpos token of a soil variable is not numeric.
const DEFAULT_SENSOR_DEPTH: f64 = 0.05;

/// Gain or offset of a resolved variable: a scalar in the common case, a
/// full per-timestamp series whenever a correction window is declared
/// (the window may only partially intersect the file's date range).
#[derive(Debug, Clone, PartialEq)]
pub enum Coefficient {
    Constant(f64),
    PerTimestamp(Vec<f64>),
}

impl Coefficient {
    pub fn at(&self, idx: usize) -> f64 {
        match self {
            Coefficient::Constant(value) => *value,
            Coefficient::PerTimestamp(values) => values[idx],
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Coefficient::Constant(_))
    }
}

/// Position index token (horizontal/vertical/replicate) from a canonical
/// field name. Tokens are not always numeric (`T1`, `0.05`), so they are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionIndex {
    Given(String),
    NotGiven,
}

impl PositionIndex {
    pub fn as_str(&self) -> &str {
        match self {
            PositionIndex::Given(token) => token.as_str(),
            PositionIndex::NotGiven => POSITION_NOT_GIVEN,
        }
    }
}

/// Where a resolved variable came from; every variable is traceable to
/// exactly one descriptor entry or one derived-function computation.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub raw_name: String,
    pub raw_units: String,
    pub descriptor_id: String,
    /// Function note for derived variables, e.g. "calc_lwin(T_RAD...)".
    pub derived_from: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedVariable {
    pub field: String,
    pub measurement: String,
    pub units: String,
    pub gain: Coefficient,
    pub offset: Coefficient,
    pub hpos: PositionIndex,
    pub vpos: PositionIndex,
    pub repl: PositionIndex,
    pub admitted: bool,
    pub provenance: Provenance,
}

/// A resolved variable together with its raw values (gain/offset not yet
/// applied), aligned with the table's datetime index.
#[derive(Debug, Clone)]
pub struct ResolvedSeries {
    pub variable: ResolvedVariable,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    pub series: Vec<ResolvedSeries>,
    /// Columns with no matching entry and no derivation. Reported, never
    /// silently dropped.
    pub unadmitted: Vec<ColumnId>,
}

/// Resolves every raw column of a normalized table against the variable
/// catalogue of one record group.
///
/// Resolution order: exact raw-name match first; for sequential-format
/// tables only, a prefix match against catalogue keys (generated column
/// names embed dynamic location suffixes); otherwise the column is
/// unadmitted. Columns consumed as derived-function inputs are excluded
/// from independent resolution.
pub fn resolve_table(
    table: &NormalizedTable,
    descriptor: &FiletypeDescriptor,
    group_idx: usize,
    unit_mapper: &UnitMapper,
    site: &str,
) -> Result<ResolutionOutcome> {
    let catalogue = descriptor.catalogue_for_group(group_idx);
    let prefix_match_allowed = descriptor.special_format() == Some(SpecialFormatTag::Sequential);

    let consumed = consumed_columns(table, catalogue);

    let mut outcome = ResolutionOutcome::default();

    for (col_idx, column) in table.columns.iter().enumerate() {
        if !table.column_has_data(col_idx) {
            warn!(
                column = %column,
                filetype = %descriptor.id,
                "column is empty and will be skipped"
            );
            continue;
        }
        if consumed.contains(column.name.as_str()) {
            continue;
        }

        let exact = catalogue.iter().find(|entry| entry.raw == column.name);
        let matched = match exact {
            Some(entry) => Some((entry, MatchKind::Exact)),
            None if prefix_match_allowed => catalogue
                .iter()
                .find(|entry| column.name.starts_with(entry.raw.as_str()))
                .map(|entry| (entry, MatchKind::Prefix)),
            None => None,
        };

        let Some((entry, match_kind)) = matched else {
            outcome.unadmitted.push(column.clone());
            continue;
        };

        let field = match match_kind {
            MatchKind::Exact => entry.canonical_field().to_string(),
            // Generated sequential names are already canonical.
            MatchKind::Prefix => column.name.clone(),
        };

        let units = unit_mapper.resolve(&column.units, entry.units.as_deref());
        let variable = build_variable(field, units, entry, column, descriptor, table, None);
        outcome.series.push(ResolvedSeries {
            values: table.numeric_column(col_idx),
            variable,
        });

        if let Some(spec) = &entry.derive {
            if let Some(series) =
                derived_series(table, descriptor, entry, spec, column, col_idx, site)?
            {
                outcome.series.push(series);
            }
        }
    }

    Ok(outcome)
}

#[derive(Clone, Copy)]
enum MatchKind {
    Exact,
    Prefix,
}

/// Columns claimed as auxiliary inputs by derived functions whose primary
/// column is present; they must not resolve independently.
fn consumed_columns<'a>(table: &NormalizedTable, catalogue: &'a [VarEntry]) -> HashSet<&'a str> {
    let mut consumed = HashSet::new();
    for entry in catalogue {
        let Some(spec) = &entry.derive else {
            continue;
        };
        if table.column_index(&entry.raw).is_none() {
            continue;
        }
        for input in &spec.inputs {
            consumed.insert(input.as_str());
        }
    }
    consumed
}

fn build_variable(
    field: String,
    units: String,
    entry: &VarEntry,
    column: &ColumnId,
    descriptor: &FiletypeDescriptor,
    table: &NormalizedTable,
    derived_from: Option<String>,
) -> ResolvedVariable {
    let mut gain = Coefficient::Constant(entry.gain);
    let mut offset = Coefficient::Constant(entry.offset);
    if let Some(correction) = &entry.correction {
        let materialized: Vec<f64> = table
            .index
            .iter()
            .map(|ts| {
                if correction.contains(*ts) {
                    correction.value
                } else {
                    match correction.kind {
                        CorrectionKind::Gain => entry.gain,
                        CorrectionKind::Offset => entry.offset,
                    }
                }
            })
            .collect();
        match correction.kind {
            CorrectionKind::Gain => gain = Coefficient::PerTimestamp(materialized),
            CorrectionKind::Offset => offset = Coefficient::PerTimestamp(materialized),
        }
    }

    let (hpos, vpos, repl) = if descriptor.position_indices {
        position_indices(&field)
    } else {
        (
            PositionIndex::NotGiven,
            PositionIndex::NotGiven,
            PositionIndex::NotGiven,
        )
    };

    ResolvedVariable {
        field,
        measurement: entry.measurement.clone(),
        units,
        gain,
        offset,
        hpos,
        vpos,
        repl,
        admitted: true,
        provenance: Provenance {
            raw_name: entry.raw.clone(),
            raw_units: column.units.clone(),
            descriptor_id: descriptor.id.clone(),
            derived_from,
        },
    }
}

fn derived_series(
    table: &NormalizedTable,
    descriptor: &FiletypeDescriptor,
    entry: &VarEntry,
    spec: &crate::config::DeriveSpec,
    column: &ColumnId,
    col_idx: usize,
    site: &str,
) -> Result<Option<ResolvedSeries>> {
    let func = DerivedFunction::from_name(&spec.func)
        .ok_or_else(|| PipelineError::UnknownDerivedFunction(spec.func.clone()))?;

    let mut aux = Vec::with_capacity(spec.inputs.len());
    for input in &spec.inputs {
        match table.column_index(input) {
            Some(idx) => aux.push(table.numeric_column(idx)),
            None => {
                warn!(
                    input = %input,
                    func = func.name(),
                    filetype = %descriptor.id,
                    "derived-function input column missing, skipping derivation"
                );
                return Ok(None);
            }
        }
    }

    let primary_field = entry.canonical_field();
    let context = DeriveContext {
        site: site.to_string(),
        depth: vpos_depth(primary_field),
    };

    let values = match func.apply(&table.numeric_column(col_idx), &aux, &context) {
        Ok(values) => values,
        Err(err) => {
            warn!(
                func = func.name(),
                filetype = %descriptor.id,
                "derivation failed: {err}"
            );
            return Ok(None);
        }
    };

    let field = spec
        .field
        .clone()
        .unwrap_or_else(|| func.default_field(primary_field));
    let measurement = spec
        .measurement
        .clone()
        .unwrap_or_else(|| func.default_measurement().to_string());
    let units = spec
        .units
        .clone()
        .unwrap_or_else(|| func.default_units().to_string());

    let (hpos, vpos, repl) = if descriptor.position_indices {
        position_indices(&field)
    } else {
        (
            PositionIndex::NotGiven,
            PositionIndex::NotGiven,
            PositionIndex::NotGiven,
        )
    };

    let note = format!("{}({})", func.name(), spec.inputs.join(", "));
    Ok(Some(ResolvedSeries {
        variable: ResolvedVariable {
            field,
            measurement,
            units,
            gain: Coefficient::Constant(1.0),
            offset: Coefficient::Constant(0.0),
            hpos,
            vpos,
            repl,
            admitted: true,
            provenance: Provenance {
                raw_name: entry.raw.clone(),
                raw_units: column.units.clone(),
                descriptor_id: descriptor.id.clone(),
                derived_from: Some(note),
            },
        },
        values,
    }))
}

/// hpos/vpos/repl are the last three underscore-delimited tokens of the
/// canonical field name. Names too short to carry them resolve to the
/// not-given sentinel, never an error.
fn position_indices(field: &str) -> (PositionIndex, PositionIndex, PositionIndex) {
    let tokens: Vec<&str> = field.split('_').collect();
    if tokens.len() < 3 {
        return (
            PositionIndex::NotGiven,
            PositionIndex::NotGiven,
            PositionIndex::NotGiven,
        );
    }
    let n = tokens.len();
    (
        PositionIndex::Given(tokens[n - 3].to_string()),
        PositionIndex::Given(tokens[n - 2].to_string()),
        PositionIndex::Given(tokens[n - 1].to_string()),
    )
}

fn vpos_depth(field: &str) -> f64 {
    let tokens: Vec<&str> = field.split('_').collect();
    if tokens.len() < 2 {
        return DEFAULT_SENSOR_DEPTH;
    }
    tokens[tokens.len() - 2]
        .parse::<f64>()
        .unwrap_or(DEFAULT_SENSOR_DEPTH)
}
