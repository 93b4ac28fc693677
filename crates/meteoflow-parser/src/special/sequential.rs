use crate::errors::ReadError;
use crate::model::{CellValue, ColumnId, NormalizedTable};
use crate::special::SpecialFormatOutcome;

/// Candidate names for the column carrying the measurement location;
/// `LOCATION` in newer files, `INLET` in older ones.
const LOCATION_COLUMNS: &[&str] = &["LOCATION", "INLET"];

/// Restructures a sequential multi-location table so that each variable at
/// each location gets its own column instead of sharing a column across
/// rows.
///
/// Rows are grouped by their location value; per-location column names are
/// assembled from the base variable name, a subformat tag derived from the
/// filetype identifier, and the location identifier, e.g.
/// `CO2_PRF_T1_35_1`. The location column itself is dropped from the
/// output. Locations present in the data but absent from the descriptor's
/// declared location list are reported as unmatched identifiers.
pub fn restructure_sequential(
    table: &NormalizedTable,
    filetype_id: &str,
    known_locations: &[String],
) -> Result<SpecialFormatOutcome, ReadError> {
    let loc_idx = LOCATION_COLUMNS
        .iter()
        .find_map(|candidate| {
            table
                .columns
                .iter()
                .position(|col| col.name.contains(candidate))
        })
        .ok_or(ReadError::MissingLocationColumn)?;
    let loc_base = LOCATION_COLUMNS
        .iter()
        .find(|candidate| table.columns[loc_idx].name.contains(*candidate))
        .copied()
        .unwrap_or("LOCATION");

    let origin = subformat_tag(filetype_id);

    let mut locations: Vec<String> = Vec::new();
    for row in &table.rows {
        if let Some(value) = cell_location(&row[loc_idx]) {
            if !locations.contains(&value) {
                locations.push(value);
            }
        }
    }
    locations.sort();

    let unmatched_identifiers: Vec<String> = if known_locations.is_empty() {
        Vec::new()
    } else {
        locations
            .iter()
            .filter(|loc| !known_locations.contains(loc))
            .cloned()
            .collect()
    };

    // Columns that carry location information are dropped from the output.
    let data_columns: Vec<usize> = (0..table.width())
        .filter(|&idx| !table.columns[idx].name.contains(loc_base))
        .collect();

    let mut columns: Vec<ColumnId> = Vec::with_capacity(locations.len() * data_columns.len());
    for loc in &locations {
        let label = location_label(loc, origin);
        for &idx in &data_columns {
            let source = &table.columns[idx];
            columns.push(ColumnId::new(
                location_column_name(&source.name, origin, &label),
                source.units.clone(),
            ));
        }
    }

    let mut index = Vec::new();
    let mut rows = Vec::new();
    for (block, loc) in locations.iter().enumerate() {
        let offset = block * data_columns.len();
        for (row_idx, row) in table.rows.iter().enumerate() {
            if cell_location(&row[loc_idx]).as_deref() != Some(loc.as_str()) {
                continue;
            }
            let mut new_row = vec![CellValue::Missing; columns.len()];
            for (slot, &idx) in data_columns.iter().enumerate() {
                new_row[offset + slot] = row[idx].clone();
            }
            index.push(table.index[row_idx]);
            rows.push(new_row);
        }
    }

    Ok(SpecialFormatOutcome {
        tables: vec![NormalizedTable {
            columns,
            index,
            rows,
            group: None,
        }],
        unmatched_identifiers,
    })
}

/// Subformat tag embedded into generated column names: profile data from
/// IRGA (`PRF`) or QCL (`PRF_QCL`) measurements, or chamber data (`CMB`).
fn subformat_tag(filetype_id: &str) -> &'static str {
    if filetype_id.contains("-PRF-QCL-") {
        "PRF_QCL"
    } else if filetype_id.contains("-PRF-") {
        "PRF"
    } else if filetype_id.contains("-CMB-") {
        "CMB"
    } else {
        ""
    }
}

/// Chamber measurements happen at zero height, which gets encoded as an
/// extra vertical position token.
fn location_label(loc: &str, origin: &str) -> String {
    if origin == "CMB" {
        format!("{loc}_0")
    } else {
        loc.to_string()
    }
}

fn location_column_name(base: &str, origin: &str, label: &str) -> String {
    let suffix = if origin.is_empty() || base.contains(origin) {
        ""
    } else {
        origin
    };
    let name = format!("{base}_{suffix}_{label}_1");
    name.replace("__", "_")
}

fn cell_location(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Missing => None,
        other => Some(other.to_string()),
    }
}
