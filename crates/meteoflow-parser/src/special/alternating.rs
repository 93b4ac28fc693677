use crate::directives::RecordGroups;
use crate::errors::ReadError;
use crate::model::{ColumnId, NormalizedTable, UNITS_NOT_GIVEN};
use crate::special::SpecialFormatOutcome;

/// Splits an alternating-format table into the two record-type subsets.
///
/// Each row carries a record-type identifier in a fixed column. Rows are
/// partitioned by the configured identifier groups; each subset keeps only
/// as many columns as its group's variable catalogue declares, and those
/// names are assigned positionally. Identifiers covered by neither group
/// are excluded from both outputs and reported.
pub fn restructure_alternating(
    table: &NormalizedTable,
    spec: &RecordGroups,
    catalogues: [&[String]; 2],
) -> Result<SpecialFormatOutcome, ReadError> {
    if spec.groups.len() != 2 {
        return Err(ReadError::RecordGroupCount {
            found: spec.groups.len(),
        });
    }
    if table.width() > 0 && spec.column >= table.width() {
        return Err(ReadError::RecordColumnOutOfRange {
            index: spec.column,
            width: table.width(),
        });
    }

    let mut unmatched_identifiers: Vec<String> = Vec::new();
    let mut tables = Vec::with_capacity(2);

    for (group_idx, group) in spec.groups.iter().enumerate() {
        let names = catalogues[group_idx];
        let take = names.len().min(table.width());

        let columns: Vec<ColumnId> = names
            .iter()
            .map(|name| ColumnId::new(name.clone(), UNITS_NOT_GIVEN))
            .collect();

        let mut index = Vec::new();
        let mut rows = Vec::new();
        for (row_idx, row) in table.rows.iter().enumerate() {
            let Some(id) = row[spec.column].as_i64() else {
                // Only collect on the first pass so strays are reported once.
                if group_idx == 0 {
                    record_unmatched(&mut unmatched_identifiers, row[spec.column].to_string());
                }
                continue;
            };
            if !group.contains(id) {
                if group_idx == 0 && !spec.groups.iter().any(|g| g.contains(id)) {
                    record_unmatched(&mut unmatched_identifiers, id.to_string());
                }
                continue;
            }

            let mut new_row: Vec<_> = row.iter().take(take).cloned().collect();
            new_row.resize(columns.len(), crate::model::CellValue::Missing);
            index.push(table.index[row_idx]);
            rows.push(new_row);
        }

        tables.push(NormalizedTable {
            columns,
            index,
            rows,
            group: Some(group.label()),
        });
    }

    unmatched_identifiers.sort();

    Ok(SpecialFormatOutcome {
        tables,
        unmatched_identifiers,
    })
}

fn record_unmatched(unmatched: &mut Vec<String>, id: String) {
    if !unmatched.contains(&id) {
        unmatched.push(id);
    }
}
