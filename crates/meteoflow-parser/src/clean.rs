use std::collections::HashMap;

use crate::model::{CellValue, ColumnId, NormalizedTable};

/// Replaces non-finite values with missing. Loggers occasionally emit inf
/// and -inf, which parse as numbers but cannot be used downstream.
pub fn sanitize(table: &mut NormalizedTable) {
    for row in &mut table.rows {
        for cell in row.iter_mut() {
            if let CellValue::Float(value) = cell {
                if !value.is_finite() {
                    *cell = CellValue::Missing;
                }
            }
        }
    }
}

/// Drops columns that never got a usable header name.
pub fn remove_unnamed_columns(table: &mut NormalizedTable) {
    let mut idx = 0;
    while idx < table.columns.len() {
        if table.columns[idx].is_unnamed() {
            table.columns.remove(idx);
            for row in &mut table.rows {
                row.remove(idx);
            }
        } else {
            idx += 1;
        }
    }
}

/// Combines duplicate column identities into a single column. For each row
/// the last non-missing value among the duplicates wins, matching keep-last
/// semantics for overlapping records.
pub fn combine_duplicate_columns(table: &mut NormalizedTable) {
    let mut first_seen: HashMap<ColumnId, usize> = HashMap::new();
    let mut drop: Vec<usize> = Vec::new();

    for idx in 0..table.columns.len() {
        let id = table.columns[idx].clone();
        match first_seen.get(&id) {
            Some(&keep) => {
                for row in &mut table.rows {
                    if !row[idx].is_missing() {
                        row[keep] = row[idx].clone();
                    }
                }
                drop.push(idx);
            }
            None => {
                first_seen.insert(id, idx);
            }
        }
    }

    for idx in drop.into_iter().rev() {
        table.columns.remove(idx);
        for row in &mut table.rows {
            row.remove(idx);
        }
    }
}

/// Stable sort of rows by their timestamp.
pub fn sort_timestamp(table: &mut NormalizedTable) {
    let mut order: Vec<usize> = (0..table.height()).collect();
    order.sort_by_key(|&i| table.index[i]);

    table.index = order.iter().map(|&i| table.index[i]).collect();
    let mut rows = Vec::with_capacity(table.rows.len());
    for &i in &order {
        rows.push(std::mem::take(&mut table.rows[i]));
    }
    table.rows = rows;
}

/// Removes duplicate timestamps, keeping the last occurrence. Assumes the
/// table is already sorted by timestamp.
pub fn remove_index_duplicates(table: &mut NormalizedTable) {
    if table.height() < 2 {
        return;
    }
    let mut keep = vec![true; table.height()];
    for i in 0..table.height() - 1 {
        if table.index[i] == table.index[i + 1] {
            keep[i] = false;
        }
    }

    let mut index = Vec::with_capacity(table.height());
    let mut rows = Vec::with_capacity(table.height());
    for (i, flag) in keep.iter().enumerate() {
        if *flag {
            index.push(table.index[i]);
            rows.push(std::mem::take(&mut table.rows[i]));
        }
    }
    table.index = index;
    table.rows = rows;
}

/// Full cleaning pass in pipeline order.
pub fn clean(table: &mut NormalizedTable) {
    remove_unnamed_columns(table);
    combine_duplicate_columns(table);
    sanitize(table);
    sort_timestamp(table);
    remove_index_duplicates(table);
}
