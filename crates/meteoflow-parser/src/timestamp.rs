use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::directives::TimestampSpec;
use crate::errors::ReadError;
use crate::model::{NormalizedTable, RawTable};

/// Columns that only exist to carry timestamp components; removed from the
/// table once the datetime index is built.
pub const TIMESTAMP_WORK_COLUMNS: &[&str] =
    &["DOY", "YEAR", "MONTH", "DAY", "HOUR", "MINUTE", "TIME"];

/// True when a column is consumed by timestamp construction and therefore
/// absent from the normalized table.
pub fn is_work_column(name: &str, spec: &TimestampSpec) -> bool {
    if TIMESTAMP_WORK_COLUMNS.contains(&name) {
        return true;
    }
    matches!(spec, TimestampSpec::Single { column, .. } if column == name)
}

/// Builds the datetime index for a raw table. Rows where the timestamp
/// cannot be constructed are dropped, never defaulted. The columns used to
/// build the timestamp are removed from the result.
pub fn build_timestamp(
    table: RawTable,
    spec: &TimestampSpec,
) -> Result<NormalizedTable, ReadError> {
    match spec {
        TimestampSpec::Single { column, format } => build_single(table, column, format),
        TimestampSpec::Ymdhm => build_ymdhm(table),
        TimestampSpec::YearDoyTime => build_year_doy_time(table),
    }
}

fn build_single(
    table: RawTable,
    column: &str,
    format: &str,
) -> Result<NormalizedTable, ReadError> {
    if table.is_empty() && table.columns.is_empty() {
        return Ok(NormalizedTable::default());
    }

    let ts_idx = table
        .column_index(column)
        .ok_or_else(|| ReadError::MissingColumn {
            column: column.to_string(),
        })?;

    let mut index = Vec::with_capacity(table.height());
    let mut rows = Vec::with_capacity(table.height());
    for mut row in table.rows {
        let parsed = parse_cell_datetime(&row[ts_idx].to_string(), format);
        if let Some(ts) = parsed {
            row.remove(ts_idx);
            index.push(ts);
            rows.push(row);
        }
    }

    let mut columns = table.columns;
    columns.remove(ts_idx);

    let mut normalized = NormalizedTable {
        columns,
        index,
        rows,
        group: None,
    };
    drop_work_columns(&mut normalized);
    Ok(normalized)
}

fn parse_cell_datetime(value: &str, format: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Logger timestamps sometimes carry fractional seconds the configured
    // format does not mention.
    NaiveDateTime::parse_from_str(trimmed, format)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, &format!("{format}%.f")))
        .ok()
}

fn build_ymdhm(table: RawTable) -> Result<NormalizedTable, ReadError> {
    let component_columns = ["YEAR", "MONTH", "DAY", "HOUR", "MINUTE"];
    let mut indices = Vec::with_capacity(component_columns.len());
    for name in component_columns {
        let idx = table
            .column_index(name)
            .ok_or_else(|| ReadError::MissingColumn {
                column: name.to_string(),
            })?;
        indices.push(idx);
    }

    let mut index = Vec::with_capacity(table.height());
    let mut rows = Vec::with_capacity(table.height());
    for row in table.rows {
        let components: Vec<Option<i64>> = indices.iter().map(|&i| row[i].as_i64()).collect();
        let &[year, month, day, hour, minute] = components.as_slice() else {
            continue;
        };
        let (Some(year), Some(month), Some(day), Some(hour), Some(minute)) =
            (year, month, day, hour, minute)
        else {
            continue;
        };
        let Some(ts) = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, 0))
        else {
            continue;
        };
        index.push(ts);
        rows.push(row);
    }

    let mut normalized = NormalizedTable {
        columns: table.columns,
        index,
        rows,
        group: None,
    };
    drop_work_columns(&mut normalized);
    Ok(normalized)
}

fn build_year_doy_time(table: RawTable) -> Result<NormalizedTable, ReadError> {
    let component_columns = ["YEAR", "DOY", "TIME"];
    let mut indices = Vec::with_capacity(component_columns.len());
    for name in component_columns {
        let idx = table
            .column_index(name)
            .ok_or_else(|| ReadError::MissingColumn {
                column: name.to_string(),
            })?;
        indices.push(idx);
    }
    let (year_idx, doy_idx, time_idx) = (indices[0], indices[1], indices[2]);

    let mut index = Vec::with_capacity(table.height());
    let mut rows = Vec::with_capacity(table.height());
    for row in table.rows {
        let (Some(year), Some(doy), Some(time)) = (
            row[year_idx].as_i64(),
            row[doy_idx].as_i64(),
            row[time_idx].as_i64(),
        ) else {
            continue;
        };
        // DOY 0 marks rows without a usable date.
        if doy == 0 {
            continue;
        }
        let (hour, minute) = (time / 100, time % 100);
        let Some(ts) = NaiveDate::from_ymd_opt(year as i32, 1, 1)
            .and_then(|base| base.and_hms_opt(0, 0, 0))
            // Day-of-year is one-based in the files, zero-based here.
            .map(|base| base + Duration::days(doy - 1))
            .and_then(|base| {
                if (0..24).contains(&hour) && (0..60).contains(&minute) {
                    Some(base + Duration::hours(hour) + Duration::minutes(minute))
                } else {
                    None
                }
            })
        else {
            continue;
        };
        index.push(ts);
        rows.push(row);
    }

    let mut normalized = NormalizedTable {
        columns: table.columns,
        index,
        rows,
        group: None,
    };
    drop_work_columns(&mut normalized);
    Ok(normalized)
}

fn drop_work_columns(table: &mut NormalizedTable) {
    let mut idx = 0;
    while idx < table.columns.len() {
        if TIMESTAMP_WORK_COLUMNS.contains(&table.columns[idx].name.as_str()) {
            table.columns.remove(idx);
            for row in &mut table.rows {
                row.remove(idx);
            }
        } else {
            idx += 1;
        }
    }
}
