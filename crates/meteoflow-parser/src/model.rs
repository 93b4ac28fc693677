use std::fmt;

use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::errors::ReadError;

/// Placeholder units for columns whose source file carries no units row.
pub const UNITS_NOT_GIVEN: &str = "-not-given-";

/// Prefix for columns that have data but no usable header name.
pub const UNNAMED_PREFIX: &str = "Unnamed";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Float(f64),
    Text(String),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view, accepting floats that are whole numbers (record-type
    /// identifiers often arrive as `103.0`).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            CellValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Missing => f.write_str(""),
        }
    }
}

/// Raw column identity: header name plus the units sub-label where the file
/// provides one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnId {
    pub name: String,
    pub units: String,
}

impl ColumnId {
    pub fn new(name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
        }
    }

    pub fn unnamed(index: usize) -> Self {
        Self {
            name: format!("{UNNAMED_PREFIX}_{index}"),
            units: UNITS_NOT_GIVEN.to_string(),
        }
    }

    pub fn is_unnamed(&self) -> bool {
        self.name.starts_with(UNNAMED_PREFIX) || self.name.trim().is_empty()
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.units)
    }
}

/// Table as read from the file: ordered rows, no timestamp index yet.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<ColumnId>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(columns: Vec<ColumnId>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Appends a row, padding or truncating to the table width.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.width(), CellValue::Missing);
        self.rows.push(row);
    }

    pub fn remove_column(&mut self, index: usize) {
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
    }
}

/// Table keyed by a single datetime axis. Not yet guaranteed sorted or
/// deduplicated; cleaning passes establish that before resolution.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub columns: Vec<ColumnId>,
    pub index: Vec<NaiveDateTime>,
    pub rows: Vec<Vec<CellValue>>,
    /// Record-group label set by the alternating normalizer, `None` otherwise.
    pub group: Option<String>,
}

impl NormalizedTable {
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Numeric view of one column; text cells read as missing.
    pub fn numeric_column(&self, index: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row[index].as_f64()).collect()
    }

    /// True when the column holds at least one non-missing value.
    pub fn column_has_data(&self, index: usize) -> bool {
        self.rows.iter().any(|row| !row[index].is_missing())
    }

    /// Converts to a polars frame with the timestamp cast to
    /// `Datetime(Microseconds)`. Columns where every present cell is numeric
    /// become `f64` series; anything else becomes a string series.
    pub fn to_dataframe(&self) -> Result<DataFrame, ReadError> {
        let micros: Vec<i64> = self
            .index
            .iter()
            .map(|ts| ts.and_utc().timestamp_micros())
            .collect();
        let ts_series = Series::new("timestamp".into(), micros)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

        let mut cols: Vec<Column> = Vec::with_capacity(self.width() + 1);
        cols.push(ts_series.into());

        for (idx, column) in self.columns.iter().enumerate() {
            let all_numeric = self
                .rows
                .iter()
                .all(|row| !matches!(row[idx], CellValue::Text(_)));
            if all_numeric {
                let values: Vec<Option<f64>> = self.numeric_column(idx);
                cols.push(Series::new(column.name.as_str().into(), values).into());
            } else {
                let owned: Vec<Option<String>> = self
                    .rows
                    .iter()
                    .map(|row| match &row[idx] {
                        CellValue::Missing => None,
                        other => Some(other.to_string()),
                    })
                    .collect();
                let utf8: Vec<Option<&str>> = owned.iter().map(|v| v.as_deref()).collect();
                cols.push(Series::new(column.name.as_str().into(), utf8).into());
            }
        }

        Ok(DataFrame::new(cols)?)
    }
}
