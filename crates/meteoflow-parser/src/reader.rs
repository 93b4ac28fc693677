use std::path::Path;

use crate::directives::ReadDirectives;
use crate::errors::{ReadAttempt, ReadError};
use crate::model::{CellValue, ColumnId, RawTable, UNITS_NOT_GIVEN};

/// Result of reading one file: the table (possibly empty) plus the trail of
/// failed strategies. A file that defeats every strategy contributes zero
/// rows instead of aborting the run.
#[derive(Debug)]
pub struct ReadOutcome {
    pub table: RawTable,
    pub attempts: Vec<ReadAttempt>,
}

/// Reads one raw data file according to a filetype's parsing directives.
///
/// Reading is attempted with progressively more tolerant strategies:
/// 1. the configured directives as-is;
/// 2. skipping the first two physical rows (files that start with an empty
///    row followed by a malformed one);
/// 3. stripping NUL bytes before parsing.
pub struct FiletypeReader<'a> {
    directives: &'a ReadDirectives,
    /// Column names used when the file has no header rows, in catalogue
    /// declaration order.
    catalogue_names: &'a [String],
}

impl<'a> FiletypeReader<'a> {
    pub fn new(directives: &'a ReadDirectives, catalogue_names: &'a [String]) -> Self {
        Self {
            directives,
            catalogue_names,
        }
    }

    pub fn read_path(&self, path: &Path) -> Result<ReadOutcome, ReadError> {
        let bytes = std::fs::read(path)?;
        // Field loggers produce a mix of encodings; a lossy decode keeps the
        // numeric payload intact either way.
        let content = String::from_utf8_lossy(&bytes);
        Ok(self.read_str(&content))
    }

    pub fn read_str(&self, content: &str) -> ReadOutcome {
        let mut attempts = Vec::new();

        // NUL bytes defeat strict line parsing; strip them up front and
        // record that the strict strategy was bypassed.
        let content = if content.contains('\0') {
            attempts.push(ReadAttempt::new(
                "strict",
                "NUL bytes in input, parsing NUL-stripped content",
            ));
            std::borrow::Cow::Owned(content.replace('\0', ""))
        } else {
            std::borrow::Cow::Borrowed(content)
        };

        match self.parse(&content, &self.directives.skip_rows) {
            Ok(table) => {
                return ReadOutcome {
                    table: self.remove_bad_rows(table),
                    attempts,
                }
            }
            Err(err) => attempts.push(ReadAttempt::new("configured", err.to_string())),
        }

        // Files sometimes start with an empty row followed by a malformed
        // one; skipping both physical rows recovers the rest.
        match self.parse(&content, &[0, 1]) {
            Ok(table) => ReadOutcome {
                table: self.remove_bad_rows(table),
                attempts,
            },
            Err(err) => {
                attempts.push(ReadAttempt::new("skip-leading-rows", err.to_string()));
                ReadOutcome {
                    table: RawTable::default(),
                    attempts,
                }
            }
        }
    }

    fn parse(&self, content: &str, skip_rows: &[usize]) -> Result<RawTable, ReadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.directives.delimiter as u8)
            .from_reader(content.as_bytes());

        let mut records = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            if skip_rows.contains(&row_idx) {
                continue;
            }
            let record = record.map_err(|err| ReadError::Csv { source: err })?;
            records.push(record);
        }

        let mut records = records.into_iter();

        let columns = match self.directives.header_rows {
            0 => {
                // Headerless layout: names come from the variable catalogue,
                // extra data columns become unnamed placeholders.
                let max_width = records.clone().map(|r| r.len()).max().unwrap_or(0);
                let mut columns: Vec<ColumnId> = self
                    .catalogue_names
                    .iter()
                    .map(|name| ColumnId::new(name.clone(), UNITS_NOT_GIVEN))
                    .collect();
                for idx in columns.len()..max_width {
                    columns.push(ColumnId::unnamed(idx));
                }
                columns
            }
            1 => {
                let names = match records.next() {
                    Some(record) => record,
                    None => return Ok(RawTable::default()),
                };
                names
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| named_or_unnamed(name, idx, UNITS_NOT_GIVEN))
                    .collect()
            }
            _ => {
                let names = match records.next() {
                    Some(record) => record,
                    None => return Ok(RawTable::default()),
                };
                let units = match records.next() {
                    Some(record) => record,
                    None => return Ok(RawTable::default()),
                };
                names
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| {
                        let unit = units.get(idx).map(str::trim).unwrap_or("");
                        let unit = if unit.is_empty() { UNITS_NOT_GIVEN } else { unit };
                        named_or_unnamed(name, idx, unit)
                    })
                    .collect()
            }
        };

        let mut table = RawTable::new(columns);
        for record in records {
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let row: Vec<CellValue> = record
                .iter()
                .map(|cell| self.parse_cell(cell))
                .collect();
            table.push_row(row);
        }

        Ok(table)
    }

    fn parse_cell(&self, raw: &str) -> CellValue {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return CellValue::Missing;
        }
        if self.directives.na_values.iter().any(|na| na == trimmed) {
            return CellValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) => CellValue::Float(value),
            Err(_) => CellValue::Text(trimmed.to_string()),
        }
    }

    fn remove_bad_rows(&self, mut table: RawTable) -> RawTable {
        let Some(column) = self.directives.bad_row_column else {
            return table;
        };
        if self.directives.bad_row_markers.is_empty() || column >= table.width() {
            return table;
        }
        let markers = &self.directives.bad_row_markers;
        table.rows.retain(|row| {
            let cell = &row[column];
            !markers.iter().any(|marker| {
                cell.to_string() == *marker
                    || cell.as_i64().map(|id| id.to_string()).as_deref() == Some(marker.as_str())
            })
        });
        table
    }
}

fn named_or_unnamed(name: &str, index: usize, units: &str) -> ColumnId {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        ColumnId::unnamed(index)
    } else {
        ColumnId::new(trimmed, units)
    }
}
