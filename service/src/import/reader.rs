//! Row sources: XLSX workbooks and in-memory tables

use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDate;
use sheetsync_core::error::{Result, SheetError};
use sheetsync_core::traits::{RowIter, RowSource};
use sheetsync_core::types::CellValue;
use std::io::Cursor;
use std::path::Path;

use crate::export::ExportTable;

/// Reads one worksheet of an XLSX workbook
///
/// The workbook is kept as bytes so it can be opened once for the pre-flight
/// pass and again for merging.
#[derive(Debug, Clone)]
pub struct WorkbookRows {
    bytes: Vec<u8>,
    sheet_name: String,
}

impl WorkbookRows {
    /// Row source over workbook bytes
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, sheet_name: impl Into<String>) -> Self {
        Self {
            bytes,
            sheet_name: sheet_name.into(),
        }
    }

    /// Row source over a workbook file
    ///
    /// # Errors
    ///
    /// Returns `SheetError::IoError` if the file cannot be read
    pub fn open_path(path: &Path, sheet_name: impl Into<String>) -> Result<Self> {
        Ok(Self::from_bytes(std::fs::read(path)?, sheet_name))
    }

    /// Worksheet the rows are read from
    #[must_use]
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    fn read_rows(&self) -> Result<Vec<Vec<CellValue>>> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(self.bytes.as_slice()))
            .map_err(|e| SheetError::workbook(format!("Failed to open workbook: {e}")))?;
        let range = workbook.worksheet_range(&self.sheet_name).map_err(|e| {
            SheetError::parse_at(format!("Failed to read worksheet: {e}"), &self.sheet_name)
        })?;

        // ranges start at the first used cell, not at A1
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<CellValue>> = (0..start_row).map(|_| Vec::new()).collect();
        rows.extend(range.rows().map(|cells| {
            let mut row: Vec<CellValue> = (0..start_col).map(|_| CellValue::Empty).collect();
            row.extend(cells.iter().map(cell_value));
            row
        }));
        Ok(rows)
    }
}

impl RowSource for WorkbookRows {
    fn open(&self) -> Result<RowIter<'_>> {
        let rows = self.read_rows()?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

#[allow(clippy::cast_precision_loss)]
fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(CellValue::Number(dt.as_f64()), |value| CellValue::Date(value.date())),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .map_or_else(|| CellValue::String(s.clone()), CellValue::Date),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}

/// Rows held in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VecRows {
    rows: Vec<Vec<CellValue>>,
}

impl VecRows {
    /// Row source over the given rows, header rows included
    #[must_use]
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Rows an exported table would show in a workbook
    #[must_use]
    pub fn from_table(table: &ExportTable) -> Self {
        let text_row = |values: &[String]| -> Vec<CellValue> {
            values.iter().map(|v| CellValue::from(v.as_str())).collect()
        };
        let mut rows = vec![text_row(&table.labels), text_row(&table.paths)];
        rows.extend(table.rows.iter().map(|cells| {
            cells
                .iter()
                .map(|cell| cell.value.as_deref().map_or(CellValue::Empty, CellValue::from))
                .collect()
        }));
        Self { rows }
    }

    /// Every row, header rows included
    #[must_use]
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Append a row
    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    /// Overwrite the cell of a data row (zero-based, below the headers) in
    /// the column with the given machine path; returns whether the column exists
    pub fn set_cell(&mut self, data_row: usize, path: &str, value: impl Into<CellValue>) -> bool {
        let Some(index) = self
            .rows
            .get(1)
            .and_then(|header| header.iter().position(|c| c.as_text().as_deref() == Some(path)))
        else {
            return false;
        };
        let Some(row) = self.rows.get_mut(data_row + 2) else {
            return false;
        };
        if row.len() <= index {
            row.resize(index + 1, CellValue::Empty);
        }
        row[index] = value.into();
        true
    }
}

impl RowSource for VecRows {
    fn open(&self) -> Result<RowIter<'_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}
