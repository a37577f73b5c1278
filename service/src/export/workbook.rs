//! XLSX rendering of export tables
//!
//! The `Updates` sheet carries the human header row, the machine path row
//! and one row per record. It is protected: only unlocked cells can be
//! edited, but columns and rows can still be resized and sorted. Allowed
//! values of enumerated and boolean columns are listed on an `Enums` sheet
//! and enforced with list validation.

use indexmap::IndexMap;
use rust_xlsxwriter::{
    Color, DataValidation, Format, Formula, ProtectionOptions, Workbook, Worksheet, XlsxError,
};
use sheetsync_core::config::BulkUpdateConfig;
use sheetsync_core::error::{Result, SheetError};
use std::path::Path;

use super::ExportTable;
use crate::columns::{ColumnDescriptor, EnumCodec, ValueKind};

/// Name of the sheet listing allowed values
pub const ENUMS_SHEET: &str = "Enums";

const BOOLEAN_VALUES: [&str; 2] = ["true", "false"];

/// Writes export tables as XLSX workbooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookWriter {
    sheet_name: String,
    freeze_columns: u16,
}

impl Default for WorkbookWriter {
    fn default() -> Self {
        Self::from_config(&BulkUpdateConfig::default())
    }
}

impl WorkbookWriter {
    /// Writer for a named updates sheet
    #[must_use]
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            freeze_columns: 3,
        }
    }

    /// Writer using the configured sheet name and frozen columns
    #[must_use]
    pub fn from_config(config: &BulkUpdateConfig) -> Self {
        Self::new(config.import.sheet_name.clone()).with_freeze_columns(config.export.freeze_columns)
    }

    /// Number of leading columns kept visible while scrolling
    #[must_use]
    pub fn with_freeze_columns(mut self, columns: u16) -> Self {
        self.freeze_columns = columns;
        self
    }

    /// Render a table to an in-memory workbook
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Workbook` if the workbook cannot be built
    pub fn write(&self, table: &ExportTable) -> Result<Vec<u8>> {
        let lists = ValueLists::collect(&table.columns, &table.enumerations);
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        self.write_updates_sheet(sheet, table, &lists)?;

        let enums = workbook.add_worksheet();
        lists.write(enums)?;

        workbook
            .save_to_buffer()
            .map_err(|e| SheetError::workbook(format!("Failed to save workbook: {e}")))
    }

    /// Render a table to a file
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Workbook` if the workbook cannot be built and
    /// `SheetError::IoError` if the file cannot be written
    pub fn write_file(&self, table: &ExportTable, path: &Path) -> Result<()> {
        let content = self.write(table)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn write_updates_sheet(
        &self,
        sheet: &mut Worksheet,
        table: &ExportTable,
        lists: &ValueLists,
    ) -> Result<()> {
        // cells are locked unless their format says otherwise
        let header_format = Format::new().set_bold().set_font_size(12.0);
        let path_format = Format::new().set_font_size(8.0).set_font_color(Color::Gray);
        let locked_format = Format::new().set_font_size(8.0).set_font_color(Color::Gray);
        let unlocked_format = Format::new().set_unlocked();

        sheet.set_name(&self.sheet_name).map_err(xlsx_error)?;

        for (index, column) in table.columns.iter().enumerate() {
            let col = column_index(index)?;
            sheet
                .write_string_with_format(0, col, header_label(table, index), &header_format)
                .map_err(xlsx_error)?;
            sheet
                .write_string_with_format(1, col, machine_path(table, index), &path_format)
                .map_err(xlsx_error)?;
            if let Some(width) = column.width {
                sheet
                    .set_column_width(col, f64::from(width))
                    .map_err(xlsx_error)?;
            }
        }

        for (offset, cells) in table.rows.iter().enumerate() {
            let row = row_index(offset)?;
            for (index, cell) in cells.iter().enumerate() {
                let col = column_index(index)?;
                let format = if cell.locked {
                    &locked_format
                } else {
                    &unlocked_format
                };
                let written = match &cell.value {
                    Some(value) => sheet.write_string_with_format(row, col, value, format),
                    None => sheet.write_blank(row, col, format),
                };
                written.map_err(xlsx_error)?;
            }
        }

        if !table.rows.is_empty() {
            let last_row = row_index(table.rows.len() - 1)?;
            for (index, column) in table.columns.iter().enumerate() {
                let Some((list_col, len)) = lists.position(column) else {
                    continue;
                };
                let formula = format!(
                    "={ENUMS_SHEET}!${letter}$2:${letter}${end}",
                    letter = column_letter(list_col),
                    end = len + 1
                );
                let validation = DataValidation::new().allow_list_formula(Formula::new(formula));
                let col = column_index(index)?;
                sheet
                    .add_data_validation(2, col, last_row, col, &validation)
                    .map_err(xlsx_error)?;
            }
        }

        sheet.set_freeze_panes(1, self.freeze_columns).map_err(xlsx_error)?;

        let mut protection = ProtectionOptions::new();
        protection.format_columns = true;
        protection.format_rows = true;
        protection.sort = true;
        sheet.protect_with_options(&protection);

        Ok(())
    }
}

/// Allowed value lists, one per distinct enumeration/skip combination
#[derive(Debug, Default)]
struct ValueLists {
    lists: IndexMap<String, Vec<String>>,
}

impl ValueLists {
    fn collect(columns: &[ColumnDescriptor], codec: &EnumCodec) -> Self {
        let mut lists = Self::default();
        for column in columns {
            let Some(key) = Self::key(column) else {
                continue;
            };
            if lists.lists.contains_key(&key) {
                continue;
            }
            let mut values = match column.value_kind {
                ValueKind::Enumeration(name) => codec.offered_values(name, column.skip_values),
                _ => BOOLEAN_VALUES.iter().map(ToString::to_string).collect(),
            };
            if column.value_kind != ValueKind::Boolean {
                values.sort_by_key(|v| v.to_lowercase());
            }
            lists.lists.insert(key, values);
        }
        lists
    }

    fn key(column: &ColumnDescriptor) -> Option<String> {
        match column.value_kind {
            ValueKind::Enumeration(name) if column.skip_values.is_empty() => Some(name.to_string()),
            ValueKind::Enumeration(name) => {
                Some(format!("{name} (without {})", column.skip_values.join(", ")))
            }
            ValueKind::Boolean => Some("boolean".to_string()),
            _ => None,
        }
    }

    /// Enums sheet column and value count for a column's list
    fn position(&self, column: &ColumnDescriptor) -> Option<(u16, usize)> {
        let key = Self::key(column)?;
        let (index, _, values) = self.lists.get_full(&key)?;
        if values.is_empty() {
            return None;
        }
        Some((u16::try_from(index).ok()?, values.len()))
    }

    fn write(&self, sheet: &mut Worksheet) -> Result<()> {
        let header_format = Format::new().set_bold();
        sheet.set_name(ENUMS_SHEET).map_err(xlsx_error)?;
        for (index, (key, values)) in self.lists.iter().enumerate() {
            let col = column_index(index)?;
            sheet
                .write_string_with_format(0, col, key, &header_format)
                .map_err(xlsx_error)?;
            for (offset, value) in values.iter().enumerate() {
                let row = u32::try_from(offset + 1)
                    .map_err(|_| SheetError::workbook("Too many enumeration values"))?;
                sheet.write_string(row, col, value).map_err(xlsx_error)?;
            }
        }
        sheet.protect();
        Ok(())
    }
}

fn header_label(table: &ExportTable, index: usize) -> &str {
    table.labels.get(index).map_or("", String::as_str)
}

fn machine_path(table: &ExportTable, index: usize) -> &str {
    table.paths.get(index).map_or("", String::as_str)
}

fn xlsx_error(err: XlsxError) -> SheetError {
    SheetError::workbook(err.to_string())
}

fn column_index(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| SheetError::workbook(format!("Column {index} out of range")))
}

/// Sheet row of a data row; data starts below the two header rows
fn row_index(offset: usize) -> Result<u32> {
    u32::try_from(offset + 2).map_err(|_| SheetError::workbook(format!("Row {offset} out of range")))
}

/// Spreadsheet column letters for a zero-based index: 0 is `A`, 26 is `AA`
#[must_use]
pub fn column_letter(index: u16) -> String {
    let mut n = u32::from(index) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from_u32(u32::from(b'A') + rem).unwrap_or('A'));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
