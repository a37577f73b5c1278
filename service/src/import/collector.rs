//! Error collection across a whole import run

use sheetsync_core::error::{ErrorEntry, Result, RowRef, SheetError};

/// Accumulates errors without interrupting row processing
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    sheet: String,
    entries: Vec<ErrorEntry>,
}

impl ErrorCollector {
    /// Empty collector for a sheet
    #[must_use]
    pub fn new(sheet: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            entries: Vec::new(),
        }
    }

    /// Record an error that is not tied to a row
    pub fn sheet_error(&mut self, column: Option<&str>, message: impl Into<String>) {
        self.push(RowRef::NotApplicable, column, vec![message.into()]);
    }

    /// Record an error for a one-based sheet row
    pub fn row_error(&mut self, row: usize, column: Option<&str>, message: impl Into<String>) {
        self.push(RowRef::Row(row), column, vec![message.into()]);
    }

    /// Record several messages for the same row and column
    pub fn row_errors(&mut self, row: usize, column: Option<&str>, messages: Vec<String>) {
        if !messages.is_empty() {
            self.push(RowRef::Row(row), column, messages);
        }
    }

    fn push(&mut self, row: RowRef, column: Option<&str>, errors: Vec<String>) {
        self.entries.push(ErrorEntry {
            sheet: self.sheet.clone(),
            row,
            column: column.map(ToString::to_string),
            errors,
        });
    }

    /// Nothing was collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Collected entries, in the order they were recorded
    #[must_use]
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// Consume the collector
    #[must_use]
    pub fn into_entries(self) -> Vec<ErrorEntry> {
        self.entries
    }

    /// `Ok(value)` when empty, the aggregate failure otherwise
    ///
    /// # Errors
    ///
    /// Returns `SheetError::BulkUpdateFailed` carrying every entry
    pub fn into_result<T>(self, value: T) -> Result<T> {
        if self.entries.is_empty() {
            Ok(value)
        } else {
            Err(SheetError::BulkUpdateFailed(self.entries))
        }
    }
}
