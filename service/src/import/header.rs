//! Header parsing and row access

use indexmap::IndexMap;
use sheetsync_core::error::{Result, SheetError};
use sheetsync_core::types::{CellValue, RecordId};

use crate::columns::{ColumnCatalog, ColumnDescriptor, OwnerKind};

/// Sheet row holding the human labels; ignored on import
pub const LABEL_ROW: usize = 0;
/// Sheet row holding the machine paths
pub const PATH_ROW: usize = 1;
/// Rows above the first data row
pub const HEADER_ROWS: usize = 2;

const ID_FIELD: &str = "id";
const VERSION_FIELD: &str = "lock_version";

static EMPTY: CellValue = CellValue::Empty;

/// Columns of an edited sheet, by position
#[derive(Debug, Clone)]
pub struct SheetLayout {
    columns: Vec<(usize, ColumnDescriptor)>,
    id_index: usize,
    version_index: usize,
}

impl SheetLayout {
    /// Decode the machine path row. Blank header cells are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::ColumnNotFound` for an unknown path and
    /// `SheetError::ConfigError` for duplicated paths or a missing id or
    /// version column
    pub fn parse(catalog: &ColumnCatalog, header: &[CellValue]) -> Result<Self> {
        let mut by_path: IndexMap<String, (usize, ColumnDescriptor)> = IndexMap::new();
        for (index, cell) in header.iter().enumerate() {
            let Some(path) = cell.as_text() else {
                continue;
            };
            let column = catalog.column_for_path(&path)?;
            let canonical = column.path();
            if by_path.contains_key(&canonical) {
                return Err(SheetError::config(format!("Duplicate column: {canonical}")));
            }
            by_path.insert(canonical, (index, column));
        }

        let position = |field: &str| {
            by_path
                .get(field)
                .filter(|(_, c)| c.owner == OwnerKind::Root)
                .map(|(index, _)| *index)
                .ok_or_else(|| SheetError::config(format!("Missing required column: {field}")))
        };
        let id_index = position(ID_FIELD)?;
        let version_index = position(VERSION_FIELD)?;

        Ok(Self {
            columns: by_path.into_values().collect(),
            id_index,
            version_index,
        })
    }

    /// Decoded columns with their sheet positions
    pub fn columns(&self) -> impl Iterator<Item = (usize, &ColumnDescriptor)> {
        self.columns.iter().map(|(index, column)| (*index, column))
    }

    /// Number of decoded columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// No columns were decoded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Identity cell of a row
    #[must_use]
    pub fn id_cell<'r>(&self, row: &'r SheetRow) -> &'r CellValue {
        row.cell(self.id_index)
    }

    /// Version token cell of a row
    #[must_use]
    pub fn version_cell<'r>(&self, row: &'r SheetRow) -> &'r CellValue {
        row.cell(self.version_index)
    }
}

/// One data row of the sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// One-based sheet row number
    pub number: usize,
    /// Raw cells
    pub cells: Vec<CellValue>,
}

impl SheetRow {
    /// Row at a zero-based sheet index
    #[must_use]
    pub fn new(index: usize, cells: Vec<CellValue>) -> Self {
        Self {
            number: index + 1,
            cells,
        }
    }

    /// Cell at a column position; missing trailing cells are blank
    #[must_use]
    pub fn cell(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&EMPTY)
    }

    /// Every cell is blank
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_blank)
    }
}

/// Record id held by a cell
///
/// # Errors
///
/// Returns the cell text when it is not a non-negative integer
pub fn parse_id(cell: &CellValue) -> std::result::Result<RecordId, String> {
    let text = cell.as_text().unwrap_or_default();
    text.parse::<RecordId>().map_err(|_| text)
}

/// Version token held by a cell; `None` when blank or not an integer
#[must_use]
pub fn parse_version(cell: &CellValue) -> Option<u64> {
    cell.as_text()?.parse().ok()
}
