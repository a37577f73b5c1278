//! Error types for bulk update operations

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::types::{ContainerKey, RecordId};

/// Main error type for sheet export and import
#[derive(Error, Debug)]
pub enum SheetError {
    /// A header path that names no known column
    #[error("Column definition not found for {path}")]
    ColumnNotFound {
        /// Machine path as read from the sheet
        path: String,
    },

    /// Sheet structure errors
    #[error("Failed to parse sheet: {message}")]
    ParseError {
        /// Error message
        message: String,
        /// Sheet location if available
        location: Option<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Document store failures
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Container registry failures
    #[error("Container registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Enumeration lookup failures
    #[error("Enumeration error: {0}")]
    Enumeration(#[from] EnumerationError),

    /// Workbook encoding or decoding failures
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The import collected errors and nothing was persisted
    #[error("Bulk update failed with {} error(s)", .0.len())]
    BulkUpdateFailed(Vec<ErrorEntry>),
}

/// Result type alias for sheet operations
pub type Result<T> = std::result::Result<T, SheetError>;

impl SheetError {
    /// Create a new column-not-found error
    #[must_use]
    pub fn column_not_found(path: impl Into<String>) -> Self {
        Self::ColumnNotFound { path: path.into() }
    }

    /// Create a new parse error
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: None,
        }
    }

    /// Create a new parse error with location
    #[must_use]
    pub fn parse_at(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a new workbook error
    #[must_use]
    pub fn workbook(message: impl Into<String>) -> Self {
        Self::Workbook(message.into())
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError(message.into())
    }

    /// Collected errors when this is a failed bulk update
    #[must_use]
    pub fn entries(&self) -> Option<&[ErrorEntry]> {
        match self {
            Self::BulkUpdateFailed(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SheetError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for SheetError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Errors raised by a document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record does not exist
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// Backend failure
    #[error("{0}")]
    Backend(String),
}

/// Result type alias for document store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised when a store rejects a record update
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Field-level validation failures keyed by property name
    #[error("Validation failed for {} propert(ies)", errors.len())]
    Validation {
        /// Messages per property
        errors: IndexMap<String, Vec<String>>,
    },

    /// The stored record moved on since it was loaded
    #[error("Record {id} has version {actual}, update was based on {expected}")]
    Conflict {
        /// Record id
        id: RecordId,
        /// Version the update was based on
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Store failure unrelated to the record content
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UpdateError {
    /// Create a validation error for a single property
    #[must_use]
    pub fn validation(property: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = IndexMap::new();
        errors.insert(property.into(), vec![message.into()]);
        Self::Validation { errors }
    }
}

/// Errors raised by a container registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Container already registered under the parent
    #[error("Container already exists: {0}")]
    Duplicate(ContainerKey),

    /// Backend failure
    #[error("{0}")]
    Backend(String),
}

/// Errors raised by an enumeration source
#[derive(Error, Debug)]
pub enum EnumerationError {
    /// Enumeration name is not known
    #[error("Unknown enumeration: {0}")]
    Unknown(String),

    /// Backend failure
    #[error("{0}")]
    Backend(String),
}

/// Row reference for a collected error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRef {
    /// One-based sheet row number
    Row(usize),
    /// Error is not tied to a row
    NotApplicable,
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(n) => write!(f, "{n}"),
            Self::NotApplicable => f.write_str("N/A"),
        }
    }
}

impl Serialize for RowRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Row(n) => serializer.serialize_u64(*n as u64),
            Self::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

/// One collected error: where it happened and what went wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    /// Sheet name
    pub sheet: String,
    /// Row the error belongs to
    pub row: RowRef,
    /// Machine path or property name, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Messages
    pub errors: Vec<String>,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}", self.sheet, self.row)?;
        if let Some(column) = &self.column {
            write!(f, " [{column}]")?;
        }
        write!(f, ": {}", self.errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_creation() {
        let err = SheetError::parse("Missing header row");
        assert!(matches!(err, SheetError::ParseError { .. }));

        let err = SheetError::parse_at("Unexpected cell", "row 3");
        match err {
            SheetError::ParseError { location, .. } => {
                assert_eq!(location.as_deref(), Some("row 3"));
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = SheetError::column_not_found("widgets/0/size");
        assert_eq!(
            err.to_string(),
            "Column definition not found for widgets/0/size"
        );

        let err = SheetError::BulkUpdateFailed(vec![ErrorEntry {
            sheet: "Updates".to_string(),
            row: RowRef::Row(4),
            column: None,
            errors: vec!["bad".to_string()],
        }]);
        assert_eq!(err.to_string(), "Bulk update failed with 1 error(s)");
        assert_eq!(err.entries().map(<[ErrorEntry]>::len), Some(1));
    }

    #[test]
    fn test_row_ref_serialization() {
        let entry = ErrorEntry {
            sheet: "Updates".to_string(),
            row: RowRef::NotApplicable,
            column: Some("id".to_string()),
            errors: vec!["Record not found for id: 7".to_string()],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["row"], "N/A");
        assert_eq!(json["column"], "id");
        assert_eq!(entry.to_string(), "Updates row N/A [id]: Record not found for id: 7");

        let numbered = serde_json::to_value(RowRef::Row(12)).unwrap();
        assert_eq!(numbered, serde_json::json!(12));
    }

    #[test]
    fn test_error_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: SheetError = json_err.into();
        assert!(matches!(err, SheetError::SerializationError(_)));

        let err: SheetError = StoreError::NotFound(3).into();
        assert_eq!(err.to_string(), "Store error: Record not found: 3");
    }
}
