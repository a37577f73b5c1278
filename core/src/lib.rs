//! # Sheetsync Core
//!
//! Core types, collaborator traits and configuration for round-tripping
//! hierarchical archival records through an editable spreadsheet.
//!
//! The service crate builds the exporter and the reconciliation engine on
//! top of the record model in [`types`] and the seams in [`traits`].

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Error types shared by exporter, importer and collaborators
pub mod error;

/// Collaborator traits: document store, enumerations, containers, job output
pub mod traits;

/// Record model and cell values
pub mod types;

/// Bulk update configuration
pub mod config;

// Re-export commonly used types
pub use config::BulkUpdateConfig;
pub use error::{ErrorEntry, Result, RowRef, SheetError};
pub use serde_json::Value;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BulkUpdateConfig, ExportConfig, ImportConfig};
    pub use crate::error::{
        EnumerationError, ErrorEntry, RegistryError, Result, RowRef, SheetError, StoreError,
        StoreResult, UpdateError,
    };
    pub use crate::traits::{
        ContainerRegistry, DocumentStore, EnumerationSource, JobSink, RowIter, RowSource,
        StoreTransaction,
    };
    pub use crate::types::{
        CellValue, ContainerKey, ContainerRef, FieldMap, Instance, MultipartNote, Note, NoteType,
        Record, RecordHeader, RecordId, SubContainer, Subnote, SubrecordKind,
    };
}
