//! Prelude module for the bulk update service
//!
//! This module re-exports commonly used types and functions for convenient import.

// Re-export core types and traits
pub use sheetsync_core::prelude::*;

// Columns and slots
pub use crate::columns::{ColumnCatalog, ColumnDescriptor, ColumnSelection, OwnerKind};
pub use crate::slots::{SlotPlan, SlotPolicy};

// Export and import
pub use crate::export::{ExportOptions, ExportTable, Exporter, WorkbookWriter};
pub use crate::import::{ImportSummary, Importer, RowOutcome, VecRows, WorkbookRows};

// Collaborators and the facade
pub use crate::adapters::{
    Dataset, MemoryContainerRegistry, MemoryStore, RecordingJobSink, StaticEnumerations,
    TracingJobSink,
};
pub use crate::service::BulkUpdateService;
