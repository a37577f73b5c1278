//! # Sheetsync Service
//!
//! Spreadsheet round trips for hierarchical archival records.
//!
//! Records of one parent aggregate are flattened into a rectangular sheet:
//! one row per record, one column per addressable field. Repeating parts of
//! a record (dates, extents, instances, notes) get a fixed number of slots,
//! enough for the fullest record plus some padding. The second header row
//! carries a machine path for every column so the edited sheet can be read
//! back without any other metadata.
//!
//! On import each edited row is reconciled with its stored record: changed
//! fields are patched, new slots create subrecords, emptied slots may delete
//! them, and top containers are resolved by their natural key. The whole
//! import runs in one store transaction and either commits every change or
//! none of them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheetsync_service::prelude::*;
//! use std::path::Path;
//!
//! # async fn run() -> sheetsync_core::Result<()> {
//! let adapters = Dataset::load(Path::new("dataset.json"))?.into_adapters();
//! let service = BulkUpdateService::from_adapters(&adapters);
//!
//! let (filename, bytes) = service
//!     .export_workbook(1, &[10, 11], &ExportOptions::default())
//!     .await?;
//! std::fs::write(&filename, bytes)?;
//!
//! // ... edit the workbook ...
//!
//! let summary = service.import_workbook(std::fs::read(&filename)?).await?;
//! println!("{} record(s) updated", summary.updated);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`columns`]: column descriptors, machine paths and enumeration cells
//! - [`slots`]: slot allocation for repeating parts
//! - [`export`]: export tables and the XLSX writer
//! - [`import`]: the reconciliation engine and row sources
//! - [`adapters`]: in-memory collaborators and the dataset file
//! - [`service`]: the [`BulkUpdateService`] facade

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // errors are documented on the service facade
#![allow(clippy::too_many_arguments)]

/// Column descriptors, catalog and cell codecs
pub mod columns;

/// Slot allocation for repeating record parts
pub mod slots;

/// Table export and workbook rendering
pub mod export;

/// Reconciliation of edited sheets
pub mod import;

/// Collaborator implementations
pub mod adapters;

/// Service facade
pub mod service;

/// Command-line interface
pub mod cli;

/// Prelude module for convenient imports
pub mod prelude;

pub use export::{ExportOptions, ExportTable, Exporter, WorkbookWriter};
pub use import::{ImportSummary, Importer, VecRows, WorkbookRows};
pub use service::BulkUpdateService;
pub use sheetsync_core::error::{ErrorEntry, Result, RowRef, SheetError};
