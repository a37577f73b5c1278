//! Table export
//!
//! Produces the two header rows and one row per record, in batches, from
//! the column catalog and a slot plan computed over the exported records.

pub mod rows;
pub mod workbook;

use chrono::NaiveDate;
use indexmap::IndexSet;
use sheetsync_core::config::ExportConfig;
use sheetsync_core::error::Result;
use sheetsync_core::traits::{ContainerRegistry, DocumentStore, EnumerationSource};
use sheetsync_core::types::{ContainerKey, ContainerRef, Record, RecordId};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::columns::{ColumnCatalog, ColumnDescriptor, ColumnSelection, EnumCodec, STANDARD_CATALOG};
use crate::slots::{SlotAllocator, SlotPlan, SlotPolicy};
pub use rows::RowBuilder;
pub use workbook::{WorkbookWriter, column_letter};

/// Options of a single export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Column groups to include
    pub selection: ColumnSelection,
}

impl ExportOptions {
    /// Limit the export to the named column groups
    #[must_use]
    pub fn with_selection(mut self, selection: ColumnSelection) -> Self {
        self.selection = selection;
        self
    }
}

/// One exported cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportCell {
    /// Rendered value; `None` is a blank cell
    pub value: Option<String>,
    /// Read-only in the workbook
    pub locked: bool,
}

/// Exported table: columns, header rows and record rows
#[derive(Debug, Clone)]
pub struct ExportTable {
    /// Parent aggregate the table was exported for
    pub root_id: RecordId,
    /// Column descriptors, in sheet order
    pub columns: Vec<ColumnDescriptor>,
    /// Human header row
    pub labels: Vec<String>,
    /// Machine path header row
    pub paths: Vec<String>,
    /// One row per exported record
    pub rows: Vec<Vec<ExportCell>>,
    /// Slot plan the columns were built from
    pub slot_plan: SlotPlan,
    /// Enumeration values offered by the table's columns
    pub enumerations: EnumCodec,
}

impl ExportTable {
    /// Download filename for an export made on `date`
    #[must_use]
    pub fn filename(&self, date: NaiveDate) -> String {
        export_filename(self.root_id, date)
    }
}

/// `bulk_update.resource_<id>.<YYYY-MM-DD>.xlsx`
#[must_use]
pub fn export_filename(root_id: RecordId, date: NaiveDate) -> String {
    format!("bulk_update.resource_{root_id}.{}.xlsx", date.format("%Y-%m-%d"))
}

/// Builds export tables from a document store
pub struct Exporter<'a> {
    store: &'a dyn DocumentStore,
    enumerations: &'a dyn EnumerationSource,
    containers: &'a dyn ContainerRegistry,
    config: &'a ExportConfig,
    catalog: &'a ColumnCatalog,
}

impl<'a> Exporter<'a> {
    /// Exporter over the standard catalog
    #[must_use]
    pub fn new(
        store: &'a dyn DocumentStore,
        enumerations: &'a dyn EnumerationSource,
        containers: &'a dyn ContainerRegistry,
        config: &'a ExportConfig,
    ) -> Self {
        Self {
            store,
            enumerations,
            containers,
            config,
            catalog: &STANDARD_CATALOG,
        }
    }

    /// Use a different column catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: &'a ColumnCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Export the records of `root_id` named by `record_ids`
    ///
    /// Ids that are unknown or belong to another parent aggregate are
    /// dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::ConfigError` for an unknown column selection and
    /// collaborator errors from the store, the registry or the enumeration source
    pub async fn export_table(
        &self,
        root_id: RecordId,
        record_ids: &[RecordId],
        options: &ExportOptions,
    ) -> Result<ExportTable> {
        self.catalog.check_selection(&options.selection)?;
        info!("Exporting {} record(s) of resource {root_id}", record_ids.len());

        let ids = self.owned_ids(root_id, record_ids).await?;

        let allocator = SlotAllocator::new(self.store, SlotPolicy::from(self.config));
        let slot_plan = allocator.allocate(&ids).await?;
        let columns = self.catalog.columns_for(&slot_plan, &options.selection);

        let enum_names: IndexSet<&str> = columns.iter().filter_map(ColumnDescriptor::enum_name).collect();
        let enumerations = EnumCodec::load(self.enumerations, enum_names).await?;

        let containers: HashMap<ContainerRef, ContainerKey> = self
            .containers
            .lookup(root_id)
            .await?
            .into_iter()
            .map(|(key, uri)| (uri, key))
            .collect();

        let builder = RowBuilder::new(&columns, &enumerations, &containers);
        let mut rows = Vec::with_capacity(ids.len());
        for (n, chunk) in ids.chunks(self.config.batch_size.max(1)).enumerate() {
            let mut loaded: HashMap<RecordId, Record> = self
                .store
                .load_batch(chunk)
                .await?
                .into_iter()
                .map(|r| (r.id, r))
                .collect();
            for id in chunk {
                match loaded.remove(id) {
                    Some(record) => rows.push(builder.build(&record)),
                    None => warn!("Record {id} disappeared during export"),
                }
            }
            debug!("Exported batch {} ({} record(s))", n + 1, chunk.len());
        }

        info!(
            "Exported {} row(s) across {} column(s)",
            rows.len(),
            columns.len()
        );

        Ok(ExportTable {
            root_id,
            labels: columns.iter().map(ColumnDescriptor::header_label).collect(),
            paths: columns.iter().map(ColumnDescriptor::path).collect(),
            columns,
            rows,
            slot_plan,
            enumerations,
        })
    }

    async fn owned_ids(&self, root_id: RecordId, record_ids: &[RecordId]) -> Result<Vec<RecordId>> {
        let requested: IndexSet<RecordId> = record_ids.iter().copied().collect();
        let requested: Vec<RecordId> = requested.into_iter().collect();
        let parents: HashMap<RecordId, RecordId> = self
            .store
            .resolve(&requested)
            .await?
            .into_iter()
            .map(|h| (h.id, h.resource_id))
            .collect();

        Ok(requested
            .into_iter()
            .filter(|id| match parents.get(id) {
                Some(parent) if *parent == root_id => true,
                Some(parent) => {
                    warn!("Skipping record {id}: belongs to resource {parent}, not {root_id}");
                    false
                }
                None => {
                    warn!("Skipping record {id}: not found");
                    false
                }
            })
            .collect())
    }
}
