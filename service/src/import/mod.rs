//! Reconciliation engine
//!
//! Reads an edited sheet back, checks it as a whole, then merges it row by
//! row into the stored records inside one store transaction. Errors are
//! collected rather than raised; when any were collected once every row has
//! been processed the transaction is rolled back and the run fails with all
//! of them. Otherwise it commits.

pub mod collector;
pub mod context;
pub mod header;
pub mod instances;
pub mod merge;
pub mod notes;
pub mod preflight;
pub mod reader;

use serde::Serialize;
use sheetsync_core::config::ImportConfig;
use sheetsync_core::error::{Result, SheetError, UpdateError};
use sheetsync_core::traits::{
    ContainerRegistry, DocumentStore, JobSink, RowIter, RowSource, StoreTransaction,
};
use sheetsync_core::types::{Record, RecordId};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::columns::{ColumnCatalog, STANDARD_CATALOG};
pub use collector::ErrorCollector;
pub use context::{ContainerIndex, RunContext};
pub use header::{SheetLayout, SheetRow};
pub use merge::{RowOutcome, merge_row};
pub use reader::{VecRows, WorkbookRows};

use header::{HEADER_ROWS, PATH_ROW};

/// What a successful import changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Number of records persisted
    pub updated: usize,
    /// URIs of the persisted records, in sheet order
    pub updated_uris: Vec<String>,
}

/// Imports edited sheets into a document store
pub struct Importer<'a> {
    store: &'a dyn DocumentStore,
    registry: &'a dyn ContainerRegistry,
    sink: &'a dyn JobSink,
    config: &'a ImportConfig,
    catalog: &'a ColumnCatalog,
}

impl<'a> Importer<'a> {
    /// Importer over the standard catalog
    #[must_use]
    pub fn new(
        store: &'a dyn DocumentStore,
        registry: &'a dyn ContainerRegistry,
        sink: &'a dyn JobSink,
        config: &'a ImportConfig,
    ) -> Self {
        Self {
            store,
            registry,
            sink,
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

    /// Import an edited sheet
    ///
    /// # Errors
    ///
    /// Returns `SheetError::ColumnNotFound` or `SheetError::ConfigError` for
    /// an unusable header, `SheetError::BulkUpdateFailed` with every
    /// collected entry when pre-flight checks or any row failed (nothing is
    /// persisted), and collaborator errors as they occur
    pub async fn import_table(&self, source: &dyn RowSource) -> Result<ImportSummary> {
        let layout = self.read_layout(source)?;
        debug!(columns = layout.len(), "Parsed sheet header");

        let mut errors = ErrorCollector::new(self.config.sheet_name.clone());
        let preflight =
            preflight::check(self.store, &layout, data_rows(source.open()?), &mut errors).await?;
        errors.into_result(())?;
        let Some(parent_id) = preflight.parent_id else {
            info!("Sheet has no data rows, nothing to import");
            return Ok(ImportSummary::default());
        };
        info!(
            "Importing {} record(s) of resource {parent_id}",
            preflight.record_ids.len()
        );

        let containers = ContainerIndex::load(self.registry, parent_id).await?;
        let mut context = RunContext::new(self.config, self.registry, containers);

        let mut transaction = self.store.begin().await?;
        let processed = self
            .process(transaction.as_mut(), &mut context, &layout, source)
            .await;

        match processed {
            Ok(summary) if context.errors.is_empty() => {
                transaction.commit().await?;
                info!("Import committed, {} record(s) updated", summary.updated);
                Ok(summary)
            }
            Ok(summary) => {
                transaction.rollback().await?;
                warn!(
                    "Import rolled back with {} error(s)",
                    context.errors.len()
                );
                log_created_containers(&context.containers);
                context.errors.into_result(summary)
            }
            Err(err) => {
                if let Err(rollback) = transaction.rollback().await {
                    warn!("Rollback after failure did not complete: {rollback}");
                }
                log_created_containers(&context.containers);
                Err(err)
            }
        }
    }

    fn read_layout(&self, source: &dyn RowSource) -> Result<SheetLayout> {
        let header = source
            .open()?
            .nth(PATH_ROW)
            .transpose()?
            .ok_or_else(|| SheetError::config("Missing machine path header row"))?;
        SheetLayout::parse(self.catalog, &header)
    }

    async fn process(
        &self,
        transaction: &mut dyn StoreTransaction,
        context: &mut RunContext<'_>,
        layout: &SheetLayout,
        source: &dyn RowSource,
    ) -> Result<ImportSummary> {
        let batch_size = self.config.batch_size.max(1);
        let mut summary = ImportSummary::default();
        let mut batch: Vec<(RecordId, SheetRow)> = Vec::with_capacity(batch_size);
        let mut batches = 0;

        for row in data_rows(source.open()?) {
            let row = row?;
            if row.is_blank() {
                continue;
            }
            // pre-flight already reported ids that do not parse
            let Ok(id) = header::parse_id(layout.id_cell(&row)) else {
                continue;
            };
            batch.push((id, row));
            if batch.len() >= batch_size {
                batches += 1;
                let rows = std::mem::take(&mut batch);
                self.process_batch(transaction, context, layout, rows, &mut summary)
                    .await?;
                debug!(batch = batches, errors = context.errors.len(), "Processed batch");
            }
        }
        if !batch.is_empty() {
            batches += 1;
            self.process_batch(transaction, context, layout, batch, &mut summary)
                .await?;
            debug!(batch = batches, errors = context.errors.len(), "Processed batch");
        }
        Ok(summary)
    }

    async fn process_batch(
        &self,
        transaction: &mut dyn StoreTransaction,
        context: &mut RunContext<'_>,
        layout: &SheetLayout,
        rows: Vec<(RecordId, SheetRow)>,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let ids: Vec<RecordId> = rows.iter().map(|(id, _)| *id).collect();
        let mut records: HashMap<RecordId, Record> = transaction
            .load_batch(&ids)
            .await?
            .into_iter()
            .map(|record| (record.id, record))
            .collect();

        for (id, row) in rows {
            let Some(mut record) = records.remove(&id) else {
                context.errors.row_error(
                    row.number,
                    Some("id"),
                    format!("Archival object not found for id: {id}"),
                );
                continue;
            };
            match merge_row(context, layout, &row, &mut record).await? {
                RowOutcome::Changed => {
                    self.persist(transaction, context, &row, record, summary)
                        .await?;
                }
                RowOutcome::Unchanged => debug!(id, row = row.number, "Row unchanged"),
                RowOutcome::Rejected => debug!(id, row = row.number, "Row rejected"),
            }
        }
        Ok(())
    }

    async fn persist(
        &self,
        transaction: &mut dyn StoreTransaction,
        context: &mut RunContext<'_>,
        row: &SheetRow,
        record: Record,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        match transaction.update(record).await {
            Ok(stored) => {
                self.sink.write_output(&format!(
                    "Updated archival object {} - {}",
                    stored.id, stored.display_string
                ));
                summary.updated += 1;
                summary.updated_uris.push(stored.uri);
            }
            Err(UpdateError::Validation { errors }) => {
                for (property, messages) in errors {
                    context.errors.row_errors(row.number, Some(&property), messages);
                }
            }
            Err(err @ UpdateError::Conflict { .. }) => {
                context
                    .errors
                    .row_error(row.number, Some("lock_version"), err.to_string());
            }
            Err(UpdateError::Store(err)) => return Err(err.into()),
        }
        Ok(())
    }
}

/// Data rows of a sheet with their sheet row numbers
fn data_rows(rows: RowIter<'_>) -> impl Iterator<Item = Result<SheetRow>> + Send + '_ {
    rows.enumerate()
        .skip(HEADER_ROWS)
        .map(|(index, row)| row.map(|cells| SheetRow::new(index, cells)))
}

fn log_created_containers(containers: &ContainerIndex) {
    let created = containers.created();
    if created.is_empty() {
        return;
    }
    let listed: Vec<String> = created
        .iter()
        .map(|(key, uri)| format!("{key} ({uri})"))
        .collect();
    warn!(
        "{} top container(s) created during the aborted run remain registered: {}",
        created.len(),
        listed.join(", ")
    );
}
