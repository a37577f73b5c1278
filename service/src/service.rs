//! Bulk update service: collaborators and configuration wired together

use chrono::Local;
use sheetsync_core::config::BulkUpdateConfig;
use sheetsync_core::error::Result;
use sheetsync_core::traits::{
    ContainerRegistry, DocumentStore, EnumerationSource, JobSink, RowSource,
};
use sheetsync_core::types::RecordId;
use std::sync::Arc;

use crate::adapters::{DatasetAdapters, TracingJobSink};
use crate::export::{ExportOptions, ExportTable, Exporter, WorkbookWriter};
use crate::import::{ImportSummary, Importer, WorkbookRows};

/// Export and import entry points over one set of collaborators
#[derive(Clone)]
pub struct BulkUpdateService {
    store: Arc<dyn DocumentStore>,
    enumerations: Arc<dyn EnumerationSource>,
    containers: Arc<dyn ContainerRegistry>,
    sink: Arc<dyn JobSink>,
    config: BulkUpdateConfig,
}

impl std::fmt::Debug for BulkUpdateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkUpdateService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BulkUpdateService {
    /// Service with the default configuration
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        enumerations: Arc<dyn EnumerationSource>,
        containers: Arc<dyn ContainerRegistry>,
        sink: Arc<dyn JobSink>,
    ) -> Self {
        Self {
            store,
            enumerations,
            containers,
            sink,
            config: BulkUpdateConfig::default(),
        }
    }

    /// Service over dataset collaborators, logging audit lines through `tracing`
    #[must_use]
    pub fn from_adapters(adapters: &DatasetAdapters) -> Self {
        Self::new(
            adapters.store.clone(),
            adapters.enumerations.clone(),
            adapters.containers.clone(),
            Arc::new(TracingJobSink),
        )
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: BulkUpdateConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the job sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn JobSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &BulkUpdateConfig {
        &self.config
    }

    /// Exporter over this service's collaborators
    #[must_use]
    pub fn exporter(&self) -> Exporter<'_> {
        Exporter::new(
            self.store.as_ref(),
            self.enumerations.as_ref(),
            self.containers.as_ref(),
            &self.config.export,
        )
    }

    /// Importer over this service's collaborators
    #[must_use]
    pub fn importer(&self) -> Importer<'_> {
        Importer::new(
            self.store.as_ref(),
            self.containers.as_ref(),
            self.sink.as_ref(),
            &self.config.import,
        )
    }

    /// Export records of a parent aggregate as a table
    ///
    /// # Errors
    ///
    /// See [`Exporter::export_table`]
    pub async fn export_table(
        &self,
        root_id: RecordId,
        record_ids: &[RecordId],
        options: &ExportOptions,
    ) -> Result<ExportTable> {
        self.exporter().export_table(root_id, record_ids, options).await
    }

    /// Export records as a workbook; returns the download filename and the
    /// workbook bytes
    ///
    /// # Errors
    ///
    /// See [`Exporter::export_table`] and [`WorkbookWriter::write`]
    pub async fn export_workbook(
        &self,
        root_id: RecordId,
        record_ids: &[RecordId],
        options: &ExportOptions,
    ) -> Result<(String, Vec<u8>)> {
        let table = self.export_table(root_id, record_ids, options).await?;
        let bytes = WorkbookWriter::from_config(&self.config).write(&table)?;
        Ok((table.filename(Local::now().date_naive()), bytes))
    }

    /// Import an edited sheet
    ///
    /// # Errors
    ///
    /// See [`Importer::import_table`]
    pub async fn import_table(&self, source: &dyn RowSource) -> Result<ImportSummary> {
        self.importer().import_table(source).await
    }

    /// Import an edited workbook, reading the configured sheet
    ///
    /// # Errors
    ///
    /// See [`Importer::import_table`]
    pub async fn import_workbook(&self, bytes: Vec<u8>) -> Result<ImportSummary> {
        let rows = WorkbookRows::from_bytes(bytes, self.config.import.sheet_name.clone());
        self.import_table(&rows).await
    }
}
