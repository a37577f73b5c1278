//! Shared fixtures for the integration tests
//!
//! Resource 1 holds records 10, 11 and 12 and two boxes; resource 2 holds
//! record 20.

#![allow(dead_code)]

use serde_json::json;
use sheetsync_core::config::{BulkUpdateConfig, ImportConfig};
use sheetsync_core::error::{ErrorEntry, SheetError};
use sheetsync_core::types::{
    ContainerKey, ContainerRef, FieldMap, Instance, MultipartNote, Note, NoteType, Record,
    SubContainer, Subnote,
};
use sheetsync_service::adapters::{
    MemoryContainerRegistry, MemoryStore, RecordingJobSink, StaticEnumerations,
};
use sheetsync_service::export::ExportOptions;
use sheetsync_service::import::VecRows;
use sheetsync_service::service::BulkUpdateService;
use std::sync::Arc;

pub const RESOURCE: u64 = 1;
pub const OTHER_RESOURCE: u64 = 2;

pub fn box_key(indicator: &str) -> ContainerKey {
    ContainerKey::new(Some("box"), Some(indicator), None)
}

pub fn minutes() -> Record {
    let mut record = Record::new(10, RESOURCE);
    record.display_string = "Minutes".to_string();
    record.set_root_value("title", json!("Minutes"));
    record.set_root_value("level", json!("file"));
    record.set_root_value("publish", json!(true));
    record.dates.push(FieldMap::from_iter([
        ("label".to_string(), json!("creation")),
        ("date_type".to_string(), json!("single")),
        ("expression".to_string(), json!("1990")),
        ("begin".to_string(), json!("1990")),
    ]));
    record.instances.push(Instance {
        instance_type: Some("mixed_materials".to_string()),
        sub_container: Some(SubContainer {
            top_container: Some(ContainerRef::new("/top_containers/1")),
            type_2: Some("folder".to_string()),
            indicator_2: Some("3".to_string()),
            ..SubContainer::default()
        }),
        digital_object: None,
    });
    let mut scope = MultipartNote::new(NoteType::ScopeContent);
    scope.subnotes.push(Subnote::Text {
        content: "Minutes of the board".to_string(),
    });
    record.notes.push(Note::Multipart(scope));
    record
}

pub fn letters() -> Record {
    let mut record = Record::new(11, RESOURCE);
    record.display_string = "Letters".to_string();
    record.set_root_value("title", json!("Letters"));
    record.set_root_value("level", json!("file"));
    record
}

pub fn photographs() -> Record {
    let mut record = Record::new(12, RESOURCE);
    record.display_string = "Photographs".to_string();
    record.set_root_value("title", json!("Photographs"));
    record.set_root_value("level", json!("series"));
    record
}

pub fn stray() -> Record {
    let mut record = Record::new(20, OTHER_RESOURCE);
    record.set_root_value("title", json!("Elsewhere"));
    record
}

pub fn records() -> Vec<Record> {
    vec![minutes(), letters(), photographs(), stray()]
}

/// Collaborators and a recording sink over the standard fixtures
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<MemoryContainerRegistry>,
    pub sink: Arc<RecordingJobSink>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::from_records(records()))
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let registry = MemoryContainerRegistry::new();
        registry.register(RESOURCE, box_key("1"), ContainerRef::new("/top_containers/1"));
        registry.register(RESOURCE, box_key("2"), ContainerRef::new("/top_containers/2"));
        Self {
            store: Arc::new(store),
            registry: Arc::new(registry),
            sink: Arc::new(RecordingJobSink::new()),
        }
    }

    pub fn service(&self) -> BulkUpdateService {
        self.service_with(ImportConfig::default())
    }

    pub fn service_with(&self, import: ImportConfig) -> BulkUpdateService {
        BulkUpdateService::new(
            self.store.clone(),
            Arc::new(StaticEnumerations::standard()),
            self.registry.clone(),
            self.sink.clone(),
        )
        .with_config(BulkUpdateConfig {
            import,
            ..BulkUpdateConfig::default()
        })
    }

    /// Rows of an export of records 10, 11 and 12
    pub async fn exported_rows(&self) -> VecRows {
        let table = self
            .service()
            .export_table(RESOURCE, &[10, 11, 12], &ExportOptions::default())
            .await
            .unwrap();
        VecRows::from_table(&table)
    }
}

/// Entries of a failed import; panics on any other outcome
pub fn failure_entries<T: std::fmt::Debug>(result: Result<T, SheetError>) -> Vec<ErrorEntry> {
    match result {
        Err(SheetError::BulkUpdateFailed(entries)) => entries,
        other => panic!("expected a failed bulk update, got {other:?}"),
    }
}

/// Every message of every entry, flattened
pub fn messages(entries: &[ErrorEntry]) -> Vec<String> {
    entries.iter().flat_map(|e| e.errors.iter().cloned()).collect()
}
