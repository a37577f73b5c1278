//! In-memory collaborators
//!
//! Used by the CLI (backed by a dataset file) and by tests. The store keeps
//! a snapshot at `begin` and restores it on rollback, or when a transaction
//! is dropped without being committed.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sheetsync_core::error::{EnumerationError, RegistryError, StoreResult, UpdateError};
use sheetsync_core::traits::{
    ContainerRegistry, DocumentStore, EnumerationSource, JobSink, PropertyErrors,
    StoreTransaction,
};
use sheetsync_core::types::{
    ContainerKey, ContainerRef, NoteType, Record, RecordHeader, RecordId, SubrecordKind,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

type Validator = Arc<dyn Fn(&Record) -> PropertyErrors + Send + Sync>;

/// Document store holding records in memory
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<IndexMap<RecordId, Record>>,
    validator: Option<Validator>,
    updates: AtomicUsize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.lock().len())
            .field("validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with records
    pub fn from_records<I: IntoIterator<Item = Record>>(records: I) -> Self {
        Self {
            records: Mutex::new(records.into_iter().map(|r| (r.id, r)).collect()),
            ..Self::default()
        }
    }

    /// Run a validation hook on every update; a non-empty result rejects it
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Record) -> PropertyErrors + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Insert or replace a record
    pub fn insert(&self, record: Record) {
        self.records.lock().insert(record.id, record);
    }

    /// Current copy of a record
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.records.lock().get(&id).cloned()
    }

    /// Copy of every record, in insertion order
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().values().cloned().collect()
    }

    /// Number of accepted updates, committed or not
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn max_over<F>(&self, ids: &[RecordId], count: F) -> usize
    where
        F: Fn(&Record) -> usize,
    {
        let records = self.records.lock();
        ids.iter()
            .filter_map(|id| records.get(id))
            .map(count)
            .max()
            .unwrap_or(0)
    }

    fn load(&self, ids: &[RecordId]) -> Vec<Record> {
        let records = self.records.lock();
        ids.iter().filter_map(|id| records.get(id).cloned()).collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn resolve(&self, ids: &[RecordId]) -> StoreResult<Vec<RecordHeader>> {
        let records = self.records.lock();
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(Record::header))
            .collect())
    }

    async fn load_batch(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>> {
        Ok(self.load(ids))
    }

    async fn max_subrecord_count(
        &self,
        kind: SubrecordKind,
        ids: &[RecordId],
    ) -> StoreResult<usize> {
        Ok(self.max_over(ids, |r| r.subrecords(kind).len()))
    }

    async fn max_instance_count(&self, ids: &[RecordId]) -> StoreResult<usize> {
        Ok(self.max_over(ids, |r| r.sheet_instances().count()))
    }

    async fn max_note_count(&self, note_type: NoteType, ids: &[RecordId]) -> StoreResult<usize> {
        Ok(self.max_over(ids, |r| r.notes_of(note_type).count()))
    }

    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn StoreTransaction + 'a>> {
        let snapshot = self.records.lock().clone();
        Ok(Box::new(MemoryTransaction {
            store: self,
            snapshot: Some(snapshot),
        }))
    }
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    snapshot: Option<IndexMap<RecordId, Record>>,
}

impl MemoryTransaction<'_> {
    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.store.records.lock() = snapshot;
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction<'_> {
    async fn load_batch(&mut self, ids: &[RecordId]) -> StoreResult<Vec<Record>> {
        Ok(self.store.load(ids))
    }

    async fn update(&mut self, mut record: Record) -> Result<Record, UpdateError> {
        let mut records = self.store.records.lock();
        let stored = records
            .get(&record.id)
            .ok_or(sheetsync_core::error::StoreError::NotFound(record.id))?;
        if stored.lock_version != record.lock_version {
            return Err(UpdateError::Conflict {
                id: record.id,
                expected: record.lock_version,
                actual: stored.lock_version,
            });
        }
        if let Some(validator) = &self.store.validator {
            let errors = validator(&record);
            if !errors.is_empty() {
                return Err(UpdateError::Validation { errors });
            }
        }
        record.lock_version += 1;
        records.insert(record.id, record.clone());
        self.store.updates.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.restore();
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if self.snapshot.is_some() {
            tracing::warn!("Transaction dropped without commit, rolling back");
            self.restore();
        }
    }
}

/// Enumeration source backed by fixed code tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticEnumerations {
    enumerations: IndexMap<String, IndexMap<String, String>>,
}

impl StaticEnumerations {
    /// Empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an enumeration as `(code, label)` pairs
    #[must_use]
    pub fn with_enumeration<I, C, L>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: Into<String>,
    {
        self.enumerations.insert(
            name.to_string(),
            values
                .into_iter()
                .map(|(code, label)| (code.into(), label.into()))
                .collect(),
        );
        self
    }

    /// Code tables for every enumeration the standard catalog uses
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_enumeration(
                "archival_record_level",
                [
                    ("collection", "Collection"),
                    ("series", "Series"),
                    ("subseries", "Sub-Series"),
                    ("file", "File"),
                    ("item", "Item"),
                    ("otherlevel", "Other Level"),
                ],
            )
            .with_enumeration(
                "date_certainty",
                [
                    ("approximate", "Approximate"),
                    ("inferred", "Inferred"),
                    ("questionable", "Questionable"),
                ],
            )
            .with_enumeration("extent_portion", [("whole", "Whole"), ("part", "Part")])
            .with_enumeration(
                "extent_extent_type",
                [
                    ("linear_feet", "Linear Feet"),
                    ("cubic_feet", "Cubic Feet"),
                    ("items", "Items"),
                    ("leaves", "Leaves"),
                    ("volumes", "Volumes"),
                ],
            )
            .with_enumeration(
                "instance_instance_type",
                [
                    ("mixed_materials", "Mixed Materials"),
                    ("text", "Text"),
                    ("graphic_materials", "Graphic Materials"),
                    ("audio", "Audio"),
                    ("moving_images", "Moving Images"),
                    ("digital_object", "Digital Object"),
                ],
            )
            .with_enumeration(
                "container_type",
                [("box", "Box"), ("folder", "Folder"), ("reel", "Reel"), ("volume", "Volume")],
            )
            .with_enumeration(
                "restriction_type",
                [
                    ("RestrictedSpecColl", "Restricted Special Collections"),
                    ("RestrictedCurApprSpecColl", "Restricted, Curatorial Approval"),
                    ("RestrictedFragileSpecColl", "Restricted, Fragile"),
                    ("InProcessSpecColl", "In Process"),
                ],
            )
    }

    /// Whether no enumeration is defined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enumerations.is_empty()
    }
}

#[async_trait]
impl EnumerationSource for StaticEnumerations {
    async fn label_for(&self, enum_name: &str, code: &str) -> String {
        self.enumerations
            .get(enum_name)
            .and_then(|values| values.get(code))
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    async fn all_values(&self, enum_name: &str) -> Result<Vec<String>, EnumerationError> {
        self.enumerations
            .get(enum_name)
            .map(|values| values.keys().cloned().collect())
            .ok_or_else(|| EnumerationError::Unknown(enum_name.to_string()))
    }
}

/// Container registered under a parent aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    /// Parent aggregate id
    pub resource_id: RecordId,
    /// Container reference
    pub uri: ContainerRef,
    /// Natural key
    #[serde(flatten)]
    pub key: ContainerKey,
}

/// Container registry held in memory
#[derive(Debug, Default)]
pub struct MemoryContainerRegistry {
    entries: Mutex<Vec<ContainerEntry>>,
    next_id: AtomicU64,
}

impl MemoryContainerRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with containers
    pub fn from_entries<I: IntoIterator<Item = ContainerEntry>>(entries: I) -> Self {
        let entries: Vec<ContainerEntry> = entries.into_iter().collect();
        let next_id = entries.len() as u64;
        Self {
            entries: Mutex::new(entries),
            next_id: AtomicU64::new(next_id),
        }
    }

    /// Register a container with a known reference
    pub fn register(&self, resource_id: RecordId, key: ContainerKey, uri: ContainerRef) {
        self.entries.lock().push(ContainerEntry {
            resource_id,
            uri,
            key,
        });
    }

    /// Copy of every entry
    #[must_use]
    pub fn entries(&self) -> Vec<ContainerEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl ContainerRegistry for MemoryContainerRegistry {
    async fn lookup(
        &self,
        parent_id: RecordId,
    ) -> Result<HashMap<ContainerKey, ContainerRef>, RegistryError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.resource_id == parent_id)
            .map(|e| (e.key.clone(), e.uri.clone()))
            .collect())
    }

    async fn create(
        &self,
        parent_id: RecordId,
        key: &ContainerKey,
    ) -> Result<ContainerRef, RegistryError> {
        let mut entries = self.entries.lock();
        if entries
            .iter()
            .any(|e| e.resource_id == parent_id && &e.key == key)
        {
            return Err(RegistryError::Duplicate(key.clone()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let uri = ContainerRef::new(format!("/repositories/2/top_containers/{n}"));
        entries.push(ContainerEntry {
            resource_id: parent_id,
            uri: uri.clone(),
            key: key.clone(),
        });
        Ok(uri)
    }
}

/// Job sink writing through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingJobSink;

impl JobSink for TracingJobSink {
    fn write_output(&self, line: &str) {
        tracing::info!(target: "sheetsync::job", "{line}");
    }
}

/// Job sink keeping every line
#[derive(Debug, Default)]
pub struct RecordingJobSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingJobSink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl JobSink for RecordingJobSink {
    fn write_output(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let store = MemoryStore::from_records([Record::new(1, 10)]);
        let mut txn = store.begin().await.unwrap();
        let mut record = txn.load_batch(&[1]).await.unwrap().remove(0);
        record.set_root_value("title", json!("Changed"));
        let stored = txn.update(record).await.unwrap();
        assert_eq!(stored.lock_version, 1);
        txn.rollback().await.unwrap();

        let record = store.get(1).unwrap();
        assert_eq!(record.lock_version, 0);
        assert_eq!(record.root_value("title"), None);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::from_records([Record::new(1, 10)]);
        {
            let mut txn = store.begin().await.unwrap();
            let record = txn.load_batch(&[1]).await.unwrap().remove(0);
            txn.update(record).await.unwrap();
        }
        assert_eq!(store.get(1).unwrap().lock_version, 0);
    }

    #[tokio::test]
    async fn test_conflict_and_validation() {
        let store = MemoryStore::from_records([Record::new(1, 10)]).with_validator(|record| {
            let mut errors = PropertyErrors::new();
            if record.root_value("title").is_none() {
                errors.insert("title".to_string(), vec!["is required".to_string()]);
            }
            errors
        });
        let mut txn = store.begin().await.unwrap();

        let mut stale = store.get(1).unwrap();
        stale.lock_version = 7;
        assert!(matches!(
            txn.update(stale).await,
            Err(UpdateError::Conflict { actual: 0, .. })
        ));

        let untitled = store.get(1).unwrap();
        match txn.update(untitled).await {
            Err(UpdateError::Validation { errors }) => {
                assert_eq!(errors["title"], ["is required"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        txn.commit().await.unwrap();
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_registry_lookup_and_create() {
        let registry = MemoryContainerRegistry::new();
        let key = ContainerKey::new(Some("box"), Some("1"), None);
        let uri = registry.create(10, &key).await.unwrap();
        assert!(matches!(
            registry.create(10, &key).await,
            Err(RegistryError::Duplicate(_))
        ));

        let index = registry.lookup(10).await.unwrap();
        assert_eq!(index.get(&key), Some(&uri));
        assert!(registry.lookup(11).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_enumerations() {
        let enums = StaticEnumerations::standard();
        assert_eq!(enums.label_for("extent_portion", "whole").await, "Whole");
        assert_eq!(enums.label_for("extent_portion", "most").await, "most");
        assert!(enums.all_values("unknown").await.is_err());
    }
}
