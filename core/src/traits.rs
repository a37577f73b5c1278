//! Collaborator traits the engine is written against
//!
//! The exporter and the reconciliation engine never talk to a database,
//! a code table or a workbook directly. They go through these seams so
//! that storage, enumerations and sheet decoding can be swapped.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;

use crate::error::{EnumerationError, RegistryError, Result, StoreResult, UpdateError};
use crate::types::{
    CellValue, ContainerKey, ContainerRef, NoteType, Record, RecordHeader, RecordId,
    SubrecordKind,
};

/// Document store holding the hierarchical records
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolve ids to headers; unknown ids are simply absent from the result
    async fn resolve(&self, ids: &[RecordId]) -> StoreResult<Vec<RecordHeader>>;

    /// Load full records; unknown ids are absent from the result
    async fn load_batch(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>>;

    /// Largest number of subrecords of one kind held by any of the records
    async fn max_subrecord_count(&self, kind: SubrecordKind, ids: &[RecordId])
    -> StoreResult<usize>;

    /// Largest number of non digital-object instances held by any of the records
    async fn max_instance_count(&self, ids: &[RecordId]) -> StoreResult<usize>;

    /// Largest number of multipart notes of one type held by any of the records
    async fn max_note_count(&self, note_type: NoteType, ids: &[RecordId]) -> StoreResult<usize>;

    /// Open a transactional scope; nothing written through it is visible
    /// as committed until [`StoreTransaction::commit`]
    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn StoreTransaction + 'a>>;
}

/// Transactional scope over a [`DocumentStore`]
#[async_trait]
pub trait StoreTransaction: Send {
    /// Load full records inside the transaction
    async fn load_batch(&mut self, ids: &[RecordId]) -> StoreResult<Vec<Record>>;

    /// Persist a record; returns the stored record with its new version token
    async fn update(&mut self, record: Record) -> std::result::Result<Record, UpdateError>;

    /// Make every update durable
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard every update
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Code table lookups for enumerated fields
#[async_trait]
pub trait EnumerationSource: Send + Sync {
    /// Human label of a code; unknown codes map to themselves
    async fn label_for(&self, enum_name: &str, code: &str) -> String;

    /// Every code of an enumeration, in display order
    async fn all_values(&self, enum_name: &str)
    -> std::result::Result<Vec<String>, EnumerationError>;
}

/// Registry of top containers, scoped by parent aggregate
#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Every container registered under the parent, keyed by natural key
    async fn lookup(
        &self,
        parent_id: RecordId,
    ) -> std::result::Result<HashMap<ContainerKey, ContainerRef>, RegistryError>;

    /// Register a new container under the parent
    async fn create(
        &self,
        parent_id: RecordId,
        key: &ContainerKey,
    ) -> std::result::Result<ContainerRef, RegistryError>;
}

/// Progress output of a background job
pub trait JobSink: Send + Sync {
    /// Write one line of output
    fn write_output(&self, line: &str);
}

/// Stream of decoded sheet rows, header rows included
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Vec<CellValue>>> + Send + 'a>;

/// Re-openable row source; the importer reads it once for pre-flight
/// checks and once for merging
pub trait RowSource: Send + Sync {
    /// Start reading from the first row
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying sheet cannot be read
    fn open(&self) -> Result<RowIter<'_>>;
}

/// Validation messages grouped by property, as reported by a store
pub type PropertyErrors = IndexMap<String, Vec<String>>;
