//! JSON dataset file: records, code tables and containers in one document
//!
//! ```json
//! {
//!   "records": [ { "id": 1, "resource_id": 1, "title": "..." } ],
//!   "enumerations": { "container_type": { "box": "Box" } },
//!   "containers": [ { "resource_id": 1, "uri": "/top_containers/1", "type": "box", "indicator": "1" } ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use sheetsync_core::error::{Result, SheetError};
use sheetsync_core::types::Record;
use std::path::Path;
use std::sync::Arc;

use super::memory::{ContainerEntry, MemoryContainerRegistry, MemoryStore, StaticEnumerations};

/// Contents of a dataset file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    /// Records
    pub records: Vec<Record>,
    /// Code tables; the standard tables are used when empty
    #[serde(skip_serializing_if = "StaticEnumerations::is_empty")]
    pub enumerations: StaticEnumerations,
    /// Top containers
    pub containers: Vec<ContainerEntry>,
}

/// Collaborators built from a dataset, shared so they can be handed to a
/// service and read back afterwards
#[derive(Debug, Clone)]
pub struct DatasetAdapters {
    /// Document store
    pub store: Arc<MemoryStore>,
    /// Enumeration source
    pub enumerations: Arc<StaticEnumerations>,
    /// Container registry
    pub containers: Arc<MemoryContainerRegistry>,
}

impl Dataset {
    /// Read a dataset file
    ///
    /// # Errors
    ///
    /// Returns an IO or serialization error
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            SheetError::serialization(format!("Failed to parse dataset {}: {e}", path.display()))
        })
    }

    /// Write the dataset file
    ///
    /// # Errors
    ///
    /// Returns an IO or serialization error
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build in-memory collaborators
    #[must_use]
    pub fn into_adapters(self) -> DatasetAdapters {
        let enumerations = if self.enumerations.is_empty() {
            StaticEnumerations::standard()
        } else {
            self.enumerations
        };
        DatasetAdapters {
            store: Arc::new(MemoryStore::from_records(self.records)),
            enumerations: Arc::new(enumerations),
            containers: Arc::new(MemoryContainerRegistry::from_entries(self.containers)),
        }
    }
}

impl DatasetAdapters {
    /// Current state as a dataset
    #[must_use]
    pub fn to_dataset(&self) -> Dataset {
        Dataset {
            records: self.store.records(),
            enumerations: self.enumerations.as_ref().clone(),
            containers: self.containers.entries(),
        }
    }
}
