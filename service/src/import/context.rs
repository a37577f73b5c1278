//! Run-scoped state threaded through row merging

use sheetsync_core::config::ImportConfig;
use sheetsync_core::error::Result;
use sheetsync_core::traits::ContainerRegistry;
use sheetsync_core::types::{ContainerKey, ContainerRef, RecordId};
use std::collections::HashMap;
use tracing::info;

use super::collector::ErrorCollector;

/// Containers of one parent aggregate, keyed by natural key
#[derive(Debug, Clone, Default)]
pub struct ContainerIndex {
    parent_id: RecordId,
    entries: HashMap<ContainerKey, ContainerRef>,
    created: Vec<(ContainerKey, ContainerRef)>,
}

impl ContainerIndex {
    /// Index every container registered under the parent
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Registry` if the lookup fails
    pub async fn load(registry: &dyn ContainerRegistry, parent_id: RecordId) -> Result<Self> {
        let entries = registry.lookup(parent_id).await?;
        tracing::debug!(parent_id, containers = entries.len(), "Loaded container index");
        Ok(Self {
            parent_id,
            entries,
            created: Vec::new(),
        })
    }

    /// Reference for a natural key
    #[must_use]
    pub fn get(&self, key: &ContainerKey) -> Option<&ContainerRef> {
        self.entries.get(key)
    }

    /// Natural key of a reference, if the reference belongs to this parent
    #[must_use]
    pub fn key_for(&self, uri: &ContainerRef) -> Option<&ContainerKey> {
        self.entries
            .iter()
            .find_map(|(key, candidate)| (candidate == uri).then_some(key))
    }

    /// Register a new container and make it visible to later rows
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Registry` if the registry refuses the key
    pub async fn create(
        &mut self,
        registry: &dyn ContainerRegistry,
        key: &ContainerKey,
    ) -> Result<ContainerRef> {
        let uri = registry.create(self.parent_id, key).await?;
        info!("Created top container {key} as {uri}");
        self.entries.insert(key.clone(), uri.clone());
        self.created.push((key.clone(), uri.clone()));
        Ok(uri)
    }

    /// Containers created during this run
    #[must_use]
    pub fn created(&self) -> &[(ContainerKey, ContainerRef)] {
        &self.created
    }

    /// Parent aggregate the index belongs to
    #[must_use]
    pub fn parent_id(&self) -> RecordId {
        self.parent_id
    }
}

/// Everything a row merge may read or update besides the record itself
pub struct RunContext<'a> {
    /// Import settings
    pub config: &'a ImportConfig,
    /// Registry used when containers are auto-created
    pub registry: &'a dyn ContainerRegistry,
    /// Container index of the run's parent aggregate
    pub containers: ContainerIndex,
    /// Errors collected so far
    pub errors: ErrorCollector,
}

impl<'a> RunContext<'a> {
    /// Fresh context for one run
    #[must_use]
    pub fn new(
        config: &'a ImportConfig,
        registry: &'a dyn ContainerRegistry,
        containers: ContainerIndex,
    ) -> Self {
        Self {
            config,
            registry,
            containers,
            errors: ErrorCollector::new(config.sheet_name.clone()),
        }
    }

    /// Natural key to reference: resolved from the index, created when
    /// auto-create is on, `None` otherwise
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Registry` if auto-creation fails
    pub async fn resolve_container(&mut self, key: &ContainerKey) -> Result<Option<ContainerRef>> {
        if let Some(uri) = self.containers.get(key) {
            return Ok(Some(uri.clone()));
        }
        if !self.config.create_missing_containers {
            return Ok(None);
        }
        self.containers.create(self.registry, key).await.map(Some)
    }
}
