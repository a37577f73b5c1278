//! Collaborator implementations shipped with the service

pub mod dataset;
pub mod memory;

pub use dataset::{Dataset, DatasetAdapters};
pub use memory::{
    ContainerEntry, MemoryContainerRegistry, MemoryStore, MemoryTransaction, RecordingJobSink,
    StaticEnumerations, TracingJobSink,
};
