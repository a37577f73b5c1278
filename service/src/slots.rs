//! Slot allocation: how many column slots each repeating owner gets

use indexmap::IndexMap;
use sheetsync_core::config::ExportConfig;
use sheetsync_core::error::Result;
use sheetsync_core::traits::DocumentStore;
use sheetsync_core::types::{NoteType, RecordId, SubrecordKind};

/// Padding rules applied to observed maxima
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    /// Lower bound on subrecord and instance slots
    pub min_subrecords: usize,
    /// Blank slots added past the observed maximum
    pub extra_subrecords: usize,
    /// Lower bound on note slots
    pub min_notes: usize,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for SlotPolicy {
    fn from(config: &ExportConfig) -> Self {
        Self {
            min_subrecords: config.min_subrecords,
            extra_subrecords: config.extra_subrecords,
            min_notes: config.min_notes,
        }
    }
}

impl SlotPolicy {
    /// Slots for subrecords and instances
    #[must_use]
    pub fn subrecord_slots(&self, observed: usize) -> usize {
        (observed + self.extra_subrecords).max(self.min_subrecords)
    }

    /// Slots for notes of one type
    #[must_use]
    pub fn note_slots(&self, observed: usize) -> usize {
        observed.max(self.min_notes)
    }
}

/// Slot counts for one export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPlan {
    subrecords: IndexMap<SubrecordKind, usize>,
    instances: usize,
    notes: IndexMap<NoteType, usize>,
}

impl SlotPlan {
    /// Set the slot count of a subrecord kind
    #[must_use]
    pub fn with_subrecord_slots(mut self, kind: SubrecordKind, slots: usize) -> Self {
        self.subrecords.insert(kind, slots);
        self
    }

    /// Set the instance slot count
    #[must_use]
    pub fn with_instance_slots(mut self, slots: usize) -> Self {
        self.instances = slots;
        self
    }

    /// Set the slot count of a note type
    #[must_use]
    pub fn with_note_slots(mut self, note_type: NoteType, slots: usize) -> Self {
        self.notes.insert(note_type, slots);
        self
    }

    /// Slots of a subrecord kind
    #[must_use]
    pub fn subrecord_slots(&self, kind: SubrecordKind) -> usize {
        self.subrecords.get(&kind).copied().unwrap_or(0)
    }

    /// Instance slots
    #[must_use]
    pub fn instance_slots(&self) -> usize {
        self.instances
    }

    /// Slots of a note type
    #[must_use]
    pub fn note_slots(&self, note_type: NoteType) -> usize {
        self.notes.get(&note_type).copied().unwrap_or(0)
    }
}

/// Computes a [`SlotPlan`] from the counts a store reports
pub struct SlotAllocator<'a> {
    store: &'a dyn DocumentStore,
    policy: SlotPolicy,
}

impl<'a> SlotAllocator<'a> {
    /// Create an allocator over a store
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore, policy: SlotPolicy) -> Self {
        Self { store, policy }
    }

    /// Plan slots for the given records. The same records and policy always
    /// give the same plan.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Store` if a count query fails
    pub async fn allocate(&self, ids: &[RecordId]) -> Result<SlotPlan> {
        let mut plan = SlotPlan::default();

        for kind in SubrecordKind::ALL {
            let observed = self.store.max_subrecord_count(kind, ids).await?;
            plan = plan.with_subrecord_slots(kind, self.policy.subrecord_slots(observed));
        }

        let observed = self.store.max_instance_count(ids).await?;
        plan = plan.with_instance_slots(self.policy.subrecord_slots(observed));

        for note_type in NoteType::ALL {
            let observed = self.store.max_note_count(note_type, ids).await?;
            plan = plan.with_note_slots(note_type, self.policy.note_slots(observed));
        }

        tracing::debug!(?plan, records = ids.len(), "Allocated sheet slots");
        Ok(plan)
    }
}
