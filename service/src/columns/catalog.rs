//! Column catalog: the fixed set of column templates and their order

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use sheetsync_core::error::{Result, SheetError};
use sheetsync_core::types::{NoteType, SubrecordKind};

use super::descriptor::{ColumnDescriptor, OwnerKind};
use super::path::{self, NOTE_BODY_FIELD};
use crate::slots::SlotPlan;

/// Shared standard catalog
pub static STANDARD_CATALOG: Lazy<ColumnCatalog> = Lazy::new(ColumnCatalog::standard);

/// Which column groups an export includes; identity columns are always present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Every column the catalog defines
    #[default]
    All,
    /// Only the named groups: root field names, subrecord properties,
    /// `instances`, or `note/<type>`
    Only(IndexSet<String>),
}

impl ColumnSelection {
    /// Selection from group keys
    pub fn only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(keys.into_iter().map(Into::into).collect())
    }

    /// Whether a group key is selected
    #[must_use]
    pub fn includes(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(keys) => keys.contains(key),
        }
    }
}

/// Fixed set of column templates
#[derive(Debug, Clone)]
pub struct ColumnCatalog {
    root: Vec<ColumnDescriptor>,
    subrecords: Vec<(SubrecordKind, Vec<ColumnDescriptor>)>,
    instance: Vec<ColumnDescriptor>,
    notes: Vec<(NoteType, Vec<ColumnDescriptor>)>,
}

impl ColumnCatalog {
    /// Root fields always exported regardless of selection
    pub const IDENTITY_FIELDS: [&'static str; 2] = ["id", "lock_version"];

    /// The standard archival object catalog
    #[must_use]
    pub fn standard() -> Self {
        use ColumnDescriptor as C;

        let root = vec![
            C::text(OwnerKind::Root, "id", "Id").with_locked(),
            C::text(OwnerKind::Root, "lock_version", "Version").with_locked(),
            C::text(OwnerKind::Root, "title", "Title").with_width(30),
            C::enumeration(OwnerKind::Root, "level", "Level of Description", "archival_record_level")
                .with_width(15),
            C::boolean(OwnerKind::Root, "publish", "Publish"),
        ];

        let date = OwnerKind::Subrecord(SubrecordKind::Date);
        let extent = OwnerKind::Subrecord(SubrecordKind::Extent);
        let subrecords = vec![
            (
                SubrecordKind::Date,
                vec![
                    C::text(date, "expression", "Expression"),
                    C::date(date, "begin", "Begin"),
                    C::date(date, "end", "End"),
                    C::enumeration(date, "certainty", "Certainty", "date_certainty"),
                ],
            ),
            (
                SubrecordKind::Extent,
                vec![
                    C::enumeration(extent, "portion", "Portion", "extent_portion"),
                    C::text(extent, "number", "Number"),
                    C::enumeration(extent, "extent_type", "Extent Type", "extent_extent_type"),
                    C::text(extent, "container_summary", "Container Summary"),
                ],
            ),
        ];

        let i = OwnerKind::Instance;
        let instance = vec![
            C::enumeration(i, "instance_type", "Type", "instance_instance_type")
                .with_skip_values(&["digital_object"]),
            C::enumeration(i, "top_container_type", "Top Container Type", "container_type")
                .with_storage_key("type"),
            C::text(i, "top_container_indicator", "Top Container Indicator")
                .with_storage_key("indicator"),
            C::text(i, "top_container_barcode", "Top Container Barcode")
                .with_storage_key("barcode"),
            C::enumeration(i, "sub_container_type_2", "Child Type", "container_type")
                .with_storage_key("type_2"),
            C::text(i, "sub_container_indicator_2", "Child Indicator")
                .with_storage_key("indicator_2"),
            C::text(i, "sub_container_barcode_2", "Child Barcode").with_storage_key("barcode_2"),
            C::enumeration(i, "sub_container_type_3", "Grandchild Type", "container_type")
                .with_storage_key("type_3"),
            C::text(i, "sub_container_indicator_3", "Grandchild Indicator")
                .with_storage_key("indicator_3"),
        ];

        let notes = NoteType::ALL
            .into_iter()
            .map(|note_type| {
                let owner = OwnerKind::Note(note_type);
                let mut columns = vec![C::text(owner, NOTE_BODY_FIELD, "Content").with_width(30)];
                if note_type == NoteType::AccessRestrict {
                    columns.extend([
                        C::date(owner, "begin", "Begin").with_bag("rights_restriction"),
                        C::date(owner, "end", "End").with_bag("rights_restriction"),
                        C::enumeration(
                            owner,
                            "local_access_restriction_type",
                            "Local Access Restriction Type",
                            "restriction_type",
                        )
                        .with_bag("rights_restriction")
                        .with_list_value(),
                    ]);
                }
                (note_type, columns)
            })
            .collect();

        Self {
            root,
            subrecords,
            instance,
            notes,
        }
    }

    /// Root column templates
    #[must_use]
    pub fn root_columns(&self) -> &[ColumnDescriptor] {
        &self.root
    }

    /// Templates of one subrecord kind
    #[must_use]
    pub fn subrecord_columns(&self, kind: SubrecordKind) -> &[ColumnDescriptor] {
        self.subrecords
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, columns)| columns.as_slice())
            .unwrap_or_default()
    }

    /// Instance templates
    #[must_use]
    pub fn instance_columns(&self) -> &[ColumnDescriptor] {
        &self.instance
    }

    /// Templates of one note type, body first
    #[must_use]
    pub fn note_columns(&self, note_type: NoteType) -> &[ColumnDescriptor] {
        self.notes
            .iter()
            .find(|(t, _)| *t == note_type)
            .map(|(_, columns)| columns.as_slice())
            .unwrap_or_default()
    }

    /// Template for an owner and field name
    #[must_use]
    pub fn template(&self, owner: OwnerKind, field: &str) -> Option<&ColumnDescriptor> {
        let templates = match owner {
            OwnerKind::Root => self.root_columns(),
            OwnerKind::Subrecord(kind) => self.subrecord_columns(kind),
            OwnerKind::Instance => self.instance_columns(),
            OwnerKind::Note(note_type) => self.note_columns(note_type),
        };
        templates.iter().find(|c| c.field == field)
    }

    /// Column for a machine path
    ///
    /// # Errors
    ///
    /// Returns `SheetError::ColumnNotFound` for unknown paths
    pub fn column_for_path(&self, path: &str) -> Result<ColumnDescriptor> {
        path::decode(self, path)
    }

    /// Every group key a selection may name
    #[must_use]
    pub fn group_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .root
            .iter()
            .map(|c| c.field)
            .filter(|f| !Self::IDENTITY_FIELDS.contains(f))
            .map(ToString::to_string)
            .collect();
        keys.extend(
            self.subrecords
                .iter()
                .map(|(kind, _)| kind.property_name().to_string()),
        );
        keys.push(OwnerKind::Instance.property_name().to_string());
        keys.extend(self.notes.iter().map(|(t, _)| note_group_key(*t)));
        keys
    }

    /// Reject selections naming unknown groups
    ///
    /// # Errors
    ///
    /// Returns `SheetError::ConfigError` naming the unknown keys
    pub fn check_selection(&self, selection: &ColumnSelection) -> Result<()> {
        let ColumnSelection::Only(keys) = selection else {
            return Ok(());
        };
        let known = self.group_keys();
        let unknown: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|k| {
                !known.iter().any(|name| name.as_str() == *k)
                    && !Self::IDENTITY_FIELDS.contains(k)
            })
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SheetError::config(format!(
                "Unknown column group(s): {}",
                unknown.join(", ")
            )))
        }
    }

    /// Ordered column list for a slot plan: root, subrecord slots, instance
    /// slots, then note slots per type
    #[must_use]
    pub fn columns_for(&self, plan: &SlotPlan, selection: &ColumnSelection) -> Vec<ColumnDescriptor> {
        let mut columns: Vec<ColumnDescriptor> = self
            .root
            .iter()
            .filter(|c| Self::IDENTITY_FIELDS.contains(&c.field) || selection.includes(c.field))
            .cloned()
            .collect();

        for (kind, templates) in &self.subrecords {
            if selection.includes(kind.property_name()) {
                columns.extend(slots(templates, plan.subrecord_slots(*kind)));
            }
        }

        if selection.includes(OwnerKind::Instance.property_name()) {
            columns.extend(slots(&self.instance, plan.instance_slots()));
        }

        for (note_type, templates) in &self.notes {
            if selection.includes(&note_group_key(*note_type)) {
                columns.extend(slots(templates, plan.note_slots(*note_type)));
            }
        }

        columns
    }
}

/// Selection key of a note type's columns
#[must_use]
pub fn note_group_key(note_type: NoteType) -> String {
    format!("note/{}", note_type.code())
}

fn slots(templates: &[ColumnDescriptor], count: usize) -> impl Iterator<Item = ColumnDescriptor> + '_ {
    (0..count).flat_map(move |n| templates.iter().map(move |t| t.at(n)))
}
