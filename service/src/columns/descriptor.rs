//! Column descriptors: one per sheet column

use sheetsync_core::types::{ContainerKey, NoteType, SubrecordKind};
use std::fmt;

use super::path;

/// Which part of a record a column reads from and writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    /// Scalar property on the record itself
    Root,
    /// Field of a repeating subrecord
    Subrecord(SubrecordKind),
    /// Field of a non digital-object instance
    Instance,
    /// Body or extra of a multipart note
    Note(NoteType),
}

impl OwnerKind {
    /// Path prefix of repeating owners
    #[must_use]
    pub fn property_name(self) -> &'static str {
        match self {
            Self::Root => "",
            Self::Subrecord(kind) => kind.property_name(),
            Self::Instance => "instances",
            Self::Note(_) => "note",
        }
    }

    /// Singular label used in headers and messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Root => "Record",
            Self::Subrecord(kind) => kind.label(),
            Self::Instance => "Instance",
            Self::Note(note_type) => note_type.label(),
        }
    }
}

/// How a cell value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Trimmed text
    Text,
    /// ISO-8601 calendar date, full or truncated
    Date,
    /// Code of the named enumeration, shown as `label [code]`
    Enumeration(&'static str),
    /// `true` / `false`
    Boolean,
}

/// Part of a top container natural key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerPart {
    /// Container type code
    Type,
    /// Indicator
    Indicator,
    /// Barcode
    Barcode,
}

impl ContainerPart {
    /// This part of a key
    #[must_use]
    pub fn of(self, key: &ContainerKey) -> Option<&str> {
        match self {
            Self::Type => key.container_type.as_deref(),
            Self::Indicator => key.indicator.as_deref(),
            Self::Barcode => key.barcode.as_deref(),
        }
    }
}

/// Where an instance column lives inside an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceField {
    /// The instance type code
    InstanceType,
    /// Part of the linked top container's natural key
    TopContainer(ContainerPart),
    /// Child container shape field, by storage key
    SubContainer(&'static str),
}

/// Definition of one sheet column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDescriptor {
    /// Owner the column belongs to
    pub owner: OwnerKind,
    /// Field name, last segment of the machine path
    pub field: &'static str,
    /// Storage key inside the owner
    pub storage_key: &'static str,
    /// Human label of the field
    pub label: &'static str,
    /// Cell interpretation
    pub value_kind: ValueKind,
    /// Column width hint
    pub width: Option<u16>,
    /// Column is read-only in the workbook
    pub locked: bool,
    /// Enumeration codes never offered for this column
    pub skip_values: &'static [&'static str],
    /// Property bag holding the value (note extras only)
    pub bag: Option<&'static str>,
    /// Value is stored as a single-element list
    pub list_valued: bool,
    /// Zero-based slot ordinal of repeating owners
    pub ordinal: Option<usize>,
}

impl ColumnDescriptor {
    /// Text column template
    #[must_use]
    pub fn text(owner: OwnerKind, field: &'static str, label: &'static str) -> Self {
        Self {
            owner,
            field,
            storage_key: field,
            label,
            value_kind: ValueKind::Text,
            width: None,
            locked: false,
            skip_values: &[],
            bag: None,
            list_valued: false,
            ordinal: None,
        }
    }

    /// Date column template
    #[must_use]
    pub fn date(owner: OwnerKind, field: &'static str, label: &'static str) -> Self {
        Self {
            value_kind: ValueKind::Date,
            ..Self::text(owner, field, label)
        }
    }

    /// Enumeration column template
    #[must_use]
    pub fn enumeration(
        owner: OwnerKind,
        field: &'static str,
        label: &'static str,
        enum_name: &'static str,
    ) -> Self {
        Self {
            value_kind: ValueKind::Enumeration(enum_name),
            ..Self::text(owner, field, label)
        }
    }

    /// Boolean column template
    #[must_use]
    pub fn boolean(owner: OwnerKind, field: &'static str, label: &'static str) -> Self {
        Self {
            value_kind: ValueKind::Boolean,
            ..Self::text(owner, field, label)
        }
    }

    /// Set the column width hint
    #[must_use]
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    /// Mark the column read-only
    #[must_use]
    pub fn with_locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Store under a key different from the field name
    #[must_use]
    pub fn with_storage_key(mut self, key: &'static str) -> Self {
        self.storage_key = key;
        self
    }

    /// Hide enumeration codes from the offered values
    #[must_use]
    pub fn with_skip_values(mut self, values: &'static [&'static str]) -> Self {
        self.skip_values = values;
        self
    }

    /// Store inside a property bag of the owner
    #[must_use]
    pub fn with_bag(mut self, bag: &'static str) -> Self {
        self.bag = Some(bag);
        self
    }

    /// Store as a single-element list
    #[must_use]
    pub fn with_list_value(mut self) -> Self {
        self.list_valued = true;
        self
    }

    /// Copy of this template bound to a slot ordinal
    #[must_use]
    pub fn at(&self, ordinal: usize) -> Self {
        Self {
            ordinal: Some(ordinal),
            ..self.clone()
        }
    }

    /// Machine path written to the second header row
    #[must_use]
    pub fn path(&self) -> String {
        path::encode(self)
    }

    /// Human header label
    #[must_use]
    pub fn header_label(&self) -> String {
        let slot = self.ordinal.map_or(1, |n| n + 1);
        match self.owner {
            OwnerKind::Root => self.label.to_string(),
            OwnerKind::Subrecord(_) | OwnerKind::Instance => {
                format!("{} {slot} - {}", self.owner.label(), self.label)
            }
            OwnerKind::Note(note_type) => {
                format!("Note {} - {slot} - {}", note_type.label(), self.label)
            }
        }
    }

    /// Enumeration name for enumerated columns
    #[must_use]
    pub fn enum_name(&self) -> Option<&'static str> {
        match self.value_kind {
            ValueKind::Enumeration(name) => Some(name),
            _ => None,
        }
    }

    /// Body column of a note slot
    #[must_use]
    pub fn is_note_body(&self) -> bool {
        matches!(self.owner, OwnerKind::Note(_)) && self.field == path::NOTE_BODY_FIELD
    }

    /// Instance field this column maps to
    #[must_use]
    pub fn instance_field(&self) -> Option<InstanceField> {
        if self.owner != OwnerKind::Instance {
            return None;
        }
        Some(match self.field {
            "instance_type" => InstanceField::InstanceType,
            "top_container_type" => InstanceField::TopContainer(ContainerPart::Type),
            "top_container_indicator" => InstanceField::TopContainer(ContainerPart::Indicator),
            "top_container_barcode" => InstanceField::TopContainer(ContainerPart::Barcode),
            _ => InstanceField::SubContainer(self.storage_key),
        })
    }

    /// Slot ordinal, zero for root columns
    #[must_use]
    pub fn slot(&self) -> usize {
        self.ordinal.unwrap_or(0)
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
