//! Machine paths: the second header row of a sheet
//!
//! Three shapes exist:
//!
//! - `field` for root columns
//! - `property/n/field` for subrecord and instance slots
//! - `note/type/n/content` for note bodies and `note/type/n/field` for
//!   note extras; a bare `note/type/n` is read as the body
//!
//! Note paths are matched before the generic slot shape.

use sheetsync_core::error::{Result, SheetError};
use sheetsync_core::types::{NoteType, SubrecordKind};

use super::catalog::ColumnCatalog;
use super::descriptor::{ColumnDescriptor, OwnerKind};

/// Field name of note body columns
pub const NOTE_BODY_FIELD: &str = "content";

const NOTE_PREFIX: &str = "note";

/// Parsed shape of a machine path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachinePath<'a> {
    /// `field`
    Root {
        /// Field name
        field: &'a str,
    },
    /// `property/n/field`
    Slot {
        /// Owner property
        property: &'a str,
        /// Zero-based ordinal
        ordinal: usize,
        /// Field name
        field: &'a str,
    },
    /// `note/type/n[/field]`
    Note {
        /// Note type code
        note_type: &'a str,
        /// Zero-based ordinal among notes of the type
        ordinal: usize,
        /// Field name; `None` means the body
        field: Option<&'a str>,
    },
}

impl<'a> MachinePath<'a> {
    /// Split a path into its shape; `None` when it matches no shape
    #[must_use]
    pub fn parse(path: &'a str) -> Option<Self> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts[..] {
            [NOTE_PREFIX, note_type, ordinal] if is_name(note_type) => Some(Self::Note {
                note_type,
                ordinal: parse_ordinal(ordinal)?,
                field: None,
            }),
            [NOTE_PREFIX, note_type, ordinal, field] if is_name(note_type) && is_name(field) => {
                Some(Self::Note {
                    note_type,
                    ordinal: parse_ordinal(ordinal)?,
                    field: Some(field),
                })
            }
            [property, ordinal, field] if is_name(property) && is_name(field) => Some(Self::Slot {
                property,
                ordinal: parse_ordinal(ordinal)?,
                field,
            }),
            [field] if is_name(field) => Some(Self::Root { field }),
            _ => None,
        }
    }
}

fn is_name(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_ordinal(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Machine path of a column
#[must_use]
pub fn encode(column: &ColumnDescriptor) -> String {
    let ordinal = column.slot();
    match column.owner {
        OwnerKind::Root => column.field.to_string(),
        OwnerKind::Subrecord(_) | OwnerKind::Instance => {
            format!("{}/{ordinal}/{}", column.owner.property_name(), column.field)
        }
        OwnerKind::Note(note_type) => {
            format!("{NOTE_PREFIX}/{}/{ordinal}/{}", note_type.code(), column.field)
        }
    }
}

/// Column described by a machine path
///
/// # Errors
///
/// Returns `SheetError::ColumnNotFound` when the path has no known shape or
/// names an owner or field the catalog does not define
pub fn decode(catalog: &ColumnCatalog, path: &str) -> Result<ColumnDescriptor> {
    let not_found = || SheetError::column_not_found(path);
    let parsed = MachinePath::parse(path.trim()).ok_or_else(not_found)?;

    let (owner, field, ordinal) = match parsed {
        MachinePath::Note {
            note_type,
            ordinal,
            field,
        } => {
            let note_type = NoteType::from_code(note_type).ok_or_else(not_found)?;
            (
                OwnerKind::Note(note_type),
                field.unwrap_or(NOTE_BODY_FIELD),
                Some(ordinal),
            )
        }
        MachinePath::Slot {
            property,
            ordinal,
            field,
        } => {
            let owner = if property == OwnerKind::Instance.property_name() {
                OwnerKind::Instance
            } else {
                OwnerKind::Subrecord(SubrecordKind::from_property_name(property).ok_or_else(not_found)?)
            };
            (owner, field, Some(ordinal))
        }
        MachinePath::Root { field } => (OwnerKind::Root, field, None),
    };

    let template = catalog.template(owner, field).ok_or_else(not_found)?;
    Ok(match ordinal {
        Some(n) => template.at(n),
        None => template.clone(),
    })
}
