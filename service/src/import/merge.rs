//! Row merging: one edited row into one in-memory record
//!
//! Cells are sanitised column by column. Root columns are applied directly;
//! repeating columns are grouped by owner and ordinal first, and each group
//! is reconciled against whatever occupies that ordinal in the record.
//! Identity is positional: the n-th group is matched with the n-th stored
//! subrecord, note of the same type, or non digital-object instance.

use serde_json::Value;
use sheetsync_core::error::Result;
use sheetsync_core::types::{FieldMap, NoteType, Record, SubrecordKind};
use std::collections::{BTreeMap, BTreeSet};

use super::context::RunContext;
use super::header::{SheetLayout, SheetRow, parse_version};
use super::{instances, notes};
use crate::columns::value::sanitise;
use crate::columns::{ColumnCatalog, ColumnDescriptor, OwnerKind};

/// Result of merging one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// At least one field changed; the record is persisted
    Changed,
    /// Nothing differs from the stored record
    Unchanged,
    /// The row produced errors; the record is not persisted
    Rejected,
}

/// Sanitised cells of one owner slot
#[derive(Debug, Default)]
pub(crate) struct FieldGroup<'c> {
    fields: Vec<(&'c ColumnDescriptor, Value)>,
    invalid: bool,
}

impl<'c> FieldGroup<'c> {
    fn push(&mut self, column: &'c ColumnDescriptor, value: Option<Value>) {
        match value {
            Some(value) => self.fields.push((column, value)),
            None => self.invalid = true,
        }
    }

    /// Some cell of the group failed to sanitise
    pub(crate) fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Every cell of the group is blank
    pub(crate) fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, value)| is_absent(value))
    }

    /// Columns and values, in sheet order
    pub(crate) fn fields(&self) -> impl Iterator<Item = (&'c ColumnDescriptor, &Value)> {
        self.fields.iter().map(|(column, value)| (*column, value))
    }

    /// Non-blank value of a field
    pub(crate) fn value(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(column, value)| column.field == field && !is_absent(value))
            .map(|(_, value)| value)
    }

    /// Non-blank text of a field
    pub(crate) fn text(&self, field: &str) -> Option<String> {
        self.value(field).and_then(value_text)
    }

    /// Path of the group's first column, used to place group-level errors
    pub(crate) fn first_path(&self) -> Option<String> {
        self.fields.first().map(|(column, _)| column.path())
    }
}

/// Merge state of one row
pub(crate) struct RowMerge<'r, 'a> {
    pub(crate) context: &'r mut RunContext<'a>,
    row: usize,
    changed: bool,
    rejected: bool,
}

impl<'r, 'a> RowMerge<'r, 'a> {
    fn new(context: &'r mut RunContext<'a>, row: usize) -> Self {
        Self {
            context,
            row,
            changed: false,
            rejected: false,
        }
    }

    /// Record a row error; the row will not be persisted
    pub(crate) fn error(&mut self, column: Option<&str>, message: impl Into<String>) {
        self.context.errors.row_error(self.row, column, message);
        self.rejected = true;
    }

    pub(crate) fn mark(&mut self, changed: bool) {
        self.changed |= changed;
    }

    /// Whether an emptied group may delete what it points at; records the
    /// guarded error when it may not
    pub(crate) fn allow_delete(&mut self, what: &str, group: &FieldGroup<'_>) -> bool {
        if self.context.config.apply_deletes {
            return true;
        }
        let column = group.first_path();
        self.error(
            column.as_deref(),
            format!("Deleting a {what} is disabled. Set import.apply_deletes = true to enable."),
        );
        false
    }

    fn outcome(&self) -> RowOutcome {
        if self.rejected {
            RowOutcome::Rejected
        } else if self.changed {
            RowOutcome::Changed
        } else {
            RowOutcome::Unchanged
        }
    }

    fn check_version(&mut self, cell_text: Option<String>, parsed: Option<u64>, current: u64) {
        if parsed != Some(current) {
            self.error(
                Some("lock_version"),
                format!(
                    "Versions are out sync: {} record is now: {current}",
                    cell_text.unwrap_or_default()
                ),
            );
        }
    }

    fn apply_root(&mut self, record: &mut Record, column: &ColumnDescriptor, value: Value) {
        if ColumnCatalog::IDENTITY_FIELDS.contains(&column.storage_key) {
            return;
        }
        if same_value(record.root_value(column.storage_key).as_ref(), &value) {
            return;
        }
        let changed = record.set_root_value(column.storage_key, value);
        self.mark(changed);
    }

    fn apply_subrecords(
        &mut self,
        record: &mut Record,
        kind: SubrecordKind,
        groups: &BTreeMap<usize, FieldGroup<'_>>,
    ) {
        let what = kind.label().to_lowercase();
        let mut existing: Vec<Option<FieldMap>> = std::mem::take(record.subrecords_mut(kind))
            .into_iter()
            .map(Some)
            .collect();
        let upper = groups
            .keys()
            .next_back()
            .map_or(0, |last| last + 1)
            .max(existing.len());

        let mut merged = Vec::with_capacity(upper);
        for slot in 0..upper {
            let current = existing.get_mut(slot).and_then(Option::take);
            let group = groups.get(&slot).filter(|g| !g.is_invalid());
            match (current, group) {
                (Some(subrecord), None) => merged.push(subrecord),
                (Some(subrecord), Some(group)) if group_matches(&subrecord, group) => {
                    merged.push(subrecord);
                }
                (Some(subrecord), Some(group)) if group.is_empty() => {
                    if self.allow_delete(&what, group) {
                        self.mark(true);
                    } else {
                        merged.push(subrecord);
                    }
                }
                (Some(mut subrecord), Some(group)) => {
                    for (column, value) in group.fields() {
                        let changed = patch_field(&mut subrecord, column.storage_key, value.clone());
                        self.mark(changed);
                    }
                    merged.push(subrecord);
                }
                (None, Some(group)) if !group.is_empty() => {
                    merged.push(new_subrecord(kind, group));
                    self.mark(true);
                }
                (None, _) => {}
            }
        }
        *record.subrecords_mut(kind) = merged;
    }
}

/// Merge one data row into its record
///
/// # Errors
///
/// Returns an error only for collaborator failures (container creation);
/// data problems are collected in the run context
pub async fn merge_row(
    context: &mut RunContext<'_>,
    layout: &SheetLayout,
    row: &SheetRow,
    record: &mut Record,
) -> Result<RowOutcome> {
    let mut merge = RowMerge::new(context, row.number);
    let version = layout.version_cell(row);
    merge.check_version(version.as_text(), parse_version(version), record.lock_version);

    let mut subrecords: BTreeMap<SubrecordKind, BTreeMap<usize, FieldGroup<'_>>> = BTreeMap::new();
    let mut instance_groups: BTreeMap<usize, FieldGroup<'_>> = BTreeMap::new();
    let mut note_groups: BTreeMap<(NoteType, usize), FieldGroup<'_>> = BTreeMap::new();

    for (index, column) in layout.columns() {
        let value = match sanitise(column, row.cell(index)) {
            Ok(value) => Some(value),
            Err(err) => {
                merge.error(Some(&column.path()), err.to_string());
                None
            }
        };
        let group = match column.owner {
            OwnerKind::Root => {
                if let Some(value) = value {
                    merge.apply_root(record, column, value);
                }
                continue;
            }
            OwnerKind::Subrecord(kind) => subrecords
                .entry(kind)
                .or_default()
                .entry(column.slot())
                .or_default(),
            OwnerKind::Instance => instance_groups.entry(column.slot()).or_default(),
            OwnerKind::Note(note_type) => note_groups.entry((note_type, column.slot())).or_default(),
        };
        group.push(column, value);
    }

    for (kind, groups) in &subrecords {
        merge.apply_subrecords(record, *kind, groups);
    }
    notes::apply(&mut merge, record, &note_groups);
    instances::apply(&mut merge, record, &instance_groups).await?;

    if merge.context.config.apply_deletes {
        let touched: BTreeSet<NoteType> = note_groups.keys().map(|(note_type, _)| *note_type).collect();
        let changed = notes::strip_empty(record, &touched);
        merge.mark(changed);
    }

    Ok(merge.outcome())
}

/// Blank once rendered: null, empty text or an empty list
pub(crate) fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Text form of a scalar value
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Stored and incoming values are the same once shown in a cell
pub(crate) fn same_value(current: Option<&Value>, incoming: &Value) -> bool {
    let current = current.filter(|v| !is_absent(v));
    match (current, is_absent(incoming)) {
        (None, absent) => absent,
        (Some(_), true) => false,
        (Some(old), false) => {
            old == incoming
                || match (old, incoming) {
                    (Value::Number(_) | Value::Bool(_), Value::String(text)) => old.to_string() == *text,
                    (Value::Array(items), Value::Array(new_items)) => {
                        items.first() == new_items.first()
                    }
                    _ => false,
                }
        }
    }
}

/// Set or clear a field; returns whether the stored value changed
pub(crate) fn patch_field(fields: &mut FieldMap, key: &str, value: Value) -> bool {
    if same_value(fields.get(key), &value) {
        return false;
    }
    if is_absent(&value) {
        fields.shift_remove(key);
    } else {
        fields.insert(key.to_string(), value);
    }
    true
}

fn group_matches(subrecord: &FieldMap, group: &FieldGroup<'_>) -> bool {
    group
        .fields()
        .all(|(column, value)| same_value(subrecord.get(column.storage_key), value))
}

fn new_subrecord(kind: SubrecordKind, group: &FieldGroup<'_>) -> FieldMap {
    let mut subrecord = FieldMap::new();
    if kind == SubrecordKind::Date {
        subrecord.insert("label".to_string(), Value::from("creation"));
        let date_type = if group.value("end").is_some() {
            "inclusive"
        } else {
            "single"
        };
        subrecord.insert("date_type".to_string(), Value::from(date_type));
    }
    for (column, value) in group.fields() {
        if !is_absent(value) {
            subrecord.insert(column.storage_key.to_string(), value.clone());
        }
    }
    subrecord
}
