//! Note groups: body text and structured extras of multipart notes

use serde_json::Value;
use sheetsync_core::types::{MultipartNote, Note, NoteType, Record, Subnote};
use std::collections::{BTreeMap, BTreeSet};

use super::merge::{FieldGroup, RowMerge, is_absent, same_value, value_text};
use crate::columns::ColumnDescriptor;
use crate::export::rows::note_extra;

/// Reconcile note groups, keyed by type and ordinal among notes of that type
pub(crate) fn apply(
    merge: &mut RowMerge<'_, '_>,
    record: &mut Record,
    groups: &BTreeMap<(NoteType, usize), FieldGroup<'_>>,
) {
    for ((note_type, ordinal), group) in groups {
        if group.is_invalid() {
            continue;
        }
        match note_index(record, *note_type, *ordinal) {
            Some(index) => {
                if let Note::Multipart(note) = &mut record.notes[index] {
                    update_note(merge, note, group);
                }
            }
            None => add_note(merge, record, *note_type, group),
        }
    }
}

/// Array index of the n-th multipart note of a type
fn note_index(record: &Record, note_type: NoteType, ordinal: usize) -> Option<usize> {
    record
        .notes
        .iter()
        .enumerate()
        .filter(|(_, note)| note.as_multipart_of(note_type).is_some())
        .nth(ordinal)
        .map(|(index, _)| index)
}

fn body<'g>(group: &'g FieldGroup<'_>) -> Option<&'g Value> {
    group
        .fields()
        .find(|(column, _)| column.is_note_body())
        .map(|(_, value)| value)
}

fn extras<'g, 'c>(group: &'g FieldGroup<'c>) -> impl Iterator<Item = (&'c ColumnDescriptor, &'g Value)> {
    group.fields().filter(|(column, _)| !column.is_note_body())
}

fn stored_form(column: &ColumnDescriptor, value: &Value) -> Value {
    if column.list_valued && !is_absent(value) {
        Value::Array(vec![value.clone()])
    } else {
        value.clone()
    }
}

fn note_matches(note: &MultipartNote, group: &FieldGroup<'_>) -> bool {
    let current_body = note.first_text().map(Value::from);
    let body_same = body(group).is_none_or(|value| same_value(current_body.as_ref(), value));
    body_same
        && extras(group)
            .all(|(column, value)| same_value(note_extra(note, column), &stored_form(column, value)))
}

fn update_note(merge: &mut RowMerge<'_, '_>, note: &mut MultipartNote, group: &FieldGroup<'_>) {
    if note_matches(note, group) {
        return;
    }
    if group.is_empty() && !merge.allow_delete("note", group) {
        return;
    }

    if let Some(value) = body(group) {
        let text = value_text(value).unwrap_or_default();
        match note.first_text_mut() {
            Some(content) if *content != text => {
                if text.is_empty() && !group.is_empty() && !merge.allow_delete("note", group) {
                    return;
                }
                *content = text;
                merge.mark(true);
            }
            Some(_) => {}
            None if !text.is_empty() => {
                note.subnotes.insert(0, Subnote::Text { content: text });
                merge.mark(true);
            }
            None => {}
        }
    }

    for (column, value) in extras(group) {
        let changed = set_extra(note, column, stored_form(column, value));
        merge.mark(changed);
    }
}

fn add_note(
    merge: &mut RowMerge<'_, '_>,
    record: &mut Record,
    note_type: NoteType,
    group: &FieldGroup<'_>,
) {
    if group.is_empty() {
        return;
    }
    let Some(content) = body(group).and_then(value_text).filter(|t| !t.is_empty()) else {
        let column = group.first_path();
        merge.error(
            column.as_deref(),
            format!("Cannot add {} note without content", note_type.label()),
        );
        return;
    };

    let mut note = MultipartNote::new(note_type);
    note.subnotes.push(Subnote::Text { content });
    for (column, value) in extras(group) {
        set_extra(&mut note, column, stored_form(column, value));
    }
    record.notes.push(Note::Multipart(note));
    merge.mark(true);
}

/// Set or clear an extra field, inside its property bag when it has one
fn set_extra(note: &mut MultipartNote, column: &ColumnDescriptor, value: Value) -> bool {
    if same_value(note_extra(note, column), &value) {
        return false;
    }
    let absent = is_absent(&value);
    let target = match column.bag {
        Some(bag) => {
            let entry = note
                .properties
                .entry(bag.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(serde_json::Map::new());
            }
            match entry.as_object_mut() {
                Some(map) => map,
                None => return false,
            }
        }
        None => {
            if absent {
                return note.properties.shift_remove(column.storage_key).is_some();
            }
            note.properties.insert(column.storage_key.to_string(), value);
            return true;
        }
    };
    if absent {
        target.remove(column.storage_key);
    } else {
        target.insert(column.storage_key.to_string(), value);
    }
    true
}

/// Drop empty text subnotes, then multipart notes left without subnotes,
/// for the given note types. Returns whether anything was removed.
pub(crate) fn strip_empty(record: &mut Record, note_types: &BTreeSet<NoteType>) -> bool {
    let in_scope = |note: &MultipartNote| {
        note_types
            .iter()
            .any(|note_type| note.note_type == note_type.code())
    };

    let mut changed = false;
    for note in &mut record.notes {
        let Note::Multipart(note) = note else {
            continue;
        };
        if !in_scope(note) {
            continue;
        }
        let before = note.subnotes.len();
        note.subnotes
            .retain(|subnote| !matches!(subnote, Subnote::Text { content } if content.trim().is_empty()));
        changed |= note.subnotes.len() != before;
    }

    let before = record.notes.len();
    record
        .notes
        .retain(|note| !matches!(note, Note::Multipart(m) if in_scope(m) && m.subnotes.is_empty()));
    changed || record.notes.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sheetsync_core::types::SinglepartNote;

    fn multipart(note_type: NoteType, text: &str) -> Note {
        let mut note = MultipartNote::new(note_type);
        note.subnotes.push(Subnote::Text {
            content: text.to_string(),
        });
        Note::Multipart(note)
    }

    #[test]
    fn test_note_index_counts_same_type_only() {
        let mut record = Record::new(1, 1);
        record.notes = vec![
            multipart(NoteType::ScopeContent, "a"),
            Note::Singlepart(SinglepartNote {
                note_type: "abstract".to_string(),
                content: vec!["x".to_string()],
                properties: Default::default(),
            }),
            multipart(NoteType::BiogHist, "b"),
            multipart(NoteType::ScopeContent, "c"),
        ];
        assert_eq!(note_index(&record, NoteType::ScopeContent, 1), Some(3));
        assert_eq!(note_index(&record, NoteType::BiogHist, 0), Some(2));
        assert_eq!(note_index(&record, NoteType::BiogHist, 1), None);
    }

    #[test]
    fn test_set_extra_in_bag() {
        let mut note = MultipartNote::new(NoteType::AccessRestrict);
        let column = crate::columns::STANDARD_CATALOG
            .template(crate::columns::OwnerKind::Note(NoteType::AccessRestrict), "local_access_restriction_type")
            .unwrap()
            .at(0);

        assert!(set_extra(&mut note, &column, stored_form(&column, &json!("RestrictedSpecColl"))));
        assert_eq!(
            note.properties["rights_restriction"],
            json!({"local_access_restriction_type": ["RestrictedSpecColl"]})
        );
        assert!(!set_extra(&mut note, &column, stored_form(&column, &json!("RestrictedSpecColl"))));
        assert!(set_extra(&mut note, &column, Value::Null));
        assert_eq!(note.properties["rights_restriction"], json!({}));
    }

    #[test]
    fn test_strip_empty() {
        let mut record = Record::new(1, 1);
        let mut listed = MultipartNote::new(NoteType::ScopeContent);
        listed.subnotes = vec![
            Subnote::Text {
                content: String::new(),
            },
            Subnote::OrderedList {
                title: None,
                items: vec!["one".to_string()],
            },
        ];
        record.notes = vec![
            multipart(NoteType::ScopeContent, " "),
            Note::Multipart(listed),
            multipart(NoteType::BiogHist, ""),
        ];

        assert!(strip_empty(&mut record, &BTreeSet::from([NoteType::ScopeContent])));
        // the list subnote keeps its note alive; bioghist is out of scope
        assert_eq!(record.notes.len(), 2);
        assert_eq!(record.notes_of(NoteType::ScopeContent).count(), 1);
        assert_eq!(record.notes_of(NoteType::BiogHist).count(), 1);
        assert!(!strip_empty(&mut record, &BTreeSet::from([NoteType::ScopeContent])));
    }
}
