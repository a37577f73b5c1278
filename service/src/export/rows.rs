//! Row building: one record to one row of cells

use serde_json::Value;
use sheetsync_core::types::{ContainerKey, ContainerRef, MultipartNote, Record};
use std::collections::HashMap;

use super::ExportCell;
use crate::columns::value::render;
use crate::columns::{ColumnDescriptor, EnumCodec, InstanceField, OwnerKind};

/// Renders records against a fixed column list
pub struct RowBuilder<'a> {
    columns: &'a [ColumnDescriptor],
    codec: &'a EnumCodec,
    containers: &'a HashMap<ContainerRef, ContainerKey>,
}

impl<'a> RowBuilder<'a> {
    /// Builder over columns, an enumeration cache and a reverse container index
    #[must_use]
    pub fn new(
        columns: &'a [ColumnDescriptor],
        codec: &'a EnumCodec,
        containers: &'a HashMap<ContainerRef, ContainerKey>,
    ) -> Self {
        Self {
            columns,
            codec,
            containers,
        }
    }

    /// One cell per column
    #[must_use]
    pub fn build(&self, record: &Record) -> Vec<ExportCell> {
        self.columns
            .iter()
            .map(|column| ExportCell {
                value: self.cell_value(record, column),
                locked: column.locked,
            })
            .collect()
    }

    fn cell_value(&self, record: &Record, column: &ColumnDescriptor) -> Option<String> {
        let slot = column.slot();
        match column.owner {
            OwnerKind::Root => self.render(column, record.root_value(column.storage_key).as_ref()),
            OwnerKind::Subrecord(kind) => {
                let subrecord = record.subrecords(kind).get(slot)?;
                self.render(column, subrecord.get(column.storage_key))
            }
            OwnerKind::Instance => {
                let instance = record.sheet_instances().nth(slot)?;
                let text = match column.instance_field()? {
                    InstanceField::InstanceType => instance.instance_type.as_deref(),
                    InstanceField::TopContainer(part) => {
                        let key = self.containers.get(instance.top_container()?)?;
                        part.of(key)
                    }
                    InstanceField::SubContainer(key) => instance.sub_container.as_ref()?.get(key),
                };
                self.render(column, text.map(Value::from).as_ref())
            }
            OwnerKind::Note(note_type) => {
                let note = record.notes_of(note_type).nth(slot)?;
                if column.is_note_body() {
                    note.first_text()
                        .filter(|text| !text.is_empty())
                        .map(ToString::to_string)
                } else {
                    self.render(column, note_extra(note, column))
                }
            }
        }
    }

    fn render(&self, column: &ColumnDescriptor, value: Option<&Value>) -> Option<String> {
        render(column, value, self.codec)
    }
}

/// Extra field of a note, looked up in its property bag when it has one
pub(crate) fn note_extra<'n>(note: &'n MultipartNote, column: &ColumnDescriptor) -> Option<&'n Value> {
    match column.bag {
        Some(bag) => note.properties.get(bag)?.get(column.storage_key),
        None => note.properties.get(column.storage_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{ColumnCatalog, ColumnSelection};
    use crate::slots::SlotPlan;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sheetsync_core::types::{FieldMap, Instance, Note, NoteType, SubContainer, Subnote, SubrecordKind};

    fn record() -> Record {
        let mut record = Record::new(7, 1);
        record.set_root_value("title", json!("Correspondence"));
        record.set_root_value("level", json!("file"));
        record.set_root_value("publish", json!(true));
        record.dates.push(FieldMap::from_iter([
            ("expression".to_string(), json!("1990s")),
            ("certainty".to_string(), json!("approximate")),
        ]));
        record.instances = vec![
            Instance {
                instance_type: Some("digital_object".to_string()),
                digital_object: Some("/digital_objects/1".to_string()),
                ..Instance::default()
            },
            Instance {
                instance_type: Some("mixed_materials".to_string()),
                sub_container: Some(SubContainer {
                    top_container: Some(ContainerRef::new("/top_containers/5")),
                    type_2: Some("folder".to_string()),
                    indicator_2: Some("3".to_string()),
                    ..SubContainer::default()
                }),
                digital_object: None,
            },
        ];
        let mut restriction = MultipartNote::new(NoteType::AccessRestrict);
        restriction.subnotes.push(Subnote::Text {
            content: "Closed until 2030".to_string(),
        });
        restriction.properties.insert(
            "rights_restriction".to_string(),
            json!({"end": "2030-01-01", "local_access_restriction_type": ["RestrictedSpecColl"]}),
        );
        record.notes.push(Note::Multipart(restriction));
        record
    }

    #[test]
    fn test_build_row() {
        let plan = SlotPlan::default()
            .with_subrecord_slots(SubrecordKind::Date, 2)
            .with_instance_slots(1)
            .with_note_slots(NoteType::AccessRestrict, 1);
        let columns = ColumnCatalog::standard().columns_for(&plan, &ColumnSelection::All);
        let containers = HashMap::from([(
            ContainerRef::new("/top_containers/5"),
            ContainerKey::new(Some("box"), Some("12"), None),
        )]);
        let codec = EnumCodec::default();
        let row = RowBuilder::new(&columns, &codec, &containers).build(&record());

        let cells: HashMap<String, Option<String>> = columns
            .iter()
            .zip(&row)
            .map(|(c, cell)| (c.path(), cell.value.clone()))
            .collect();
        let get = |path: &str| cells[path].as_deref();

        assert_eq!(get("id"), Some("7"));
        assert_eq!(get("lock_version"), Some("0"));
        assert_eq!(get("title"), Some("Correspondence"));
        assert_eq!(get("level"), Some("file [file]"));
        assert_eq!(get("publish"), Some("true"));
        assert_eq!(get("dates/0/expression"), Some("1990s"));
        assert_eq!(get("dates/0/certainty"), Some("approximate [approximate]"));
        assert_eq!(get("dates/1/expression"), None);
        assert_eq!(get("instances/0/instance_type"), Some("mixed_materials [mixed_materials]"));
        assert_eq!(get("instances/0/top_container_type"), Some("box [box]"));
        assert_eq!(get("instances/0/top_container_indicator"), Some("12"));
        assert_eq!(get("instances/0/top_container_barcode"), None);
        assert_eq!(get("instances/0/sub_container_indicator_2"), Some("3"));
        assert_eq!(get("note/accessrestrict/0/content"), Some("Closed until 2030"));
        assert_eq!(get("note/accessrestrict/0/end"), Some("2030-01-01"));
        assert_eq!(
            get("note/accessrestrict/0/local_access_restriction_type"),
            Some("RestrictedSpecColl [RestrictedSpecColl]")
        );

        assert!(row[0].locked && row[1].locked);
        assert!(row[2..].iter().all(|cell| !cell.locked));
    }
}
