//! Import scenarios over the in-memory store
//!
//! Each test exports records 10, 11 and 12 of resource 1, edits the rows the
//! way a user would edit the workbook and imports them back.

mod common;

use common::{Fixture, RESOURCE, box_key, failure_entries, messages};
use pretty_assertions::assert_eq;
use serde_json::json;
use sheetsync_core::config::ImportConfig;
use sheetsync_core::error::{RowRef, SheetError};
use sheetsync_core::traits::{ContainerRegistry, PropertyErrors};
use sheetsync_core::types::{
    CellValue, ContainerRef, Instance, Note, NoteType, SubContainer, Subnote,
};
use sheetsync_service::adapters::MemoryStore;
use sheetsync_service::import::VecRows;

const MINUTES_ROW: usize = 0;
const LETTERS_ROW: usize = 1;

const INSTANCE_COLUMNS: [&str; 9] = [
    "instance_type",
    "top_container_type",
    "top_container_indicator",
    "top_container_barcode",
    "sub_container_type_2",
    "sub_container_indicator_2",
    "sub_container_barcode_2",
    "sub_container_type_3",
    "sub_container_indicator_3",
];

fn with_deletes() -> ImportConfig {
    ImportConfig {
        apply_deletes: true,
        ..ImportConfig::default()
    }
}

#[tokio::test]
async fn test_unchanged_sheet_updates_nothing() {
    let fixture = Fixture::new();
    let rows = fixture.exported_rows().await;

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 0);
    assert!(summary.updated_uris.is_empty());
    assert_eq!(fixture.store.update_count(), 0);
    assert!(fixture.sink.lines().is_empty());
}

#[tokio::test]
async fn test_other_note_kinds_survive_an_import() {
    let bibliography = json!({
        "jsonmodel_type": "note_bibliography",
        "content": ["Smith, Board minutes (1991)"],
        "items": ["Vol. 2"]
    });
    let defined_list = json!({
        "jsonmodel_type": "note_definedlist",
        "items": [{"label": "AGM", "value": "Annual general meeting"}]
    });
    let mut minutes = common::minutes();
    minutes.notes.push(Note::Other(bibliography.clone()));
    if let Some(Note::Multipart(scope)) = minutes.notes.first_mut() {
        scope.subnotes.push(Subnote::Other(defined_list.clone()));
    }
    let store = MemoryStore::from_records(common::records());
    store.insert(minutes);
    let fixture = Fixture::with_store(store);

    let mut rows = fixture.exported_rows().await;
    let summary = fixture.service().import_table(&rows).await.unwrap();
    assert_eq!(summary.updated, 0);

    rows.set_cell(MINUTES_ROW, "note/scopecontent/0/content", "Minutes of the trustees");
    fixture.service().import_table(&rows).await.unwrap();

    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(minutes.notes.len(), 2);
    assert_eq!(minutes.notes[1], Note::Other(bibliography));
    let scope = minutes.notes_of(NoteType::ScopeContent).next().unwrap();
    assert_eq!(scope.first_text(), Some("Minutes of the trustees"));
    assert_eq!(scope.subnotes[1], Subnote::Other(defined_list));
}

#[tokio::test]
async fn test_title_change_persists_and_logs() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    assert!(rows.set_cell(LETTERS_ROW, "title", "Letters and postcards"));

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.updated_uris, ["/repositories/2/archival_objects/11"]);
    let letters = fixture.store.get(11).unwrap();
    assert_eq!(letters.root_value("title"), Some(json!("Letters and postcards")));
    assert_eq!(letters.lock_version, 1);
    assert_eq!(fixture.sink.lines(), ["Updated archival object 11 - Letters"]);
    assert_eq!(fixture.store.get(10).unwrap().lock_version, 0);
}

#[tokio::test]
async fn test_enumeration_cell_stores_code() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(LETTERS_ROW, "level", "Item [item]");

    fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(fixture.store.get(11).unwrap().root_value("level"), Some(json!("item")));
}

#[tokio::test]
async fn test_new_date_in_blank_slot() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(LETTERS_ROW, "dates/0/begin", "2001");

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 1);
    let letters = fixture.store.get(11).unwrap();
    assert_eq!(letters.dates.len(), 1);
    let date = &letters.dates[0];
    assert_eq!(date["begin"], json!("2001"));
    assert_eq!(date["date_type"], json!("single"));
    assert_eq!(date["label"], json!("creation"));
    assert!(!date.contains_key("end"));
}

#[tokio::test]
async fn test_new_date_range_is_inclusive() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(LETTERS_ROW, "dates/0/begin", "1950");
    rows.set_cell(LETTERS_ROW, "dates/0/end", "1960-06");

    fixture.service().import_table(&rows).await.unwrap();

    let date = &fixture.store.get(11).unwrap().dates[0];
    assert_eq!(date["date_type"], json!("inclusive"));
    assert_eq!(date["end"], json!("1960-06"));
}

#[tokio::test]
async fn test_second_date_slot_adds_one_date() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "dates/1/expression", "1990");
    rows.set_cell(MINUTES_ROW, "dates/1/begin", "1990-01-01");

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 1);
    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(minutes.dates.len(), 2);
    assert_eq!(minutes.dates[0]["begin"], json!("1990"));
    assert_eq!(minutes.dates[1]["begin"], json!("1990-01-01"));
    assert_eq!(minutes.dates[1]["date_type"], json!("single"));
}

#[tokio::test]
async fn test_existing_date_is_patched() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "dates/0/expression", "circa 1990");

    fixture.service().import_table(&rows).await.unwrap();

    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(minutes.dates.len(), 1);
    assert_eq!(minutes.dates[0]["expression"], json!("circa 1990"));
    assert_eq!(minutes.dates[0]["begin"], json!("1990"));
    assert_eq!(minutes.dates[0]["label"], json!("creation"));
}

#[tokio::test]
async fn test_clearing_a_date_needs_deletes_enabled() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "dates/0/expression", "");
    rows.set_cell(MINUTES_ROW, "dates/0/begin", "");

    let entries = failure_entries(fixture.service().import_table(&rows).await);
    assert_eq!(
        messages(&entries),
        ["Deleting a date is disabled. Set import.apply_deletes = true to enable."]
    );
    assert_eq!(entries[0].row, RowRef::Row(3));
    assert_eq!(fixture.store.get(10).unwrap().dates.len(), 1);

    let summary = fixture
        .service_with(with_deletes())
        .import_table(&rows)
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert!(fixture.store.get(10).unwrap().dates.is_empty());
}

#[tokio::test]
async fn test_clearing_a_note_body_removes_the_note() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "note/scopecontent/0/content", "");

    let entries = failure_entries(fixture.service().import_table(&rows).await);
    assert_eq!(
        messages(&entries),
        ["Deleting a note is disabled. Set import.apply_deletes = true to enable."]
    );

    fixture
        .service_with(with_deletes())
        .import_table(&rows)
        .await
        .unwrap();
    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(minutes.notes_of(NoteType::ScopeContent).count(), 0);
}

#[tokio::test]
async fn test_new_note_and_restriction_extras() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(LETTERS_ROW, "note/accessrestrict/0/content", "Closed until 2030");
    rows.set_cell(LETTERS_ROW, "note/accessrestrict/0/end", "2030-01-01");
    rows.set_cell(
        LETTERS_ROW,
        "note/accessrestrict/0/local_access_restriction_type",
        "Restricted, Fragile [RestrictedFragileSpecColl]",
    );

    fixture.service().import_table(&rows).await.unwrap();

    let letters = fixture.store.get(11).unwrap();
    let note = letters.notes_of(NoteType::AccessRestrict).next().unwrap();
    assert_eq!(note.first_text(), Some("Closed until 2030"));
    assert_eq!(
        note.properties["rights_restriction"],
        json!({
            "end": "2030-01-01",
            "local_access_restriction_type": ["RestrictedFragileSpecColl"]
        })
    );
}

#[tokio::test]
async fn test_note_without_content_is_rejected() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(LETTERS_ROW, "note/accessrestrict/0/end", "2030-01-01");

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(
        messages(&entries),
        ["Cannot add Conditions Governing Access note without content"]
    );
    assert_eq!(entries[0].row, RowRef::Row(4));
    assert!(fixture.store.get(11).unwrap().notes.is_empty());
}

#[tokio::test]
async fn test_missing_container_is_reported() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "instances/0/top_container_indicator", "17");

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(messages(&entries), ["Top container not found: box 17"]);
    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(
        minutes.instances[0].top_container(),
        Some(&ContainerRef::new("/top_containers/1"))
    );
    assert_eq!(fixture.registry.lookup(RESOURCE).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_container_is_created_when_enabled() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "instances/0/top_container_indicator", "17");
    let config = ImportConfig {
        create_missing_containers: true,
        ..ImportConfig::default()
    };

    let summary = fixture.service_with(config).import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 1);
    let containers = fixture.registry.lookup(RESOURCE).await.unwrap();
    assert_eq!(containers.len(), 3);
    let created = &containers[&box_key("17")];
    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(minutes.instances[0].top_container(), Some(created));
    assert_eq!(
        minutes.instances[0].sub_container.as_ref().unwrap().indicator_2.as_deref(),
        Some("3")
    );
}

#[tokio::test]
async fn test_container_switch_and_new_instance() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "instances/0/top_container_indicator", "2");
    rows.set_cell(LETTERS_ROW, "instances/0/top_container_type", "Box [box]");
    rows.set_cell(LETTERS_ROW, "instances/0/top_container_indicator", "1");
    rows.set_cell(LETTERS_ROW, "instances/0/sub_container_indicator_2", "7");

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 2);
    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(
        minutes.instances[0].top_container(),
        Some(&ContainerRef::new("/top_containers/2"))
    );
    let letters = fixture.store.get(11).unwrap();
    assert_eq!(letters.instances.len(), 1);
    let instance = &letters.instances[0];
    assert_eq!(instance.instance_type.as_deref(), Some("mixed_materials"));
    assert_eq!(instance.top_container(), Some(&ContainerRef::new("/top_containers/1")));
    assert_eq!(
        instance.sub_container.as_ref().unwrap().get("indicator_2"),
        Some("7")
    );
}

#[tokio::test]
async fn test_clearing_an_instance_needs_deletes_enabled() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    for column in INSTANCE_COLUMNS {
        assert!(rows.set_cell(MINUTES_ROW, &format!("instances/0/{column}"), ""));
    }

    let entries = failure_entries(fixture.service().import_table(&rows).await);
    assert_eq!(
        messages(&entries),
        ["Deleting a instance is disabled. Set import.apply_deletes = true to enable."]
    );
    assert_eq!(entries[0].row, RowRef::Row(3));
    assert_eq!(fixture.store.get(10).unwrap().instances.len(), 1);

    let summary = fixture
        .service_with(with_deletes())
        .import_table(&rows)
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert!(fixture.store.get(10).unwrap().instances.is_empty());
}

#[tokio::test]
async fn test_digital_objects_do_not_take_instance_slots() {
    let digital = Instance {
        instance_type: Some(Instance::DIGITAL_OBJECT.to_string()),
        sub_container: None,
        digital_object: Some("/repositories/2/digital_objects/9".to_string()),
    };
    let mut letters = common::letters();
    letters.instances.push(digital.clone());
    letters.instances.push(Instance {
        instance_type: Some("mixed_materials".to_string()),
        sub_container: Some(SubContainer {
            top_container: Some(ContainerRef::new("/top_containers/1")),
            type_2: Some("folder".to_string()),
            indicator_2: Some("5".to_string()),
            ..SubContainer::default()
        }),
        digital_object: None,
    });
    let store = MemoryStore::from_records(common::records());
    store.insert(letters);
    let fixture = Fixture::with_store(store);

    let mut rows = fixture.exported_rows().await;
    let column = rows.rows()[1]
        .iter()
        .position(|cell| cell.as_text().as_deref() == Some("instances/0/sub_container_indicator_2"))
        .unwrap();
    assert_eq!(rows.rows()[LETTERS_ROW + 2][column].as_text().as_deref(), Some("5"));
    rows.set_cell(LETTERS_ROW, "instances/0/sub_container_indicator_2", "6");

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 1);
    let letters = fixture.store.get(11).unwrap();
    assert_eq!(letters.instances.len(), 2);
    assert_eq!(letters.instances[0], digital);
    assert_eq!(
        letters.instances[1].sub_container.as_ref().unwrap().get("indicator_2"),
        Some("6")
    );
    assert_eq!(
        letters.instances[1].top_container(),
        Some(&ContainerRef::new("/top_containers/1"))
    );
}

#[tokio::test]
async fn test_new_instance_needs_a_container() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(LETTERS_ROW, "instances/0/sub_container_indicator_2", "7");

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(messages(&entries), ["A new instance needs a top container"]);
}

#[tokio::test]
async fn test_failure_in_later_batch_rolls_back_earlier_batches() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "title", "Board minutes");
    rows.set_cell(LETTERS_ROW, "dates/0/begin", "someday");
    let config = ImportConfig {
        batch_size: 1,
        ..ImportConfig::default()
    };

    let entries = failure_entries(fixture.service_with(config).import_table(&rows).await);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].row, RowRef::Row(4));
    assert_eq!(entries[0].errors, ["Invalid date: someday"]);
    // the first batch was written, then rolled back
    assert_eq!(fixture.store.update_count(), 1);
    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(minutes.root_value("title"), Some(json!("Minutes")));
    assert_eq!(minutes.lock_version, 0);
}

#[tokio::test]
async fn test_stale_version_fails_the_whole_sheet() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(MINUTES_ROW, "lock_version", "5");
    rows.set_cell(MINUTES_ROW, "title", "Board minutes");
    rows.set_cell(LETTERS_ROW, "title", "Letters and postcards");

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].row, RowRef::Row(3));
    assert_eq!(entries[0].column.as_deref(), Some("lock_version"));
    assert_eq!(
        entries[0].errors,
        ["Versions are out sync: 5 record is now: 0"]
    );
    let minutes = fixture.store.get(10).unwrap();
    assert_eq!(minutes.root_value("title"), Some(json!("Minutes")));
    let letters = fixture.store.get(11).unwrap();
    assert_eq!(letters.root_value("title"), Some(json!("Letters")));
    assert_eq!(letters.lock_version, 0);
}

#[tokio::test]
async fn test_store_validation_errors_are_collected_per_property() {
    let store = MemoryStore::from_records(common::records()).with_validator(|record| {
        let mut errors = PropertyErrors::new();
        if record.root_value("title").is_none() {
            errors.insert("title".to_string(), vec!["Property is required".to_string()]);
        }
        errors
    });
    let fixture = Fixture::with_store(store);
    let mut rows = fixture.exported_rows().await;
    rows.set_cell(LETTERS_ROW, "title", "");

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].row, RowRef::Row(4));
    assert_eq!(entries[0].column.as_deref(), Some("title"));
    assert_eq!(entries[0].errors, ["Property is required"]);
    assert!(fixture.sink.lines().is_empty());
}

#[tokio::test]
async fn test_preflight_rejects_unknown_and_invalid_ids() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.push_row(vec!["999".into(), "0".into()]);
    rows.push_row(vec!["abc".into(), "0".into()]);

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(
        messages(&entries),
        [
            "Invalid id on row 7: 'abc'",
            "Archival object not found for id: 999"
        ]
    );
    assert!(entries.iter().all(|e| e.row == RowRef::NotApplicable));
    assert_eq!(fixture.store.update_count(), 0);
}

#[tokio::test]
async fn test_preflight_rejects_duplicate_ids() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.push_row(vec!["11".into(), "0".into()]);

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(messages(&entries), ["Record 11 appears on rows 4 and 6"]);
}

#[tokio::test]
async fn test_preflight_rejects_mixed_resources() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.push_row(vec!["20".into(), "0".into()]);

    let entries = failure_entries(fixture.service().import_table(&rows).await);

    assert_eq!(
        messages(&entries),
        ["Records belong to more than one resource: 1, 2"]
    );
    assert_eq!(entries[0].column, None);
}

#[tokio::test]
async fn test_blank_rows_are_skipped() {
    let fixture = Fixture::new();
    let mut rows = fixture.exported_rows().await;
    rows.push_row(vec![CellValue::Empty, CellValue::from("  ")]);
    rows.push_row(Vec::new());

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 0);
}

#[tokio::test]
async fn test_header_only_sheet_is_a_no_op() {
    let fixture = Fixture::new();
    let rows = VecRows::new(vec![
        vec!["Id".into(), "Version".into()],
        vec!["id".into(), "lock_version".into()],
    ]);

    let summary = fixture.service().import_table(&rows).await.unwrap();

    assert_eq!(summary.updated, 0);
}

#[tokio::test]
async fn test_header_problems() {
    let fixture = Fixture::new();
    let service = fixture.service();

    let unknown = VecRows::new(vec![
        vec!["Id".into(), "Version".into(), "Colour".into()],
        vec!["id".into(), "lock_version".into(), "dates/0/colour".into()],
    ]);
    assert!(matches!(
        service.import_table(&unknown).await,
        Err(SheetError::ColumnNotFound { .. })
    ));

    let no_version = VecRows::new(vec![
        vec!["Id".into(), "Title".into()],
        vec!["id".into(), "title".into()],
    ]);
    match service.import_table(&no_version).await {
        Err(SheetError::ConfigError(message)) => assert!(message.contains("lock_version")),
        other => panic!("unexpected result: {other:?}"),
    }

    let no_paths = VecRows::new(vec![vec!["Id".into()]]);
    assert!(matches!(
        service.import_table(&no_paths).await,
        Err(SheetError::ConfigError(_))
    ));
}
