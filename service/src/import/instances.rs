//! Instance groups: instance type, child container shape and the top
//! container link resolved through the run's container index
//!
//! Digital object instances are never matched against sheet ordinals and
//! are left untouched.

use sheetsync_core::error::Result;
use sheetsync_core::types::{ContainerKey, Instance, Record, SubContainer};
use std::collections::BTreeMap;

use super::context::ContainerIndex;
use super::merge::{FieldGroup, RowMerge, value_text};
use crate::columns::InstanceField;

/// Instance type given to new instances when the row names none
pub const DEFAULT_INSTANCE_TYPE: &str = "mixed_materials";

/// Reconcile instance groups, keyed by ordinal among non digital-object instances
pub(crate) async fn apply(
    merge: &mut RowMerge<'_, '_>,
    record: &mut Record,
    groups: &BTreeMap<usize, FieldGroup<'_>>,
) -> Result<()> {
    let positions: Vec<usize> = record
        .instances
        .iter()
        .enumerate()
        .filter(|(_, instance)| !instance.is_digital_object())
        .map(|(index, _)| index)
        .collect();

    let mut removed = Vec::new();
    for (slot, group) in groups {
        if group.is_invalid() {
            continue;
        }
        match positions.get(*slot) {
            Some(&index) if group.is_empty() => {
                if shows_blank(&record.instances[index], &merge.context.containers) {
                    continue;
                }
                if merge.allow_delete("instance", group) {
                    removed.push(index);
                    merge.mark(true);
                }
            }
            Some(&index) => update_instance(merge, &mut record.instances[index], group).await?,
            None if group.is_empty() => {}
            None => {
                if let Some(instance) = new_instance(merge, group).await? {
                    record.instances.push(instance);
                    merge.mark(true);
                }
            }
        }
    }

    // new instances were appended, so earlier indices are still valid
    for index in removed.into_iter().rev() {
        record.instances.remove(index);
    }
    Ok(())
}

/// Instance renders as an all-blank group
fn shows_blank(instance: &Instance, containers: &ContainerIndex) -> bool {
    let sub_blank = instance.sub_container.as_ref().is_none_or(|sub| {
        ["type_2", "indicator_2", "barcode_2", "type_3", "indicator_3"]
            .iter()
            .all(|key| sub.get(key).is_none_or(str::is_empty))
    });
    let container_blank = instance
        .top_container()
        .is_none_or(|uri| containers.key_for(uri).is_none());
    instance.instance_type.is_none() && sub_blank && container_blank
}

/// Natural key from the row, when the sheet has top container columns
fn container_key(group: &FieldGroup<'_>) -> Option<ContainerKey> {
    container_path(group)?;
    Some(ContainerKey::new(
        group.text("top_container_type").as_deref(),
        group.text("top_container_indicator").as_deref(),
        group.text("top_container_barcode").as_deref(),
    ))
}

fn container_path(group: &FieldGroup<'_>) -> Option<String> {
    group
        .fields()
        .find(|(column, _)| matches!(column.instance_field(), Some(InstanceField::TopContainer(_))))
        .map(|(column, _)| column.path())
}

fn cell_text(value: &serde_json::Value) -> Option<String> {
    value_text(value).filter(|text| !text.is_empty())
}

async fn update_instance(
    merge: &mut RowMerge<'_, '_>,
    instance: &mut Instance,
    group: &FieldGroup<'_>,
) -> Result<()> {
    for (column, value) in group.fields() {
        match column.instance_field() {
            Some(InstanceField::InstanceType) => {
                let code = cell_text(value);
                if instance.instance_type != code {
                    instance.instance_type = code;
                    merge.mark(true);
                }
            }
            Some(InstanceField::SubContainer(key)) => {
                let text = cell_text(value);
                if text.is_none() && instance.sub_container.is_none() {
                    continue;
                }
                let changed = instance
                    .sub_container
                    .get_or_insert_with(SubContainer::default)
                    .set(key, text);
                merge.mark(changed);
            }
            Some(InstanceField::TopContainer(_)) | None => {}
        }
    }

    let Some(key) = container_key(group) else {
        return Ok(());
    };
    let current = instance.top_container().cloned();
    let current_key = current
        .as_ref()
        .and_then(|uri| merge.context.containers.key_for(uri))
        .cloned();

    if key.is_empty() {
        // a reference the sheet could not show is not cleared by a blank triple
        if current_key.is_some() {
            if let Some(sub) = &mut instance.sub_container {
                sub.top_container = None;
            }
            merge.mark(true);
        }
        return Ok(());
    }
    if current_key.as_ref() == Some(&key) {
        return Ok(());
    }

    match merge.context.resolve_container(&key).await? {
        Some(uri) if current.as_ref() == Some(&uri) => {}
        Some(uri) => {
            instance
                .sub_container
                .get_or_insert_with(SubContainer::default)
                .top_container = Some(uri);
            merge.mark(true);
        }
        None => {
            let column = container_path(group);
            merge.error(column.as_deref(), format!("Top container not found: {key}"));
        }
    }
    Ok(())
}

async fn new_instance(merge: &mut RowMerge<'_, '_>, group: &FieldGroup<'_>) -> Result<Option<Instance>> {
    let key = container_key(group).unwrap_or_default();
    if key.is_empty() {
        let column = container_path(group).or_else(|| group.first_path());
        merge.error(column.as_deref(), "A new instance needs a top container");
        return Ok(None);
    }
    let Some(uri) = merge.context.resolve_container(&key).await? else {
        let column = container_path(group);
        merge.error(column.as_deref(), format!("Top container not found: {key}"));
        return Ok(None);
    };

    let mut sub_container = SubContainer {
        top_container: Some(uri),
        ..SubContainer::default()
    };
    for (column, value) in group.fields() {
        if let Some(InstanceField::SubContainer(key)) = column.instance_field() {
            sub_container.set(key, cell_text(value));
        }
    }

    Ok(Some(Instance {
        instance_type: Some(
            group
                .text("instance_type")
                .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
        ),
        sub_container: Some(sub_container),
        digital_object: None,
    }))
}
