//! Sheet-wide checks made before any record is touched

use indexmap::{IndexMap, IndexSet};
use sheetsync_core::error::Result;
use sheetsync_core::traits::DocumentStore;
use sheetsync_core::types::{CellValue, RecordId};
use tracing::{debug, warn};

use super::collector::ErrorCollector;
use super::header::{self, SheetLayout, SheetRow};

/// Outcome of the pre-flight pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preflight {
    /// Parent aggregate shared by every record of the sheet
    pub parent_id: Option<RecordId>,
    /// Distinct record ids, in sheet order
    pub record_ids: Vec<RecordId>,
}

/// Check ids across the whole sheet: each must be an integer, appear once,
/// resolve to a stored record, and all records must share one parent.
/// Problems are collected; nothing is returned as an error except
/// collaborator failures.
///
/// # Errors
///
/// Returns an error if the rows cannot be read or the store fails
pub async fn check<I>(
    store: &dyn DocumentStore,
    layout: &SheetLayout,
    rows: I,
    errors: &mut ErrorCollector,
) -> Result<Preflight>
where
    I: IntoIterator<Item = Result<SheetRow>>,
{
    let mut seen: IndexMap<RecordId, usize> = IndexMap::new();
    for row in rows {
        let row = row?;
        if row.is_blank() {
            continue;
        }
        let cell: &CellValue = layout.id_cell(&row);
        match header::parse_id(cell) {
            Ok(id) => {
                if let Some(first) = seen.get(&id) {
                    errors.sheet_error(
                        Some("id"),
                        format!("Record {id} appears on rows {first} and {}", row.number),
                    );
                } else {
                    seen.insert(id, row.number);
                }
            }
            Err(text) => errors.sheet_error(
                Some("id"),
                format!("Invalid id on row {}: '{text}'", row.number),
            ),
        }
    }

    let record_ids: Vec<RecordId> = seen.keys().copied().collect();
    let headers = store.resolve(&record_ids).await?;
    let found: IndexSet<RecordId> = headers.iter().map(|h| h.id).collect();
    for id in record_ids.iter().filter(|id| !found.contains(*id)) {
        errors.sheet_error(Some("id"), format!("Archival object not found for id: {id}"));
    }

    let parents: IndexSet<RecordId> = headers.iter().map(|h| h.resource_id).collect();
    if parents.len() > 1 {
        let listed: Vec<String> = parents.iter().map(ToString::to_string).collect();
        errors.sheet_error(
            None,
            format!("Records belong to more than one resource: {}", listed.join(", ")),
        );
    }

    if errors.is_empty() {
        debug!(records = record_ids.len(), "Pre-flight checks passed");
    } else {
        warn!("Pre-flight checks failed with {} error(s)", errors.len());
    }

    Ok(Preflight {
        parent_id: parents.first().copied(),
        record_ids,
    })
}
