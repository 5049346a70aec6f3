//! CSV rendering of search results

use std::collections::BTreeSet;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{Entity, SearchPage};

const FIXED_COLUMNS: &[&str] = &[
    "id",
    "uuid",
    "name",
    "description",
    "created_at",
    "last_edited_at",
];

/// One CSV row per record. Relation and extra columns follow the fixed
/// ones in name order; metadata is written as JSON in the last column.
pub fn page_to_csv(page: &SearchPage) -> StorageResult<String> {
    let extra: BTreeSet<&str> = page
        .items
        .iter()
        .flat_map(|e| e.attributes.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let header = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(extra.iter().copied())
        .chain(std::iter::once("metadata"));
    writer.write_record(header)?;

    for entity in &page.items {
        writer.write_record(csv_row(entity, &extra))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StorageError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StorageError::Export(e.to_string()))
}

fn csv_row(entity: &Entity, extra: &BTreeSet<&str>) -> Vec<String> {
    let mut row = vec![
        entity.id.to_string(),
        entity.uuid.clone(),
        entity.name.clone(),
        entity.description.clone().unwrap_or_default(),
        entity.created_at.to_rfc3339(),
        entity
            .last_edited_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
    ];

    for key in extra {
        row.push(match entity.attributes.get(*key) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        });
    }

    row.push(entity.metadata.to_string());
    row
}
