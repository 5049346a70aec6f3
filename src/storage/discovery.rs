//! Schema discovery
//!
//! Builds a [`SchemaCatalog`] from a live database: system fields from
//! `pragma_table_info`, navigation fields from `pragma_foreign_key_list`,
//! metadata fields from the JSON keys present in stored records (top level
//! and one nested level).

use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::catalog::{FieldDef, SchemaCatalog, ValueKind};
use crate::storage::error::StorageResult;
use crate::storage::sql::{foreign_key, ENTITY_TABLE};
use crate::storage::types::{ColumnKind, StoreConfig};

/// Columns of the record table that are never exposed as fields
const HIDDEN_COLUMNS: &[&str] = &["id", "metadata", "metadata_text"];

/// Edit-lock markers kept inside metadata, e.g. `__name__lock__`
pub fn is_lock_key(key: &str) -> bool {
    key.len() > "____lock__".len() && key.starts_with("__") && key.ends_with("__lock__")
}

/// Field kind of a metadata key from the JSON types seen under it
pub fn classify_json_types(types: &BTreeSet<String>) -> ValueKind {
    let seen: Vec<&str> = types
        .iter()
        .map(String::as_str)
        .filter(|t| *t != "null")
        .collect();

    if seen.is_empty() {
        ValueKind::JsonScalar
    } else if only(&seen, &["integer", "real"]) {
        ValueKind::Number
    } else if only(&seen, &["true", "false"]) {
        ValueKind::Boolean
    } else if only(&seen, &["text", "array"]) {
        ValueKind::Text
    } else {
        ValueKind::JsonScalar
    }
}

fn only(seen: &[&str], allowed: &[&str]) -> bool {
    seen.iter().all(|t| allowed.contains(t))
}

fn usable_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '"']) && !is_lock_key(key)
}

pub(crate) fn discover(conn: &Connection, config: &StoreConfig) -> StorageResult<SchemaCatalog> {
    let mut columns: Vec<(String, String)> = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
        let rows = stmt.query_map([ENTITY_TABLE], |row| Ok((row.get(0)?, row.get(1)?)))?;
        for row in rows {
            columns.push(row?);
        }
    }

    let mut relations: Vec<(String, String)> = Vec::new();
    {
        let mut stmt =
            conn.prepare("SELECT \"table\", \"from\" FROM pragma_foreign_key_list(?1)")?;
        let rows = stmt.query_map([ENTITY_TABLE], |row| Ok((row.get(0)?, row.get(1)?)))?;
        for row in rows {
            relations.push(row?);
        }
    }
    let fk_columns: HashSet<&str> = relations.iter().map(|(_, from)| from.as_str()).collect();

    let has_column = |name: &str| columns.iter().any(|(c, _)| c == name);

    let mut builder = SchemaCatalog::builder()
        .unknown_fields(config.unknown_fields)
        .flattened_metadata(config.flattened_metadata && has_column("metadata_text"));

    if let Some(uuid) = config.uuid_column.as_deref().filter(|c| has_column(*c)) {
        builder = builder.uuid_column(uuid);
    }

    for (name, declared) in &columns {
        if HIDDEN_COLUMNS.contains(&name.as_str()) || fk_columns.contains(name.as_str()) {
            continue;
        }

        let kind = ColumnKind::from_declared(declared).value_kind();
        let mut def = FieldDef::system(name, kind);
        if kind == ValueKind::Text && config.searchable.contains(name) {
            def = def.searchable();
        }
        if config.free_text.contains(name) {
            def = def.free_text();
        }
        builder = builder.field(def);
    }

    for (table, from) in &relations {
        if *from != foreign_key(table) {
            tracing::warn!(table = %table, column = %from, "Skipping foreign key with non-standard name");
            continue;
        }
        builder = builder.field(FieldDef::navigation(table));
    }

    if has_column("metadata") {
        for (path, types) in metadata_keys(conn)? {
            let path: Vec<&str> = path.iter().map(String::as_str).collect();
            builder = builder.field(FieldDef::metadata(&path, classify_json_types(&types)));
        }
    }

    let catalog = builder.build();
    tracing::info!(
        fields = catalog.len(),
        relations = relations.len(),
        "Discovered schema catalog"
    );
    Ok(catalog)
}

/// JSON types seen per metadata key path
fn metadata_keys(conn: &Connection) -> StorageResult<BTreeMap<Vec<String>, BTreeSet<String>>> {
    let mut keys: BTreeMap<Vec<String>, BTreeSet<String>> = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT DISTINCT j.key, j.type
         FROM entities AS e, json_each(e.metadata) AS j",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (key, kind) = row?;
        if usable_key(&key) {
            keys.entry(vec![key]).or_default().insert(kind);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT DISTINCT p.key, c.key, c.type
         FROM entities AS e, json_each(e.metadata) AS p, json_each(p.value) AS c
         WHERE p.type = 'object'",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    for row in rows {
        let (parent, key, kind) = row?;
        if usable_key(&parent) && usable_key(&key) {
            keys.entry(vec![parent, key]).or_default().insert(kind);
        }
    }

    Ok(keys)
}
