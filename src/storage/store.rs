//! SQLite record store
//!
//! One `entities` table holds every record; navigation relations live in
//! `(id, name)` tables referenced through `<relation>_id` columns. Metadata
//! is a JSON document per record, with a flattened text copy of its values
//! kept beside it for global search.
//!
//! The connection sits behind a mutex; async callers go through
//! `spawn_blocking`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::catalog::{FieldOrigin, SchemaCatalog, ValueKind};
use crate::query::{lookup_known_field, Predicate, ResolvedField};
use crate::storage::discovery::{self, is_lock_key};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::sql::{
    self, column_ref, escape_like, foreign_key, format_timestamp, json_path, navigation_ref,
    quote_ident, SqlBuilder, ENTITY_TABLE,
};
use crate::storage::types::{
    ColumnKind, ColumnSpec, Entity, NewEntity, SearchOptions, SearchPage, StoreConfig,
    MAX_PAGE_SIZE,
};
use crate::suggest::{SamplerError, ValueSampler};

/// Columns every record table has
const FIXED_COLUMNS: &[&str] = &[
    "id",
    "uuid",
    "name",
    "description",
    "created_at",
    "last_edited_at",
    "metadata",
    "metadata_text",
];

/// SQLite-backed record store
#[derive(Debug, Clone)]
pub struct CatalogStore {
    conn: Arc<Mutex<Connection>>,
    config: Arc<StoreConfig>,
    path: Option<PathBuf>,
}

impl CatalogStore {
    /// Create or open a store file
    pub fn open(path: &Path, config: StoreConfig) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::init(conn, config, Some(path.to_path_buf()))
    }

    /// Private in-memory store, mostly for tests and one-off CLI runs
    pub fn open_in_memory(config: StoreConfig) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init(conn, config, None)
    }

    fn init(conn: Connection, config: StoreConfig, path: Option<PathBuf>) -> StorageResult<Self> {
        validate_layout(&config)?;
        sql::register_functions(&conn)?;
        conn.execute_batch(&schema_sql(&config))?;

        tracing::info!(
            path = ?path,
            relations = config.relations.len(),
            columns = config.columns.len(),
            "Opened record store"
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Build a catalog snapshot from the current table layout and data
    pub fn discover_catalog(&self) -> StorageResult<SchemaCatalog> {
        let conn = self.lock()?;
        discovery::discover(&conn, &self.config)
    }

    /// Number of stored records
    pub fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", ENTITY_TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Insert records in one transaction; nothing is stored if any record
    /// is rejected
    pub fn import_records(&self, records: &[NewEntity]) -> StorageResult<usize> {
        let start = Instant::now();
        let insert = self.insert_sql();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&insert)?;
            for record in records {
                let values = self.record_values(&tx, record)?;
                stmt.execute(params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;

        tracing::info!(
            count = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Imported records"
        );
        Ok(records.len())
    }

    /// Run a compiled predicate; the catalog resolves `sort_by`
    pub fn search(
        &self,
        catalog: &SchemaCatalog,
        predicate: &Predicate,
        options: &SearchOptions,
    ) -> StorageResult<SearchPage> {
        let start = Instant::now();
        let limit = options.limit.min(MAX_PAGE_SIZE);
        let filter = sql::translate(predicate);

        let mut page = SqlBuilder::new();
        let condition = page.condition(predicate);
        let order = order_clause(&mut page, catalog, options)?;
        let limit_param = page.bind(limit as i64);
        let offset_param = page.bind(options.offset as i64);
        let query = format!(
            "SELECT {} FROM {} AS e WHERE {} ORDER BY {} LIMIT {} OFFSET {}",
            self.select_list(),
            ENTITY_TABLE,
            condition,
            order,
            limit_param,
            offset_param
        );

        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} AS e WHERE {}", ENTITY_TABLE, filter.sql),
            params_from_iter(filter.params.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(page.params().iter()), |row| {
            read_entity(row, &self.config)
        })?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            total,
            returned = items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Search executed"
        );

        Ok(SearchPage {
            total: total as u64,
            limit,
            offset: options.offset,
            items,
        })
    }

    /// Distinct values of a field starting with `prefix` (case-insensitive)
    pub fn distinct_values(
        &self,
        origin: &FieldOrigin,
        prefix: &str,
        limit: usize,
    ) -> StorageResult<Vec<String>> {
        let mut sql = SqlBuilder::new();
        let query = match origin {
            FieldOrigin::Navigation { relation, column } => {
                let pattern = sql.bind(format!("{}%", escape_like(prefix)));
                let limit = sql.bind(limit as i64);
                format!(
                    "SELECT DISTINCT n.{c} FROM {r} AS n \
                     WHERE n.{c} LIKE {p} ESCAPE '\\' \
                     ORDER BY n.{c} COLLATE NOCASE LIMIT {l}",
                    c = quote_ident(column),
                    r = quote_ident(relation),
                    p = pattern,
                    l = limit
                )
            }
            FieldOrigin::System { column } => values_query(&mut sql, &column_ref(column), prefix, limit),
            FieldOrigin::Metadata { path } => metadata_values_query(&mut sql, path, prefix, limit),
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(sql.params().iter()), |row| {
            row.get::<_, String>(0)
        })?;
        let values = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn insert_sql(&self) -> String {
        let mut columns: Vec<String> = FIXED_COLUMNS[1..].iter().map(|c| c.to_string()).collect();
        columns.extend(self.config.columns.iter().map(|c| quote_ident(&c.name)));
        columns.extend(
            self.config
                .relations
                .iter()
                .map(|r| quote_ident(&foreign_key(r))),
        );

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            ENTITY_TABLE,
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn select_list(&self) -> String {
        let mut columns: Vec<String> = [
            "e.id",
            "e.uuid",
            "e.name",
            "e.description",
            "e.created_at",
            "e.last_edited_at",
            "e.metadata",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        columns.extend(self.config.columns.iter().map(|c| column_ref(&c.name)));
        columns.extend(
            self.config
                .relations
                .iter()
                .map(|r| navigation_ref(r, "name")),
        );
        columns.join(", ")
    }

    fn record_values(&self, conn: &Connection, record: &NewEntity) -> StorageResult<Vec<SqlValue>> {
        if record.name.trim().is_empty() {
            return Err(StorageError::InvalidRecord(
                "record name must not be empty".to_string(),
            ));
        }

        let known: HashSet<&str> = self
            .config
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.config.relations.iter().map(String::as_str))
            .collect();
        if let Some(key) = record.attributes.keys().find(|k| !known.contains(k.as_str())) {
            return Err(StorageError::InvalidRecord(format!(
                "unknown attribute '{}' on record '{}'",
                key, record.name
            )));
        }

        let metadata = serde_json::Value::Object(record.metadata.clone());
        let mut values = vec![
            SqlValue::Text(
                record
                    .uuid
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            ),
            SqlValue::Text(record.name.clone()),
            record
                .description
                .clone()
                .map(SqlValue::Text)
                .unwrap_or(SqlValue::Null),
            SqlValue::Text(format_timestamp(&record.created_at.unwrap_or_else(Utc::now))),
            record
                .last_edited_at
                .as_ref()
                .map(|at| SqlValue::Text(format_timestamp(at)))
                .unwrap_or(SqlValue::Null),
            SqlValue::Text(serde_json::to_string(&metadata)?),
            SqlValue::Text(flatten_metadata(&metadata)),
        ];

        for spec in &self.config.columns {
            values.push(column_value(spec, record.attributes.get(&spec.name))?);
        }

        for relation in &self.config.relations {
            let value = match record.attributes.get(relation) {
                None | Some(serde_json::Value::Null) => SqlValue::Null,
                Some(serde_json::Value::String(name)) => {
                    SqlValue::Integer(relation_id(conn, relation, name)?)
                }
                Some(other) => {
                    return Err(StorageError::InvalidRecord(format!(
                        "relation '{}' expects a name, got {}",
                        relation, other
                    )))
                }
            };
            values.push(value);
        }

        Ok(values)
    }
}

#[async_trait]
impl ValueSampler for CatalogStore {
    async fn sample(
        &self,
        field: &ResolvedField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, SamplerError> {
        let store = self.clone();
        let origin = field.origin.clone();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || store.distinct_values(&origin, &prefix, limit))
            .await
            .map_err(|e| SamplerError::Backend(e.to_string()))?
            .map_err(|e| SamplerError::Backend(e.to_string()))
    }
}

/// Space-joined text of every metadata value, lock markers excluded
pub fn flatten_metadata(metadata: &serde_json::Value) -> String {
    let mut parts = Vec::new();
    collect_text(metadata, &mut parts);
    parts.join(" ")
}

fn collect_text(value: &serde_json::Value, parts: &mut Vec<String>) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::Bool(b) => parts.push(b.to_string()),
        serde_json::Value::Number(n) => parts.push(n.to_string()),
        serde_json::Value::String(s) => parts.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_text(item, parts);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                if !is_lock_key(key) {
                    collect_text(item, parts);
                }
            }
        }
    }
}

fn values_query(sql: &mut SqlBuilder, expr: &str, prefix: &str, limit: usize) -> String {
    let pattern = sql.bind(format!("{}%", escape_like(prefix)));
    let limit = sql.bind(limit as i64);
    format!(
        "SELECT DISTINCT v FROM (SELECT CAST({} AS TEXT) AS v FROM {} AS e) \
         WHERE v IS NOT NULL AND v LIKE {} ESCAPE '\\' \
         ORDER BY v COLLATE NOCASE LIMIT {}",
        expr, ENTITY_TABLE, pattern, limit
    )
}

/// Array elements are sampled one by one; objects yield nothing
fn metadata_values_query(
    sql: &mut SqlBuilder,
    path: &[String],
    prefix: &str,
    limit: usize,
) -> String {
    let path = sql.bind(json_path(path));
    let pattern = sql.bind(format!("{}%", escape_like(prefix)));
    let limit = sql.bind(limit as i64);
    format!(
        "SELECT DISTINCT v FROM (\
           SELECT CASE j.type WHEN 'true' THEN 'true' WHEN 'false' THEN 'false' \
                  ELSE CAST(j.value AS TEXT) END AS v \
           FROM {t} AS e, json_each(e.metadata, {p}) AS j \
           WHERE json_type(e.metadata, {p}) <> 'object' \
             AND j.type NOT IN ('object', 'array', 'null')) \
         WHERE v LIKE {pat} ESCAPE '\\' \
         ORDER BY v COLLATE NOCASE LIMIT {l}",
        t = ENTITY_TABLE,
        p = path,
        pat = pattern,
        l = limit
    )
}

fn order_clause(
    sql: &mut SqlBuilder,
    catalog: &SchemaCatalog,
    options: &SearchOptions,
) -> StorageResult<String> {
    let direction = options.sort_order.as_sql();
    let Some(name) = options.sort_by.as_deref() else {
        return Ok(format!("e.id {}", direction));
    };

    let field = lookup_known_field(catalog, name)
        .ok_or_else(|| StorageError::UnknownSortField(name.to_string()))?;

    let expr = match &field.origin {
        FieldOrigin::System { column } => column_ref(column),
        FieldOrigin::Navigation { relation, column } => navigation_ref(relation, column),
        FieldOrigin::Metadata { path } => {
            format!("json_extract(e.metadata, {})", sql.bind(json_path(path)))
        }
    };
    let collate = if field.kind == ValueKind::Text {
        " COLLATE NOCASE"
    } else {
        ""
    };

    // Missing values sort last in both directions
    Ok(format!(
        "{e} IS NULL, {e}{c} {d}, e.id ASC",
        e = expr,
        c = collate,
        d = direction
    ))
}

fn relation_id(conn: &Connection, relation: &str, name: &str) -> StorageResult<i64> {
    let table = quote_ident(relation);
    conn.prepare_cached(&format!("INSERT OR IGNORE INTO {} (name) VALUES (?1)", table))?
        .execute([name])?;
    let id = conn
        .prepare_cached(&format!("SELECT id FROM {} WHERE name = ?1", table))?
        .query_row([name], |row| row.get(0))?;
    Ok(id)
}

fn column_value(spec: &ColumnSpec, value: Option<&serde_json::Value>) -> StorageResult<SqlValue> {
    use serde_json::Value as Json;

    let mismatch = |got: &Json| {
        StorageError::InvalidRecord(format!(
            "column '{}' expects {:?}, got {}",
            spec.name, spec.kind, got
        ))
    };

    Ok(match (spec.kind, value) {
        (_, None) | (_, Some(Json::Null)) => SqlValue::Null,
        (ColumnKind::Text, Some(Json::String(s))) => SqlValue::Text(s.clone()),
        (ColumnKind::Number, Some(Json::Number(n))) => match n.as_f64() {
            Some(f) => SqlValue::Real(f),
            None => return Err(mismatch(&Json::Number(n.clone()))),
        },
        (ColumnKind::Boolean, Some(Json::Bool(b))) => SqlValue::Integer(i64::from(*b)),
        (ColumnKind::Timestamp, Some(Json::String(s))) => {
            let at = DateTime::parse_from_rfc3339(s)
                .map_err(|e| StorageError::InvalidRecord(format!("{}: {}", spec.name, e)))?;
            SqlValue::Text(format_timestamp(&at.with_timezone(&Utc)))
        }
        (_, Some(other)) => return Err(mismatch(other)),
    })
}

fn read_entity(row: &Row<'_>, config: &StoreConfig) -> rusqlite::Result<Entity> {
    let created_at: String = row.get(4)?;
    let last_edited_at: Option<String> = row.get(5)?;
    let metadata: String = row.get(6)?;

    let mut attributes = BTreeMap::new();
    let mut idx = 7;
    for spec in &config.columns {
        attributes.insert(spec.name.clone(), json_of(row.get_ref(idx)?, spec.kind));
        idx += 1;
    }
    for relation in &config.relations {
        let name: Option<String> = row.get(idx)?;
        attributes.insert(
            relation.clone(),
            name.map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        );
        idx += 1;
    }

    Ok(Entity {
        id: row.get(0)?,
        uuid: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: parse_stored_timestamp(4, &created_at)?,
        last_edited_at: last_edited_at
            .map(|s| parse_stored_timestamp(5, &s))
            .transpose()?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
        attributes,
    })
}

fn parse_stored_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_of(value: ValueRef<'_>, kind: ColumnKind) -> serde_json::Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => serde_json::Value::Null,
        ValueRef::Integer(i) if kind == ColumnKind::Boolean => serde_json::Value::Bool(i != 0),
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_layout(config: &StoreConfig) -> StorageResult<()> {
    let mut taken: HashSet<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();

    for relation in &config.relations {
        if !is_identifier(relation) || relation == ENTITY_TABLE {
            return Err(StorageError::InvalidLayout(format!(
                "invalid relation name '{}'",
                relation
            )));
        }
        if !taken.insert(foreign_key(relation)) {
            return Err(StorageError::InvalidLayout(format!(
                "duplicate relation '{}'",
                relation
            )));
        }
    }

    for column in &config.columns {
        if !is_identifier(&column.name) {
            return Err(StorageError::InvalidLayout(format!(
                "invalid column name '{}'",
                column.name
            )));
        }
        if !taken.insert(column.name.clone()) || config.relations.contains(&column.name) {
            return Err(StorageError::InvalidLayout(format!(
                "column '{}' clashes with another column or relation",
                column.name
            )));
        }
    }

    Ok(())
}

fn schema_sql(config: &StoreConfig) -> String {
    let mut sql = String::new();

    for relation in &config.relations {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE
            );\n",
            quote_ident(relation)
        ));
    }

    let mut columns: Vec<String> = vec![
        "id INTEGER PRIMARY KEY".to_string(),
        "uuid TEXT NOT NULL UNIQUE".to_string(),
        "name TEXT NOT NULL".to_string(),
        "description TEXT".to_string(),
        "created_at TIMESTAMP NOT NULL".to_string(),
        "last_edited_at TIMESTAMP".to_string(),
        "metadata TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(metadata))".to_string(),
        "metadata_text TEXT NOT NULL DEFAULT ''".to_string(),
    ];
    for column in &config.columns {
        columns.push(format!("{} {}", quote_ident(&column.name), column.kind.sql_type()));
    }
    for relation in &config.relations {
        columns.push(format!(
            "{} INTEGER REFERENCES {}(id)",
            quote_ident(&foreign_key(relation)),
            quote_ident(relation)
        ));
    }

    sql.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        ENTITY_TABLE,
        columns.join(",\n    ")
    ));
    sql.push_str("CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name COLLATE NOCASE);\n");
    sql.push_str(
        "CREATE INDEX IF NOT EXISTS idx_entities_last_edited ON entities(last_edited_at);\n",
    );
    for relation in &config.relations {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON entities({});\n",
            quote_ident(&format!("idx_entities_{}", foreign_key(relation))),
            quote_ident(&foreign_key(relation))
        ));
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryEngine;
    use crate::storage::types::SortOrder;
    use serde_json::json;
    use tempfile::TempDir;

    fn book_config() -> StoreConfig {
        StoreConfig::new()
            .relation("author")
            .relation("genre")
            .column("price", ColumnKind::Number)
            .column("in_stock", ColumnKind::Boolean)
    }

    fn books() -> Vec<NewEntity> {
        vec![
            NewEntity::new("Dune")
                .description("Desert planet saga")
                .attr("author", "Frank Herbert")
                .attr("genre", "Science Fiction")
                .attr("price", 9.99)
                .attr("in_stock", true)
                .meta("status", json!("published"))
                .meta("pages", json!(412))
                .meta("tags", json!(["classic", "space"]))
                .meta("edition", json!({"year": 1965}))
                .meta("__name__lock__", json!(true)),
            NewEntity::new("Hyperion")
                .attr("author", "Dan Simmons")
                .attr("genre", "Science Fiction")
                .attr("price", 12.5)
                .attr("in_stock", false)
                .meta("status", json!("draft"))
                .meta("pages", json!(482)),
            NewEntity::new("Emma")
                .description("Comedy of manners")
                .attr("author", "Jane Austen")
                .attr("genre", "Classic")
                .attr("price", 4.0)
                .meta("pages", json!(474))
                .meta("signed", json!(true)),
            NewEntity::new("Untitled"),
        ]
    }

    fn seeded() -> (CatalogStore, Arc<SchemaCatalog>) {
        let store = CatalogStore::open_in_memory(book_config()).unwrap();
        store.import_records(&books()).unwrap();
        let catalog = Arc::new(store.discover_catalog().unwrap());
        (store, catalog)
    }

    fn search_names(store: &CatalogStore, catalog: &Arc<SchemaCatalog>, query: &str) -> Vec<String> {
        let predicate = QueryEngine::new(Arc::clone(catalog))
            .compile_str(query)
            .unwrap();
        let options = SearchOptions::default().sort("name", SortOrder::Asc);
        store
            .search(catalog, &predicate, &options)
            .unwrap()
            .items
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[test]
    fn test_discovered_catalog() {
        let (_store, catalog) = seeded();

        assert_eq!(catalog.get("price").unwrap().kind, ValueKind::Number);
        assert_eq!(catalog.get("in_stock").unwrap().kind, ValueKind::Boolean);
        assert_eq!(catalog.get("created_at").unwrap().kind, ValueKind::Timestamp);
        assert!(catalog.get("author").unwrap().is_navigation());
        assert!(catalog.get("name").unwrap().searchable);
        assert!(catalog.get("name").unwrap().free_text);

        assert_eq!(catalog.get("status").unwrap().kind, ValueKind::Text);
        assert_eq!(catalog.get("tags").unwrap().kind, ValueKind::Text);
        assert_eq!(catalog.get("pages").unwrap().kind, ValueKind::Number);
        assert_eq!(catalog.get("signed").unwrap().kind, ValueKind::Boolean);
        assert_eq!(catalog.get("edition").unwrap().kind, ValueKind::JsonScalar);
        assert_eq!(catalog.get("edition.year").unwrap().kind, ValueKind::Number);

        for hidden in ["id", "metadata", "metadata_text", "author_id", "__name__lock__"] {
            assert!(catalog.get(hidden).is_none(), "{} should be hidden", hidden);
        }
        assert_eq!(catalog.uuid_column(), Some("uuid"));
        assert!(catalog.has_flattened_metadata());
    }

    #[test]
    fn test_search_match_all() {
        let (store, catalog) = seeded();
        assert_eq!(
            search_names(&store, &catalog, "   "),
            vec!["Dune", "Emma", "Hyperion", "Untitled"]
        );
    }

    #[test]
    fn test_search_columns_and_navigation() {
        let (store, catalog) = seeded();
        assert_eq!(search_names(&store, &catalog, "genre:science"), vec!["Dune", "Hyperion"]);
        assert_eq!(search_names(&store, &catalog, "price>5"), vec!["Dune", "Hyperion"]);
        assert_eq!(search_names(&store, &catalog, "in_stock=false"), vec!["Hyperion"]);
        assert_eq!(search_names(&store, &catalog, "name=~\"^d.ne$\""), vec!["Dune"]);
        assert_eq!(
            search_names(&store, &catalog, "author=\"jane austen\" OR price>10"),
            vec!["Emma", "Hyperion"]
        );
    }

    #[test]
    fn test_search_metadata() {
        let (store, catalog) = seeded();
        assert_eq!(search_names(&store, &catalog, "pages>=474"), vec!["Emma", "Hyperion"]);
        assert_eq!(search_names(&store, &catalog, "status=DRAFT"), vec!["Hyperion"]);
        assert_eq!(search_names(&store, &catalog, "tags=space"), vec!["Dune"]);
        assert_eq!(search_names(&store, &catalog, "edition.year<1970"), vec!["Dune"]);
        assert_eq!(search_names(&store, &catalog, "signed=true"), vec!["Emma"]);
    }

    #[test]
    fn test_negation_and_missing_values() {
        let (store, catalog) = seeded();
        assert_eq!(search_names(&store, &catalog, "status!=draft"), vec!["Dune"]);
        assert_eq!(
            search_names(&store, &catalog, "NOT status=draft"),
            vec!["Dune", "Emma", "Untitled"]
        );
        assert_eq!(search_names(&store, &catalog, "status:*"), vec!["Dune", "Hyperion"]);
        assert_eq!(search_names(&store, &catalog, "status!:*"), vec!["Emma", "Untitled"]);
    }

    #[test]
    fn test_fuzzy_threshold() {
        let (store, catalog) = seeded();
        assert_eq!(
            search_names(&store, &catalog, "genre#\"Science Fictio\""),
            vec!["Dune", "Hyperion"]
        );
        assert!(search_names(&store, &catalog, "genre#Classi").is_empty());
    }

    #[test]
    fn test_global_terms() {
        let (store, catalog) = seeded();
        assert_eq!(search_names(&store, &catalog, "herbert"), vec!["Dune"]);
        assert_eq!(search_names(&store, &catalog, "classic"), vec!["Dune", "Emma"]);
        assert_eq!(search_names(&store, &catalog, "\"^emma$\""), vec!["Emma"]);
        assert_eq!(search_names(&store, &catalog, "*"), vec!["Dune", "Emma", "Hyperion", "Untitled"]);

        let predicate = Predicate::match_all();
        let page = store
            .search(&catalog, &predicate, &SearchOptions::default())
            .unwrap();
        let hyperion = page.items.iter().find(|e| e.name == "Hyperion").unwrap();
        assert_eq!(search_names(&store, &catalog, &hyperion.uuid), vec!["Hyperion"]);
    }

    #[test]
    fn test_paging_and_sorting() {
        let (store, catalog) = seeded();
        let all = Predicate::match_all();

        let options = SearchOptions::default().sort("price", SortOrder::Desc);
        let names: Vec<String> = store
            .search(&catalog, &all, &options)
            .unwrap()
            .items
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Hyperion", "Dune", "Emma", "Untitled"]);

        let options = options.page(2, 1);
        let page = store.search(&catalog, &all, &options).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.offset, 1);
        let names: Vec<&str> = page.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Dune", "Emma"]);

        let options = SearchOptions::default().sort("pages", SortOrder::Asc);
        let page = store.search(&catalog, &all, &options).unwrap();
        assert_eq!(page.items[0].name, "Dune");
        assert_eq!(page.items[3].name, "Untitled");

        let err = store
            .search(&catalog, &all, &SearchOptions::default().sort("colour", SortOrder::Asc))
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownSortField(_)));
    }

    #[test]
    fn test_entity_attributes() {
        let (store, catalog) = seeded();
        let predicate = QueryEngine::new(Arc::clone(&catalog))
            .compile_str("name=dune")
            .unwrap();
        let page = store
            .search(&catalog, &predicate, &SearchOptions::default())
            .unwrap();
        let dune = &page.items[0];

        assert_eq!(dune.attributes["author"], json!("Frank Herbert"));
        assert_eq!(dune.attributes["price"], json!(9.99));
        assert_eq!(dune.attributes["in_stock"], json!(true));
        assert_eq!(dune.metadata["pages"], json!(412));
        assert!(dune.last_edited_at.is_none());
        assert!(uuid::Uuid::parse_str(&dune.uuid).is_ok());
    }

    #[test]
    fn test_rejected_import_is_rolled_back() {
        let store = CatalogStore::open_in_memory(book_config()).unwrap();
        let records = vec![
            NewEntity::new("Dune"),
            NewEntity::new("Emma").attr("colour", "red"),
        ];
        let err = store.import_records(&records).unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord(_)));
        assert_eq!(store.count().unwrap(), 0);

        let err = store
            .import_records(&[NewEntity::new("Emma").attr("price", "cheap")])
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord(_)));
    }

    #[test]
    fn test_invalid_layout() {
        let err = CatalogStore::open_in_memory(StoreConfig::new().relation("bad name")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidLayout(_)));

        let err = CatalogStore::open_in_memory(StoreConfig::new().column("name", ColumnKind::Text))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidLayout(_)));
    }

    #[test]
    fn test_flatten_metadata_skips_locks() {
        let text = flatten_metadata(&json!({
            "status": "draft",
            "pages": 12,
            "tags": ["a", "b"],
            "__name__lock__": "secret",
            "nested": {"flag": true, "none": null}
        }));
        assert!(text.contains("draft"));
        assert!(text.contains("12"));
        assert!(text.contains("a b"));
        assert!(text.contains("true"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_reopen_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.db");

        {
            let store = CatalogStore::open(&path, book_config()).unwrap();
            store.import_records(&books()).unwrap();
        }

        let store = CatalogStore::open(&path, book_config()).unwrap();
        assert_eq!(store.count().unwrap(), 4);
        assert_eq!(store.path(), Some(path.as_path()));
        let catalog = store.discover_catalog().unwrap();
        assert!(catalog.get("genre").is_some());
    }

    #[tokio::test]
    async fn test_value_sampler() {
        let (store, catalog) = seeded();

        let genre = lookup_known_field(&catalog, "genre").unwrap();
        let values = store.sample(&genre, "sci", 20).await.unwrap();
        assert_eq!(values, vec!["Science Fiction"]);

        let status = lookup_known_field(&catalog, "status").unwrap();
        let values = store.sample(&status, "", 20).await.unwrap();
        assert_eq!(values, vec!["draft", "published"]);

        let author = lookup_known_field(&catalog, "author").unwrap();
        let values = store.sample(&author, "", 2).await.unwrap();
        assert_eq!(values, vec!["Dan Simmons", "Frank Herbert"]);

        let price = lookup_known_field(&catalog, "price").unwrap();
        let values = store.sample(&price, "1", 20).await.unwrap();
        assert_eq!(values, vec!["12.5"]);
    }

    #[tokio::test]
    async fn test_metadata_values_skip_json_containers() {
        let (store, catalog) = seeded();

        let tags = lookup_known_field(&catalog, "tags").unwrap();
        let values = store.sample(&tags, "", 20).await.unwrap();
        assert_eq!(values, vec!["classic", "space"]);
        assert_eq!(store.sample(&tags, "sp", 20).await.unwrap(), vec!["space"]);

        let edition = lookup_known_field(&catalog, "edition").unwrap();
        assert!(store.sample(&edition, "", 20).await.unwrap().is_empty());

        let year = lookup_known_field(&catalog, "edition.year").unwrap();
        assert_eq!(store.sample(&year, "", 20).await.unwrap(), vec!["1965"]);

        let pages = lookup_known_field(&catalog, "pages").unwrap();
        assert_eq!(
            store.sample(&pages, "4", 20).await.unwrap(),
            vec!["412", "474", "482"]
        );

        let signed = lookup_known_field(&catalog, "signed").unwrap();
        assert_eq!(store.sample(&signed, "", 20).await.unwrap(), vec!["true"]);
    }
}
