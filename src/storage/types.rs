//! Record store data types
//!
//! - `StoreConfig`: table layout and catalog discovery options
//! - `NewEntity` / `Entity`: records going in and coming out
//! - `SearchOptions` / `SearchPage`: paging and sorting of searches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::catalog::{UnknownFieldPolicy, ValueKind};

/// Default page size
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a single search returns
pub const MAX_PAGE_SIZE: usize = 1000;

/// Type of an extra system column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Boolean,
    Timestamp,
}

impl ColumnKind {
    /// Declared SQLite type; discovery maps it back with [`ColumnKind::from_declared`]
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Number => "REAL",
            ColumnKind::Boolean => "BOOLEAN",
            ColumnKind::Timestamp => "TIMESTAMP",
        }
    }

    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("BOOL") {
            ColumnKind::Boolean
        } else if declared.contains("TIME") || declared.contains("DATE") {
            ColumnKind::Timestamp
        } else if declared.contains("INT")
            || declared.contains("REAL")
            || declared.contains("FLOA")
            || declared.contains("DOUB")
            || declared.contains("NUM")
        {
            ColumnKind::Number
        } else {
            ColumnKind::Text
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            ColumnKind::Text => ValueKind::Text,
            ColumnKind::Number => ValueKind::Number,
            ColumnKind::Boolean => ValueKind::Boolean,
            ColumnKind::Timestamp => ValueKind::Timestamp,
        }
    }
}

/// Extra column of the record table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Record store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Navigation relations; each gets a `(id, name)` table and a
    /// `<relation>_id` column on the record table
    pub relations: Vec<String>,
    /// Extra system columns beyond the fixed ones
    pub columns: Vec<ColumnSpec>,
    /// System columns searched by field-less terms
    pub searchable: Vec<String>,
    /// Long text columns never offered for value autocomplete
    pub free_text: Vec<String>,
    /// Identifier column searched when a term looks like a UUID
    pub uuid_column: Option<String>,
    pub unknown_fields: UnknownFieldPolicy,
    /// Search the flattened text copy of all metadata values globally
    pub flattened_metadata: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            relations: Vec::new(),
            columns: Vec::new(),
            searchable: vec!["name".to_string(), "description".to_string()],
            free_text: vec!["name".to_string(), "description".to_string()],
            uuid_column: Some("uuid".to_string()),
            unknown_fields: UnknownFieldPolicy::Reject,
            flattened_metadata: true,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a navigation relation
    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.push(name.into());
        self
    }

    /// Builder method: add an extra column
    pub fn column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind,
        });
        self
    }

    /// Builder method: set the unknown-field policy of discovered catalogs
    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }
}

/// Record to import
///
/// Keys other than the fixed ones are navigation relations (value: the
/// related name) or extra columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEntity {
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl NewEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: None,
            name: name.into(),
            description: None,
            created_at: None,
            last_edited_at: None,
            metadata: serde_json::Map::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder method: set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method: set a metadata key
    pub fn meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builder method: set a relation name or extra column value
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder method: mark as edited
    pub fn edited_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_edited_at = Some(at);
        self
    }
}

/// Stored record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Entity {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    /// Relation names and extra column values
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("invalid sort order '{}', expected asc or desc", other)),
        }
    }
}

/// Paging and ordering of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
    /// Catalog field to order by; record id when absent
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            sort_by: None,
            sort_order: SortOrder::Asc,
        }
    }
}

impl SearchOptions {
    /// Builder method: order by a field
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    /// Builder method: set the page window
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// One page of search results
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    /// Matches across all pages
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub items: Vec<Entity>,
}
