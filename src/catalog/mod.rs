//! Schema Catalog
//!
//! Immutable snapshot of the searchable fields of the record store. The
//! catalog is built once (usually by [`crate::storage::CatalogStore::discover_catalog`])
//! and shared behind an `Arc`; a refresh builds a new snapshot instead of
//! mutating the old one.
//!
//! Three kinds of field exist:
//!
//! - **system** fields are plain columns of the record table
//! - **navigation** fields follow a foreign key to a `(id, name)` table and are
//!   exposed without their `_id` suffix (`publisher_id` becomes `publisher`)
//! - **metadata** fields are keys inside the JSON metadata document
//!
//! # Example
//!
//! ```rust
//! use metasift::catalog::{FieldDef, SchemaCatalog, ValueKind};
//!
//! let catalog = SchemaCatalog::builder()
//!     .field(FieldDef::system("name", ValueKind::Text).searchable().free_text())
//!     .field(FieldDef::system("price", ValueKind::Number))
//!     .field(FieldDef::navigation("genre"))
//!     .field(FieldDef::metadata(&["status"], ValueKind::Text))
//!     .build();
//!
//! assert_eq!(catalog.len(), 4);
//! assert!(catalog.get("genre").is_some());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::query::Operator;

const TEXT_OPERATORS: &[Operator] = &[
    Operator::Contains,
    Operator::NotContains,
    Operator::Equals,
    Operator::NotEquals,
    Operator::Matches,
    Operator::NotMatches,
    Operator::Fuzzy,
    Operator::Exists,
    Operator::NotExists,
];

const ORDERED_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::Exists,
    Operator::NotExists,
];

const BOOLEAN_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Exists,
    Operator::NotExists,
];

const JSON_SCALAR_OPERATORS: &[Operator] = &[
    Operator::Contains,
    Operator::NotContains,
    Operator::Equals,
    Operator::NotEquals,
    Operator::Matches,
    Operator::NotMatches,
    Operator::Fuzzy,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::Exists,
    Operator::NotExists,
];

/// Type of the values a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Number,
    Boolean,
    Timestamp,
    /// JSON metadata whose type is mixed or unknown
    JsonScalar,
}

impl ValueKind {
    /// Operators valid for this kind, in suggestion order
    pub fn operators(&self) -> &'static [Operator] {
        match self {
            ValueKind::Text => TEXT_OPERATORS,
            ValueKind::Number | ValueKind::Timestamp => ORDERED_OPERATORS,
            ValueKind::Boolean => BOOLEAN_OPERATORS,
            ValueKind::JsonScalar => JSON_SCALAR_OPERATORS,
        }
    }

    pub fn supports(&self, op: Operator) -> bool {
        self.operators().contains(&op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Timestamp => "timestamp",
            ValueKind::JsonScalar => "json",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a field's value lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum FieldOrigin {
    System { column: String },
    Navigation { relation: String, column: String },
    Metadata { path: Vec<String> },
}

/// What to do with a field name the catalog does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Reject with `invalid_field`
    #[default]
    Reject,
    /// Treat as a metadata key of unknown type
    MetadataProbe,
}

/// One searchable field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: ValueKind,
    #[serde(flatten)]
    pub origin: FieldOrigin,
    /// Free text (names, descriptions): no value sampling for autocomplete
    #[serde(default)]
    pub free_text: bool,
    /// Included in field-less global searches
    #[serde(default)]
    pub searchable: bool,
}

impl FieldDef {
    /// Column of the record table
    pub fn system(column: &str, kind: ValueKind) -> Self {
        Self {
            name: column.to_string(),
            kind,
            origin: FieldOrigin::System {
                column: column.to_string(),
            },
            free_text: false,
            searchable: false,
        }
    }

    /// Foreign-key relation displayed by its `name` column
    pub fn navigation(relation: &str) -> Self {
        Self {
            name: relation.to_string(),
            kind: ValueKind::Text,
            origin: FieldOrigin::Navigation {
                relation: relation.to_string(),
                column: "name".to_string(),
            },
            free_text: false,
            searchable: true,
        }
    }

    /// JSON metadata key; nested paths are joined with dots in the field name
    pub fn metadata(path: &[&str], kind: ValueKind) -> Self {
        Self {
            name: path.join("."),
            kind,
            origin: FieldOrigin::Metadata {
                path: path.iter().map(|s| s.to_string()).collect(),
            },
            free_text: false,
            searchable: kind == ValueKind::Text,
        }
    }

    /// Include in global searches
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Skip value sampling
    pub fn free_text(mut self) -> Self {
        self.free_text = true;
        self
    }

    /// Expose under a different name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_metadata(&self) -> bool {
        matches!(self.origin, FieldOrigin::Metadata { .. })
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self.origin, FieldOrigin::Navigation { .. })
    }
}

/// Immutable field catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaCatalog {
    fields: BTreeMap<String, FieldDef>,
    unknown_fields: UnknownFieldPolicy,
    uuid_column: Option<String>,
    flattened_metadata: bool,
}

impl SchemaCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Field by exact name
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Metadata field registered for `path`, whatever its exposed name
    pub fn metadata_field(&self, path: &[String]) -> Option<&FieldDef> {
        self.fields.values().find(|def| match &def.origin {
            FieldOrigin::Metadata { path: p } => p == path,
            _ => false,
        })
    }

    /// All fields, sorted by name
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    /// Field names, sorted
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn unknown_fields(&self) -> UnknownFieldPolicy {
        self.unknown_fields
    }

    /// Identifier column searched when a global term looks like a UUID
    pub fn uuid_column(&self) -> Option<&str> {
        self.uuid_column.as_deref()
    }

    /// Whether the store keeps a flattened text copy of all metadata values
    pub fn has_flattened_metadata(&self) -> bool {
        self.flattened_metadata
    }

    /// Copy of this catalog with a different unknown-field policy
    pub fn with_unknown_fields(&self, policy: UnknownFieldPolicy) -> Self {
        let mut catalog = self.clone();
        catalog.unknown_fields = policy;
        catalog
    }
}

/// Builder for [`SchemaCatalog`]
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    fields: BTreeMap<String, FieldDef>,
    unknown_fields: UnknownFieldPolicy,
    uuid_column: Option<String>,
    flattened_metadata: bool,
}

impl CatalogBuilder {
    /// Add a field. The first definition of a name wins, so system columns
    /// registered before metadata keys keep their name.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.entry(def.name.clone()).or_insert(def);
        self
    }

    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    pub fn uuid_column(mut self, column: impl Into<String>) -> Self {
        self.uuid_column = Some(column.into());
        self
    }

    pub fn flattened_metadata(mut self, enabled: bool) -> Self {
        self.flattened_metadata = enabled;
        self
    }

    pub fn build(self) -> SchemaCatalog {
        SchemaCatalog {
            fields: self.fields,
            unknown_fields: self.unknown_fields,
            uuid_column: self.uuid_column,
            flattened_metadata: self.flattened_metadata,
        }
    }
}

/// Book catalog used across unit tests
#[cfg(test)]
pub(crate) fn sample_catalog() -> SchemaCatalog {
    SchemaCatalog::builder()
        .field(FieldDef::system("name", ValueKind::Text).searchable().free_text())
        .field(FieldDef::system("description", ValueKind::Text).free_text())
        .field(FieldDef::system("price", ValueKind::Number))
        .field(FieldDef::system("in_stock", ValueKind::Boolean))
        .field(FieldDef::system("last_edited_at", ValueKind::Timestamp))
        .field(FieldDef::system("uuid", ValueKind::Text))
        .field(FieldDef::navigation("author"))
        .field(FieldDef::navigation("genre"))
        .field(FieldDef::navigation("publisher"))
        .field(FieldDef::metadata(&["status"], ValueKind::Text))
        .field(FieldDef::metadata(&["pages"], ValueKind::Number))
        .field(FieldDef::metadata(&["signed"], ValueKind::Boolean))
        .field(FieldDef::metadata(&["edition", "year"], ValueKind::JsonScalar))
        .uuid_column("uuid")
        .flattened_metadata(true)
        .build()
}
