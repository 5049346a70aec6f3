//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::catalog::{FieldOrigin, ValueKind};
use crate::query::Predicate;
use crate::storage::SortOrder;
use crate::suggest::Suggestion;

// ============================================
// SEARCH DTOs
// ============================================

/// Query string of `GET /api/v1/query`
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Search query; empty matches everything
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    /// Catalog field to order by
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    /// "json" (default) or "csv"
    #[serde(default)]
    pub format: Option<String>,
}

/// Compile request
#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub q: String,
}

/// Compile response
#[derive(Debug, Serialize)]
pub struct CompileResponse {
    pub query: String,
    pub predicate: Predicate,
    /// Pipeline time in microseconds
    pub elapsed_us: u64,
}

// ============================================
// SUGGEST DTOs
// ============================================

/// Autocomplete request
#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    /// Partial query text
    pub q: String,
    /// Cursor byte offset; end of text when absent
    #[serde(default)]
    pub cursor: Option<usize>,
    /// Client session; a new request cancels the previous one of the same session
    #[serde(default = "default_session")]
    pub session: String,
}

fn default_session() -> String {
    "default".to_string()
}

/// Autocomplete response
#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
    /// Value sampling failed or timed out
    pub degraded: bool,
    /// Superseded by a newer request of the same session
    pub cancelled: bool,
}

// ============================================
// CATALOG DTOs
// ============================================

/// Field summary
#[derive(Debug, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub kind: ValueKind,
    #[serde(flatten)]
    pub origin: FieldOrigin,
    pub searchable: bool,
    pub free_text: bool,
}

/// Field list response
#[derive(Debug, Serialize)]
pub struct FieldsResponse {
    pub fields: Vec<FieldInfo>,
    pub total: usize,
}

/// Catalog refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: String,
    pub fields: usize,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded, unhealthy
    pub status: String,
    /// Storage status
    pub storage: String,
    /// Catalog status: fields known, or empty
    pub catalog: String,
    /// Stored records
    pub records: u64,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
