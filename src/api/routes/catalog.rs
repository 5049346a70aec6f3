//! Catalog Routes
//!
//! - GET /api/v1/fields - List searchable fields
//! - POST /api/v1/catalog/refresh - Rediscover fields from the store

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::{FieldInfo, FieldsResponse, RefreshResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /api/v1/fields
pub async fn list_fields(State(state): State<Arc<AppState>>) -> Json<FieldsResponse> {
    let catalog = state.catalog().await;

    let fields: Vec<FieldInfo> = catalog
        .fields()
        .map(|def| FieldInfo {
            name: def.name.clone(),
            kind: def.kind,
            origin: def.origin.clone(),
            searchable: def.searchable,
            free_text: def.free_text,
        })
        .collect();

    let total = fields.len();
    Json(FieldsResponse { fields, total })
}

/// POST /api/v1/catalog/refresh
///
/// Picks up metadata keys and columns added since the last discovery.
pub async fn refresh(State(state): State<Arc<AppState>>) -> ApiResult<Json<RefreshResponse>> {
    let catalog = state.refresh_catalog().await?;

    Ok(Json(RefreshResponse {
        status: "ok".to_string(),
        fields: catalog.len(),
    }))
}
