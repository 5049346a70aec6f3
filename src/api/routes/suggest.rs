//! Suggest Routes
//!
//! - POST /api/v1/suggest - Autocomplete a partial query

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::{SuggestRequest, SuggestResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// POST /api/v1/suggest
///
/// A newer request from the same session cancels this one; the cancelled
/// caller gets an empty, `cancelled` response.
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SuggestRequest>,
) -> ApiResult<Json<SuggestResponse>> {
    let cursor = req.cursor.unwrap_or(req.q.len()).min(req.q.len());
    let catalog = state.catalog().await;
    let session = state.session(&req.session).await;

    let response = match session.suggest(&req.q, cursor, &catalog, &state.store).await {
        Some(outcome) => SuggestResponse {
            suggestions: outcome.suggestions,
            degraded: outcome.degraded,
            cancelled: false,
        },
        None => SuggestResponse {
            suggestions: Vec::new(),
            degraded: false,
            cancelled: true,
        },
    };

    Ok(Json(response))
}
