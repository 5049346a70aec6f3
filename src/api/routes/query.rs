//! Query Routes
//!
//! - GET /api/v1/query - Search records with a query string
//! - POST /api/v1/query/compile - Compile a query without running it

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CompileRequest, CompileResponse, SearchParams};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::{page_to_csv, SearchOptions, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// GET /api/v1/query
///
/// Compile `q` against the current catalog and return one page of records.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Response> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let engine = state.engine().await;
    let predicate = engine.compile_str(&params.q)?;

    let mut options = SearchOptions::default().page(limit, params.offset.unwrap_or(0));
    if let Some(sort_by) = params.sort_by.clone() {
        options = options.sort(sort_by, params.sort_order.unwrap_or_default());
    }

    let store = state.store.clone();
    let catalog = Arc::clone(engine.catalog());
    let page = tokio::task::spawn_blocking(move || store.search(&catalog, &predicate, &options))
        .await
        .map_err(|e| ApiError::Internal(format!("Search task failed: {}", e)))??;

    match params.format.as_deref().map(str::to_lowercase).as_deref() {
        Some("csv") => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv")],
            page_to_csv(&page)?,
        )
            .into_response()),
        None | Some("json") => Ok(Json(page).into_response()),
        Some(other) => Err(ApiError::Validation(format!(
            "unsupported format '{}', expected json or csv",
            other
        ))),
    }
}

/// POST /api/v1/query/compile
///
/// Return the predicate a query compiles to.
pub async fn compile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompileRequest>,
) -> ApiResult<Json<CompileResponse>> {
    let compiled = state.engine().await.explain(&req.q)?;

    Ok(Json(CompileResponse {
        query: compiled.query,
        predicate: compiled.predicate,
        elapsed_us: compiled.elapsed_us,
    }))
}
