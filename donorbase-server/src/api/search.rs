//! Organization search endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::engine::SearchHit;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<SearchHit>,
}

/// GET /api/search?q=
///
/// Relevance-ordered candidates: exact, then prefix, then substring.
pub async fn search_organizations(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing required parameter: q".to_string()));
    }

    let results = state.engine.search_organizations(&query.q).await?;
    Ok(Json(SearchResponse {
        query: query.q,
        total_results: results.len(),
        results,
    }))
}
