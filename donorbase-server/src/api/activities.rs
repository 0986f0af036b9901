//! Activity log endpoints (read-only; the log has no mutation surface)

use axum::{
    extract::{Path, Query, State},
    Json,
};
use donorbase_common::db::ActivityRecord;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub total: usize,
    pub entries: Vec<ActivityRecord>,
}

/// GET /api/activities?limit=
///
/// Most recent audit entries across all records, newest first.
pub async fn recent_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<ActivityResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = state.engine.recent_activity(limit).await?;
    Ok(Json(ActivityResponse {
        total: entries.len(),
        entries,
    }))
}

/// GET /api/activities/:org
///
/// One organization's full history, newest first. The path segment goes
/// through the same resolver as every other lookup.
pub async fn organization_activity(
    State(state): State<AppState>,
    Path(org): Path<String>,
) -> ApiResult<Json<ActivityResponse>> {
    let entries = state.engine.organization_activity(&org).await?;
    Ok(Json(ActivityResponse {
        total: entries.len(),
        entries,
    }))
}
