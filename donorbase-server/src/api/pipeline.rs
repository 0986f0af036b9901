//! Pipeline overview endpoints

use axum::{extract::State, Json};
use donorbase_common::db::DonorRecord;
use donorbase_common::stage::ALL_STAGES;
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::engine::PipelineSummary;
use crate::AppState;

/// One stage's records in the grouped pipeline view
#[derive(Debug, Serialize)]
pub struct StageGroup {
    pub stage: String,
    pub organizations: Vec<DonorRecord>,
}

/// GET /api/pipeline response
#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    pub summary: PipelineSummary,
    pub stages: Vec<StageGroup>,
}

/// GET /api/pipeline
///
/// All records grouped by stage in canonical order, with the summary on top.
pub async fn get_pipeline(State(state): State<AppState>) -> ApiResult<Json<PipelineResponse>> {
    let summary = state.engine.pipeline_summary().await?;
    let records = state.engine.list_all().await?;

    let stages = ALL_STAGES
        .iter()
        .map(|&stage| StageGroup {
            stage: stage.as_str().to_string(),
            organizations: records
                .iter()
                .filter(|r| r.current_stage == stage)
                .cloned()
                .collect(),
        })
        .collect();

    Ok(Json(PipelineResponse { summary, stages }))
}

/// GET /api/stages
///
/// The fixed stage set in canonical order.
pub async fn list_stages() -> Json<Vec<&'static str>> {
    Json(ALL_STAGES.iter().map(|s| s.as_str()).collect())
}
