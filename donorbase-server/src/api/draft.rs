//! Email draft endpoint

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::drafts::{self, Draft, DraftContext};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub organization: String,
    pub template: String,
    pub sender_name: String,
    pub sender_organization: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// GET /api/templates
pub async fn list_templates() -> Json<Vec<TemplateInfo>> {
    Json(
        drafts::list_templates()
            .iter()
            .map(|t| TemplateInfo {
                name: t.name,
                description: t.description,
            })
            .collect(),
    )
}

/// POST /api/draft
///
/// Resolves the organization and renders the named template. Read-only with
/// respect to the record store.
pub async fn generate_draft(
    State(state): State<AppState>,
    Json(req): Json<DraftRequest>,
) -> ApiResult<Json<Draft>> {
    let record = state.engine.find_organization(&req.organization).await?;
    let context = DraftContext {
        sender_name: req.sender_name,
        sender_organization: req.sender_organization,
    };
    let draft = drafts::render(&req.template, &record, &context)?;
    Ok(Json(draft))
}
