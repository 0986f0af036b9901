//! Donor record endpoints: list, detail, creation, and the four mutations
//!
//! Mutating endpoints accept an optional `token` - the `last_updated` value
//! the client fetched. When present, the engine checks the edit against the
//! state the user actually saw, merging only disjoint-field changes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use donorbase_common::db::DonorRecord;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::engine::{MutationOutcome, NewOrganization};
use crate::AppState;

/// Successful mutation response: the updated record, plus a warning when
/// the audit entry could not be written (the mutation itself stands).
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub record: DonorRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<MutationOutcome> for MutationResponse {
    fn from(outcome: MutationOutcome) -> Self {
        let warning = outcome.audit.warning();
        Self {
            record: outcome.record,
            warning,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Restrict the listing to one stage
    pub stage: Option<String>,
}

/// GET /api/donors?stage=
pub async fn list_donors(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DonorRecord>>> {
    let records = match query.stage {
        Some(stage) => state.engine.list_by_stage(&stage).await?,
        None => state.engine.list_all().await?,
    };
    Ok(Json(records))
}

/// GET /api/donors/:org
///
/// Resolves the path segment like any other query: exact match first,
/// 404 on no match, 409 with candidates on an ambiguous one.
pub async fn get_donor(
    State(state): State<AppState>,
    Path(org): Path<String>,
) -> ApiResult<Json<DonorRecord>> {
    Ok(Json(state.engine.get_status(&org).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddDonorRequest {
    pub organization_name: String,
    pub stage: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_role: Option<String>,
    pub sector_tags: Option<String>,
    pub geography: Option<String>,
    pub probability: Option<i64>,
    pub actor: String,
}

/// POST /api/donors
pub async fn add_donor(
    State(state): State<AppState>,
    Json(req): Json<AddDonorRequest>,
) -> ApiResult<Json<DonorRecord>> {
    let new = NewOrganization {
        name: req.organization_name,
        stage: req.stage,
        contact_person: req.contact_person,
        contact_email: req.contact_email,
        contact_role: req.contact_role,
        sector_tags: req.sector_tags,
        geography: req.geography,
        probability: req.probability,
    };
    let record = state.engine.add_organization(new, &req.actor).await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub stage: String,
    pub actor: String,
    pub token: Option<String>,
}

/// POST /api/donors/:org/stage
pub async fn update_stage(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Json(req): Json<StageRequest>,
) -> ApiResult<Json<MutationResponse>> {
    let outcome = state
        .engine
        .transition_stage(&org, &req.stage, &req.actor, req.token.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub owner: String,
    pub actor: String,
    pub token: Option<String>,
}

/// POST /api/donors/:org/assign
pub async fn assign_owner(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Json<MutationResponse>> {
    let outcome = state
        .engine
        .assign_owner(&org, &req.owner, &req.actor, req.token.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct NextActionRequest {
    pub action: String,
    pub date: String,
    pub actor: String,
    pub token: Option<String>,
}

/// POST /api/donors/:org/next-action
pub async fn set_next_action(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Json(req): Json<NextActionRequest>,
) -> ApiResult<Json<MutationResponse>> {
    let outcome = state
        .engine
        .set_next_action(&org, &req.action, &req.date, &req.actor, req.token.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
    pub actor: String,
    pub token: Option<String>,
    /// Append to the existing notes instead of replacing them
    #[serde(default)]
    pub append: bool,
}

/// POST /api/donors/:org/notes
///
/// The engine replaces; append is implemented here by read-then-concatenate,
/// with the read's token passed down so a racing note writer is detected.
pub async fn update_notes(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Json(req): Json<NotesRequest>,
) -> ApiResult<Json<MutationResponse>> {
    let outcome = if req.append {
        let current = state.engine.find_organization(&org).await?;
        let combined = match &current.notes {
            Some(existing) => format!("{}\n{}", existing, req.notes),
            None => req.notes.clone(),
        };
        state
            .engine
            .update_notes(
                &current.organization_name,
                &combined,
                &req.actor,
                Some(current.last_updated.as_str()),
            )
            .await?
    } else {
        state
            .engine
            .update_notes(&org, &req.notes, &req.actor, req.token.as_deref())
            .await?
    };
    Ok(Json(outcome.into()))
}
