//! Command surface endpoint
//!
//! The chat front-end forwards already-verified command text here; this
//! endpoint parses, dispatches to the engine, and returns the plain-text
//! reply. Platform signature verification happens before the request
//! reaches this service.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::commands;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
    pub actor: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub reply: String,
}

/// POST /api/command
pub async fn run_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> ApiResult<Json<CommandResponse>> {
    if req.actor.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing required field: actor".to_string()));
    }

    let reply = commands::dispatch(&state.engine, &req.text, &req.actor).await;
    Ok(Json(CommandResponse { reply }))
}
