//! donorbase-server library
//!
//! Fundraising pipeline service: the pipeline engine and its persistence
//! adapters, plus the HTTP dashboard API and the command surface both
//! front-ends share. All mutations from every front-end funnel through the
//! one engine, so validation and concurrency rules cannot diverge.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod activity;
pub mod api;
pub mod commands;
pub mod drafts;
pub mod engine;
pub mod store;

use engine::PipelineEngine;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// The single mutation authority
    pub engine: PipelineEngine,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        let engine = PipelineEngine::new(db.clone());
        Self { db, engine }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/pipeline", get(api::get_pipeline))
        .route("/api/stages", get(api::list_stages))
        .route("/api/donors", get(api::list_donors).post(api::add_donor))
        .route("/api/donors/:org", get(api::get_donor))
        .route("/api/donors/:org/stage", post(api::update_stage))
        .route("/api/donors/:org/assign", post(api::assign_owner))
        .route("/api/donors/:org/next-action", post(api::set_next_action))
        .route("/api/donors/:org/notes", post(api::update_notes))
        .route("/api/search", get(api::search_organizations))
        .route("/api/activities", get(api::recent_activity))
        .route("/api/activities/:org", get(api::organization_activity))
        .route("/api/command", post(api::run_command))
        .route("/api/templates", get(api::list_templates))
        .route("/api/draft", post(api::generate_draft));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
