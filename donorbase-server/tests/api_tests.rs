//! Integration tests for the donorbase-server HTTP API
//!
//! Drives the full router in-process against a temporary SQLite database.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use donorbase_common::db::init_database;
use donorbase_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: fresh app over a temp database
async fn setup_app() -> (TempDir, axum::Router) {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("donorbase.db")).await.unwrap();
    let state = AppState::new(pool);
    (temp, build_router(state))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn seed_org(app: &axum::Router, name: &str) {
    let response = app
        .clone()
        .oneshot(post(
            "/api/donors",
            json!({ "organization_name": name, "actor": "seed@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "donorbase-server");
    assert!(body["version"].is_string());
}

// =============================================================================
// Donor CRUD
// =============================================================================

#[tokio::test]
async fn test_add_and_get_donor() {
    let (_temp, app) = setup_app().await;

    let response = app
        .clone()
        .oneshot(post(
            "/api/donors",
            json!({
                "organization_name": "Wipro Foundation",
                "contact_person": "Gautam Rao",
                "actor": "maya@example.org"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["organization_name"], "Wipro Foundation");
    assert_eq!(body["current_stage"], "Initial Contact");
    assert_eq!(body["previous_stage"], Value::Null);

    // Lookup by path, case-insensitive
    let response = app.oneshot(get("/api/donors/wipro%20foundation")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["organization_name"], "Wipro Foundation");
    assert_eq!(body["contact_person"], "Gautam Rao");
}

#[tokio::test]
async fn test_add_duplicate_conflict() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app
        .oneshot(post(
            "/api/donors",
            json!({ "organization_name": "wipro foundation", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_get_donor_not_found() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(get("/api/donors/Infosys")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_get_donor_ambiguous_lists_candidates() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Tata Trust").await;
    seed_org(&app, "Tata Steel Foundation").await;

    let response = app.oneshot(get("/api/donors/Tata")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "AMBIGUOUS_MATCH");
    let candidates = body["error"]["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 2);
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_stage_update_sets_previous_stage() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app
        .clone()
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/stage",
            json!({ "stage": "Intro Sent", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["record"]["current_stage"], "Intro Sent");
    assert_eq!(body["record"]["previous_stage"], "Initial Contact");
    assert!(body.get("warning").is_none());
}

#[tokio::test]
async fn test_stage_update_invalid_stage() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/stage",
            json!({ "stage": "Qualified Lead", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "INVALID_STAGE");
}

#[tokio::test]
async fn test_next_action_invalid_date() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/next-action",
            json!({ "action": "Send proposal", "date": "2025-13-45", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "INVALID_DATE");
}

#[tokio::test]
async fn test_assign_and_notes_round_trip() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app
        .clone()
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/assign",
            json!({ "owner": "maya@example.org", "actor": "web" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/notes",
            json!({ "notes": "intro call done", "actor": "web" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/donors/Wipro%20Foundation")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["assigned_to"], "maya@example.org");
    assert_eq!(body["notes"], "intro call done");
}

#[tokio::test]
async fn test_notes_append_mode() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    for note in ["first", "second"] {
        let response = app
            .clone()
            .oneshot(post(
                "/api/donors/Wipro%20Foundation/notes",
                json!({ "notes": note, "actor": "web", "append": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/api/donors/Wipro%20Foundation")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["notes"], "first\nsecond");
}

#[tokio::test]
async fn test_stale_token_same_field_conflict() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    // Fetch the record the way a dashboard would
    let response = app.clone().oneshot(get("/api/donors/Wipro%20Foundation")).await.unwrap();
    let fetched = extract_json(response.into_body()).await;
    let stale_token = fetched["last_updated"].as_str().unwrap().to_string();

    // Someone else writes notes in the meantime
    let response = app
        .clone()
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/notes",
            json!({ "notes": "chat note", "actor": "chat" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Saving a notes edit against the stale token must conflict
    let response = app
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/notes",
            json!({ "notes": "blind overwrite", "actor": "web", "token": stale_token }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "CONCURRENT_MODIFICATION");
}

// =============================================================================
// Pipeline views, search, activity
// =============================================================================

#[tokio::test]
async fn test_pipeline_grouped_by_stage() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;
    seed_org(&app, "Tata Trust").await;

    app.clone()
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/stage",
            json!({ "stage": "Proposal Sent", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();

    let response = app.oneshot(get("/api/pipeline")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["summary"]["total_organizations"], 2);

    let stages = body["stages"].as_array().unwrap();
    let initial = stages.iter().find(|s| s["stage"] == "Initial Contact").unwrap();
    assert_eq!(initial["organizations"].as_array().unwrap().len(), 1);
    let proposal = stages.iter().find(|s| s["stage"] == "Proposal Sent").unwrap();
    assert_eq!(proposal["organizations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_donors_filtered_by_stage() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;
    seed_org(&app, "Tata Trust").await;

    app.clone()
        .oneshot(post(
            "/api/donors/Tata%20Trust/stage",
            json!({ "stage": "Negotiation", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/donors?stage=Negotiation"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["organization_name"], "Tata Trust");

    // Unknown stage names are rejected, not silently empty
    let response = app.oneshot(get("/api/donors?stage=Daydreaming")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stages_endpoint_lists_canonical_order() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(get("/api/stages")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    let stages = body.as_array().unwrap();
    assert_eq!(stages.first().unwrap(), "Initial Contact");
    assert_eq!(stages.last().unwrap(), "Thank You Sent");
    assert_eq!(stages.len(), 9);
}

#[tokio::test]
async fn test_search_partial_match() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app.oneshot(get("/api/search?q=Wipro")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_results"], 1);
    assert_eq!(body["results"][0]["organization_name"], "Wipro Foundation");
    assert_eq!(body["results"][0]["match"], "prefix");
}

#[tokio::test]
async fn test_search_missing_query_param() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(get("/api/search?q=")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activity_history_in_call_order() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    app.clone()
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/stage",
            json!({ "stage": "Intro Sent", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(post(
            "/api/donors/Wipro%20Foundation/assign",
            json!({ "owner": "maya@example.org", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/activities/Wipro%20Foundation"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total"], 2);
    // Newest first
    assert_eq!(body["entries"][0]["action"], "assignment");
    assert_eq!(body["entries"][1]["action"], "stage-change");
    assert_eq!(body["entries"][1]["detail"], "forward");

    // Global recent view sees the same mutations
    let response = app.oneshot(get("/api/activities?limit=10")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total"], 2);
}

// =============================================================================
// Command surface
// =============================================================================

#[tokio::test]
async fn test_command_status_reply() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app
        .oneshot(post(
            "/api/command",
            json!({ "text": "status Wipro", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.contains("Wipro Foundation"));
    assert!(reply.contains("Initial Contact"));
}

#[tokio::test]
async fn test_command_stage_and_ambiguity_pick_list() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Tata Trust").await;
    seed_org(&app, "Tata Steel Foundation").await;

    let response = app
        .oneshot(post(
            "/api/command",
            json!({ "text": "stage Tata | Intro Sent", "actor": "maya@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.contains("which did you mean?"));
    assert!(reply.contains("1. "));
    assert!(reply.contains("Tata Trust"));
}

#[tokio::test]
async fn test_command_missing_actor_rejected() {
    let (_temp, app) = setup_app().await;

    let response = app
        .oneshot(post("/api/command", json!({ "text": "summary", "actor": " " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Drafts
// =============================================================================

#[tokio::test]
async fn test_draft_endpoint_renders_template() {
    let (_temp, app) = setup_app().await;

    app.clone()
        .oneshot(post(
            "/api/donors",
            json!({
                "organization_name": "Wipro Foundation",
                "contact_person": "Gautam Rao",
                "actor": "maya@example.org"
            }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(post(
            "/api/draft",
            json!({
                "organization": "Wipro Foundation",
                "template": "intro",
                "sender_name": "Maya",
                "sender_organization": "Diksha Foundation"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["template"], "intro");
    assert!(body["body"].as_str().unwrap().contains("Dear Gautam Rao"));
    assert!(body["subject"].as_str().unwrap().contains("Diksha Foundation"));
}

#[tokio::test]
async fn test_draft_unknown_template_rejected() {
    let (_temp, app) = setup_app().await;
    seed_org(&app, "Wipro Foundation").await;

    let response = app
        .oneshot(post(
            "/api/draft",
            json!({
                "organization": "Wipro Foundation",
                "template": "festival_greeting",
                "sender_name": "Maya",
                "sender_organization": "Diksha Foundation"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_templates_endpoint() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(get("/api/templates")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"intro"));
    assert!(names.contains(&"thank_you"));
}
