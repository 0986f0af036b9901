//! HTTP API handlers for donorbase-server

pub mod activities;
pub mod command;
pub mod donors;
pub mod draft;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod search;

pub use activities::{organization_activity, recent_activity};
pub use command::run_command;
pub use donors::{add_donor, assign_owner, get_donor, list_donors, set_next_action, update_notes, update_stage};
pub use draft::{generate_draft, list_templates};
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use pipeline::{get_pipeline, list_stages};
pub use search::search_organizations;
