//! Database models

use crate::stage::Stage;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One tracked organization's fundraising pipeline state.
///
/// `organization_name` is the unique lookup key (case-insensitive);
/// `last_updated` is the optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorRecord {
    pub guid: String,
    pub organization_name: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_role: Option<String>,
    pub current_stage: Stage,
    pub previous_stage: Option<Stage>,
    pub assigned_to: Option<String>,
    pub next_action: Option<String>,
    pub next_action_date: Option<NaiveDate>,
    pub last_contact_date: Option<NaiveDate>,
    pub sector_tags: Option<String>,
    pub geography: Option<String>,
    pub notes: Option<String>,
    pub probability: Option<i64>,
    pub created_at: String,
    pub last_updated: String,
}

/// Mutation kind recorded in the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActivityKind {
    StageChange,
    Assignment,
    NoteUpdate,
    NextActionUpdate,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::StageChange => "stage-change",
            ActivityKind::Assignment => "assignment",
            ActivityKind::NoteUpdate => "note-update",
            ActivityKind::NextActionUpdate => "next-action-update",
        }
    }

    pub fn parse(value: &str) -> crate::Result<ActivityKind> {
        match value {
            "stage-change" => Ok(ActivityKind::StageChange),
            "assignment" => Ok(ActivityKind::Assignment),
            "note-update" => Ok(ActivityKind::NoteUpdate),
            "next-action-update" => Ok(ActivityKind::NextActionUpdate),
            other => Err(crate::Error::Internal(format!(
                "Unknown activity kind in database: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ActivityKind {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<ActivityKind> {
        ActivityKind::parse(&value)
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> String {
        kind.as_str().to_string()
    }
}

/// Immutable audit entry for one mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Auto-incrementing identifier; breaks timestamp ties in arrival order
    pub id: i64,
    /// Donor record guid
    pub record_key: String,
    /// Organization name at the time of the mutation
    pub organization_name: String,
    /// Who or what issued the mutation
    pub actor: String,
    pub action: ActivityKind,
    /// Field the mutation touched
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
    /// Extra classification, e.g. transition direction
    pub detail: Option<String>,
    pub timestamp: String,
}
