//! Pipeline stage enumeration
//!
//! The stage set is fixed. Transitions between any two stages are permitted
//! (corrective backward moves are a deliberate workflow), but the direction
//! of each move is classified so the audit trail distinguishes ordinary
//! forward progress from corrections and reopened deals.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fundraising pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Stage {
    InitialContact,
    IntroSent,
    FollowUpSent,
    ProposalSent,
    MeetingScheduled,
    Negotiation,
    ClosedWon,
    ClosedLost,
    ThankYouSent,
}

/// All stages in canonical pipeline order
pub const ALL_STAGES: [Stage; 9] = [
    Stage::InitialContact,
    Stage::IntroSent,
    Stage::FollowUpSent,
    Stage::ProposalSent,
    Stage::MeetingScheduled,
    Stage::Negotiation,
    Stage::ClosedWon,
    Stage::ClosedLost,
    Stage::ThankYouSent,
];

/// Direction of a stage transition, recorded in the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Ordinary forward move through the pipeline
    Forward,
    /// Backward move (correction workflow)
    Backward,
    /// Leaving a closed stage
    Reopen,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Forward => "forward",
            TransitionKind::Backward => "backward",
            TransitionKind::Reopen => "reopen",
        }
    }
}

impl Stage {
    /// Display name, as stored in the database and shown to users
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::InitialContact => "Initial Contact",
            Stage::IntroSent => "Intro Sent",
            Stage::FollowUpSent => "Follow-up Sent",
            Stage::ProposalSent => "Proposal Sent",
            Stage::MeetingScheduled => "Meeting Scheduled",
            Stage::Negotiation => "Negotiation",
            Stage::ClosedWon => "Closed Won",
            Stage::ClosedLost => "Closed Lost",
            Stage::ThankYouSent => "Thank You Sent",
        }
    }

    /// Parse a stage name (case-insensitive, whitespace-tolerant)
    pub fn parse(value: &str) -> Result<Stage> {
        let normalized = value.trim().to_lowercase();
        for stage in ALL_STAGES {
            if stage.as_str().to_lowercase() == normalized {
                return Ok(stage);
            }
        }
        Err(Error::InvalidStage(value.trim().to_string()))
    }

    /// Position in the canonical pipeline order
    pub fn ordinal(&self) -> usize {
        ALL_STAGES.iter().position(|s| s == self).unwrap_or(0)
    }

    /// True for end-of-pipeline stages
    pub fn is_closed(&self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }

    /// Classify the direction of a transition from `self` to `to`
    pub fn transition_kind(&self, to: Stage) -> TransitionKind {
        if self.is_closed() && to != Stage::ThankYouSent {
            TransitionKind::Reopen
        } else if to.ordinal() >= self.ordinal() {
            TransitionKind::Forward
        } else {
            TransitionKind::Backward
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Stage {
    type Error = Error;

    fn try_from(value: String) -> Result<Stage> {
        Stage::parse(&value)
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> String {
        stage.as_str().to_string()
    }
}
