//! Pipeline Engine
//!
//! Sole authority for mutating donor records. Every front-end (command
//! surface, dashboard API) goes through the operations here, so validation
//! and concurrency rules exist exactly once. Each mutation is optimistic:
//! read a snapshot, build the field set, compare-and-set on the
//! `last_updated` token, and on a token mismatch merge only when the
//! concurrent changes touch disjoint fields.

pub mod matching;

use crate::activity::{ActivityLog, NewActivity};
use crate::store::{CasOutcome, DonorField, FieldChange, RecordStore, DIFFABLE_FIELDS};
use chrono::NaiveDate;
use donorbase_common::db::{get_setting, ActivityKind, ActivityRecord, DonorRecord};
use donorbase_common::stage::ALL_STAGES;
use donorbase_common::{time, Error, Result, Stage};
use matching::MatchRank;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{error, info};
use uuid::Uuid;

/// Bounded merge retries before giving up on a contended record
const MERGE_RETRIES: usize = 3;

/// How many active prospects a pipeline summary lists
const SUMMARY_PROSPECT_LIMIT: usize = 6;

/// A search result with its relevance rank
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(rename = "match")]
    pub rank: MatchRank,
    #[serde(flatten)]
    pub record: DonorRecord,
}

/// Whether the audit entry for a committed mutation was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    Logged,
    /// The donor write committed but the activity append failed; the
    /// mutation stands and the caller gets a warning instead of a rollback.
    PartialCommit { reason: String },
}

impl AuditStatus {
    pub fn warning(&self) -> Option<String> {
        match self {
            AuditStatus::Logged => None,
            AuditStatus::PartialCommit { reason } => Some(format!(
                "Change saved, but the audit entry could not be written: {}",
                reason
            )),
        }
    }
}

/// Result of a successful mutation
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub record: DonorRecord,
    pub audit: AuditStatus,
}

/// Input for the explicit add-organization operation
#[derive(Debug, Clone, Default)]
pub struct NewOrganization {
    pub name: String,
    /// Stage name; defaults to Initial Contact
    pub stage: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_role: Option<String>,
    pub sector_tags: Option<String>,
    pub geography: Option<String>,
    pub probability: Option<i64>,
}

/// Per-stage record count
#[derive(Debug, Clone, Serialize)]
pub struct StageCount {
    pub stage: Stage,
    pub count: usize,
}

/// Short summary of one active prospect
#[derive(Debug, Clone, Serialize)]
pub struct Prospect {
    pub organization_name: String,
    pub stage: Stage,
    pub assigned_to: Option<String>,
}

/// Whole-pipeline overview for dashboards and chat summaries
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub total_organizations: usize,
    pub stage_breakdown: Vec<StageCount>,
    pub active_prospects: Vec<Prospect>,
}

/// The single mutation authority over the donor record collection
#[derive(Clone)]
pub struct PipelineEngine {
    store: RecordStore,
    log: ActivityLog,
    db: SqlitePool,
}

impl PipelineEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            store: RecordStore::new(db.clone()),
            log: ActivityLog::new(db.clone()),
            db,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Resolve a query to exactly one record.
    ///
    /// Exact case-insensitive match wins outright; otherwise prefix and
    /// substring candidates are considered. Zero candidates is `NotFound`,
    /// more than one is `AmbiguousMatch` with the candidate list - never a
    /// guess.
    pub async fn find_organization(&self, query: &str) -> Result<DonorRecord> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Empty organization query".to_string()));
        }

        if let Some(record) = self.store.get_by_name(query).await? {
            return Ok(record);
        }

        let records = self.store.list().await?;
        let candidates = matching::find_candidates(query, &records);
        match candidates.len() {
            0 => Err(Error::NotFound(query.to_string())),
            1 => Ok(candidates[0].1.clone()),
            _ => Err(Error::AmbiguousMatch {
                query: query.to_string(),
                candidates: candidates
                    .iter()
                    .map(|(_, r)| r.organization_name.clone())
                    .collect(),
            }),
        }
    }

    /// Current snapshot of one record; read-only
    pub async fn get_status(&self, query: &str) -> Result<DonorRecord> {
        self.find_organization(query).await
    }

    /// All matching records in relevance order
    pub async fn search_organizations(&self, query: &str) -> Result<Vec<SearchHit>> {
        let records = self.store.list().await?;
        Ok(matching::find_candidates(query, &records)
            .into_iter()
            .map(|(rank, record)| SearchHit {
                rank,
                record: record.clone(),
            })
            .collect())
    }

    /// Every record, ordered by organization name
    pub async fn list_all(&self) -> Result<Vec<DonorRecord>> {
        self.store.list().await
    }

    /// Records currently in one stage
    pub async fn list_by_stage(&self, stage: &str) -> Result<Vec<DonorRecord>> {
        let stage = Stage::parse(stage)?;
        let records = self.store.list().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.current_stage == stage)
            .collect())
    }

    /// Stage breakdown and active prospects across the whole pipeline
    pub async fn pipeline_summary(&self) -> Result<PipelineSummary> {
        let records = self.store.list().await?;

        let stage_breakdown = ALL_STAGES
            .iter()
            .map(|&stage| StageCount {
                stage,
                count: records.iter().filter(|r| r.current_stage == stage).count(),
            })
            .collect();

        let active_prospects = records
            .iter()
            .filter(|r| !r.current_stage.is_closed() && r.current_stage != Stage::ThankYouSent)
            .take(SUMMARY_PROSPECT_LIMIT)
            .map(|r| Prospect {
                organization_name: r.organization_name.clone(),
                stage: r.current_stage,
                assigned_to: r.assigned_to.clone(),
            })
            .collect();

        Ok(PipelineSummary {
            total_organizations: records.len(),
            stage_breakdown,
            active_prospects,
        })
    }

    /// Most recent audit entries across all records
    pub async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityRecord>> {
        self.log.list_recent(limit).await
    }

    /// One organization's full audit history
    pub async fn organization_activity(&self, query: &str) -> Result<Vec<ActivityRecord>> {
        let record = self.find_organization(query).await?;
        self.log.list_for_organization(&record.guid).await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a donor record; the only way records come into existence.
    ///
    /// Creation is not a mutation of an existing record, so it produces no
    /// activity entry; `created_at` documents it.
    pub async fn add_organization(
        &self,
        new: NewOrganization,
        actor: &str,
    ) -> Result<DonorRecord> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Organization name is required".to_string()));
        }
        if let Some(p) = new.probability {
            if !(0..=100).contains(&p) {
                return Err(Error::InvalidInput(format!(
                    "Probability must be 0-100, got {}",
                    p
                )));
            }
        }
        let stage = match &new.stage {
            Some(s) => Stage::parse(s)?,
            None => Stage::InitialContact,
        };

        if self.store.get_by_name(name).await?.is_some() {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let now = time::fresh_token();
        let record = DonorRecord {
            guid: Uuid::new_v4().to_string(),
            organization_name: name.to_string(),
            contact_person: none_if_blank(new.contact_person),
            contact_email: none_if_blank(new.contact_email),
            contact_role: none_if_blank(new.contact_role),
            current_stage: stage,
            previous_stage: None,
            assigned_to: None,
            next_action: None,
            next_action_date: None,
            last_contact_date: None,
            sector_tags: none_if_blank(new.sector_tags),
            geography: none_if_blank(new.geography),
            notes: None,
            probability: new.probability,
            created_at: now.clone(),
            last_updated: now,
        };

        self.store.insert(&record).await?;
        info!(organization = %record.organization_name, actor, stage = %stage, "Organization added");

        Ok(record)
    }

    /// Move a record to a new stage.
    ///
    /// Any-to-any transitions are allowed (backward moves are a correction
    /// workflow); the transition direction is recorded in the audit entry.
    /// When the `lock_closed_stages` setting is on, the only move out of a
    /// closed stage is Closed Won to Thank You Sent.
    pub async fn transition_stage(
        &self,
        query: &str,
        new_stage: &str,
        actor: &str,
        client_token: Option<&str>,
    ) -> Result<MutationOutcome> {
        let new_stage = Stage::parse(new_stage)?;
        let snapshot = self.find_organization(query).await?;

        if self.closed_stages_locked().await?
            && snapshot.current_stage.is_closed()
            && !(snapshot.current_stage == Stage::ClosedWon && new_stage == Stage::ThankYouSent)
        {
            return Err(Error::InvalidStage(format!(
                "{} (stage is locked after {})",
                new_stage,
                snapshot.current_stage
            )));
        }

        let kind = snapshot.current_stage.transition_kind(new_stage);
        let changes = vec![
            FieldChange::set(DonorField::CurrentStage, new_stage.as_str()),
            FieldChange::set(DonorField::PreviousStage, snapshot.current_stage.as_str()),
        ];
        let activity = NewActivity {
            record_key: snapshot.guid.clone(),
            organization_name: snapshot.organization_name.clone(),
            actor: actor.to_string(),
            action: ActivityKind::StageChange,
            field: "current_stage".to_string(),
            before: Some(snapshot.current_stage.as_str().to_string()),
            after: Some(new_stage.as_str().to_string()),
            detail: Some(kind.as_str().to_string()),
        };

        let outcome = self.apply(snapshot, client_token, changes, activity).await?;
        info!(
            organization = %outcome.record.organization_name,
            actor,
            stage = %new_stage,
            direction = kind.as_str(),
            "Stage transition"
        );
        Ok(outcome)
    }

    /// Set the record's owner; unconditional overwrite, logged with
    /// before/after. Re-assigning the same owner still writes and logs a
    /// before == after entry.
    pub async fn assign_owner(
        &self,
        query: &str,
        owner: &str,
        actor: &str,
        client_token: Option<&str>,
    ) -> Result<MutationOutcome> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(Error::InvalidInput("Owner identifier is required".to_string()));
        }
        let snapshot = self.find_organization(query).await?;

        let changes = vec![FieldChange::set(DonorField::AssignedTo, owner)];
        let activity = NewActivity {
            record_key: snapshot.guid.clone(),
            organization_name: snapshot.organization_name.clone(),
            actor: actor.to_string(),
            action: ActivityKind::Assignment,
            field: "assigned_to".to_string(),
            before: snapshot.assigned_to.clone(),
            after: Some(owner.to_string()),
            detail: None,
        };

        let outcome = self.apply(snapshot, client_token, changes, activity).await?;
        info!(organization = %outcome.record.organization_name, actor, owner, "Owner assigned");
        Ok(outcome)
    }

    /// Set the next action and its due date, replacing any existing one
    pub async fn set_next_action(
        &self,
        query: &str,
        action: &str,
        due_date: &str,
        actor: &str,
        client_token: Option<&str>,
    ) -> Result<MutationOutcome> {
        let action = action.trim();
        if action.is_empty() {
            return Err(Error::InvalidInput("Next action text is required".to_string()));
        }
        let due = NaiveDate::parse_from_str(due_date.trim(), "%Y-%m-%d")
            .map_err(|_| Error::InvalidDate(due_date.trim().to_string()))?;

        let snapshot = self.find_organization(query).await?;

        let changes = vec![
            FieldChange::set(DonorField::NextAction, action),
            FieldChange::set(DonorField::NextActionDate, due.to_string()),
        ];
        let activity = NewActivity {
            record_key: snapshot.guid.clone(),
            organization_name: snapshot.organization_name.clone(),
            actor: actor.to_string(),
            action: ActivityKind::NextActionUpdate,
            field: "next_action".to_string(),
            before: describe_next_action(&snapshot),
            after: Some(format!("{} (due {})", action, due)),
            detail: None,
        };

        let outcome = self.apply(snapshot, client_token, changes, activity).await?;
        info!(organization = %outcome.record.organization_name, actor, due = %due, "Next action set");
        Ok(outcome)
    }

    /// Replace the notes field.
    ///
    /// Replace-semantics at the engine level; front-ends wanting append
    /// read-then-concatenate before calling.
    pub async fn update_notes(
        &self,
        query: &str,
        notes: &str,
        actor: &str,
        client_token: Option<&str>,
    ) -> Result<MutationOutcome> {
        let snapshot = self.find_organization(query).await?;

        let new_value = if notes.trim().is_empty() {
            None
        } else {
            Some(notes.to_string())
        };
        let changes = vec![FieldChange {
            field: DonorField::Notes,
            value: new_value.clone(),
        }];
        let activity = NewActivity {
            record_key: snapshot.guid.clone(),
            organization_name: snapshot.organization_name.clone(),
            actor: actor.to_string(),
            action: ActivityKind::NoteUpdate,
            field: "notes".to_string(),
            before: snapshot.notes.clone(),
            after: new_value,
            detail: None,
        };

        let outcome = self.apply(snapshot, client_token, changes, activity).await?;
        info!(organization = %outcome.record.organization_name, actor, "Notes updated");
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Commit a field set against the snapshot's token, merging past
    /// concurrent writers only when their fields are disjoint from ours.
    async fn apply(
        &self,
        snapshot: DonorRecord,
        client_token: Option<&str>,
        changes: Vec<FieldChange>,
        activity: NewActivity,
    ) -> Result<MutationOutcome> {
        let ours: HashSet<&'static str> = changes.iter().map(|c| c.field.column()).collect();
        let mut base = snapshot;

        // A stale client token means the caller edited a state older than
        // the current row. The audit trail tells us which fields moved in
        // between; disjoint edits merge, overlapping edits fail.
        if let Some(token) = client_token {
            if token != base.last_updated {
                let changed = self.log.fields_changed_since(&base.guid, token).await?;
                let conflicting = changed.is_empty()
                    || changed.iter().any(|f| ours.contains(f.as_str()));
                if conflicting {
                    return Err(Error::ConcurrentModification(
                        base.organization_name.clone(),
                    ));
                }
            }
        }

        for _attempt in 0..MERGE_RETRIES {
            let new_token = time::fresh_token();
            match self
                .store
                .update(&base.guid, &changes, &base.last_updated, &new_token)
                .await?
            {
                CasOutcome::Applied => {
                    let mut record = base;
                    for change in &changes {
                        change.field.apply(&mut record, change.value.as_deref())?;
                    }
                    record.last_updated = new_token;

                    let audit = self.record_activity(activity).await;
                    return Ok(MutationOutcome { record, audit });
                }
                CasOutcome::Missing => {
                    return Err(Error::NotFound(base.organization_name.clone()));
                }
                CasOutcome::TokenMismatch => {
                    let current = self
                        .store
                        .get(&base.guid)
                        .await?
                        .ok_or_else(|| Error::NotFound(base.organization_name.clone()))?;

                    let concurrent = diff_fields(&base, &current);
                    if concurrent.iter().any(|f| ours.contains(f.column())) {
                        return Err(Error::ConcurrentModification(
                            base.organization_name.clone(),
                        ));
                    }
                    // Disjoint fields: retry on top of the newer state
                    base = current;
                }
            }
        }

        Err(Error::ConcurrentModification(base.organization_name.clone()))
    }

    /// Append the audit entry for a committed mutation.
    ///
    /// The donor write already happened; a failure here becomes a
    /// PartialCommit warning, never a rollback or a crash.
    async fn record_activity(&self, activity: NewActivity) -> AuditStatus {
        match self.log.append(activity).await {
            Ok(_) => AuditStatus::Logged,
            Err(e) => {
                error!("Audit write failed after record write committed: {}", e);
                AuditStatus::PartialCommit {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn closed_stages_locked(&self) -> Result<bool> {
        Ok(get_setting(&self.db, "lock_closed_stages")
            .await?
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false))
    }
}

/// Fields whose stored values differ between two versions of a record
fn diff_fields(a: &DonorRecord, b: &DonorRecord) -> Vec<DonorField> {
    DIFFABLE_FIELDS
        .iter()
        .copied()
        .filter(|f| f.value_of(a) != f.value_of(b))
        .collect()
}

fn describe_next_action(record: &DonorRecord) -> Option<String> {
    match (&record.next_action, record.next_action_date) {
        (Some(action), Some(date)) => Some(format!("{} (due {})", action, date)),
        (Some(action), None) => Some(action.clone()),
        (None, _) => None,
    }
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
