//! Record Store Adapter
//!
//! Narrow persistence port between the pipeline engine and the donors table.
//! Owns the column mapping and the compare-and-set on the `last_updated`
//! token; carries no business rules. The engine is the only caller.

use chrono::NaiveDate;
use donorbase_common::db::DonorRecord;
use donorbase_common::{Error, Result, Stage};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Donor record field addressable by a partial update.
///
/// One variant per mutable column; the engine uses these both to build
/// writes and to diff snapshots during field-level merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonorField {
    ContactPerson,
    ContactEmail,
    ContactRole,
    CurrentStage,
    PreviousStage,
    AssignedTo,
    NextAction,
    NextActionDate,
    LastContactDate,
    SectorTags,
    Geography,
    Notes,
    Probability,
}

/// All fields participating in snapshot diffs
pub const DIFFABLE_FIELDS: [DonorField; 13] = [
    DonorField::ContactPerson,
    DonorField::ContactEmail,
    DonorField::ContactRole,
    DonorField::CurrentStage,
    DonorField::PreviousStage,
    DonorField::AssignedTo,
    DonorField::NextAction,
    DonorField::NextActionDate,
    DonorField::LastContactDate,
    DonorField::SectorTags,
    DonorField::Geography,
    DonorField::Notes,
    DonorField::Probability,
];

impl DonorField {
    /// Column name in the donors table
    pub fn column(&self) -> &'static str {
        match self {
            DonorField::ContactPerson => "contact_person",
            DonorField::ContactEmail => "contact_email",
            DonorField::ContactRole => "contact_role",
            DonorField::CurrentStage => "current_stage",
            DonorField::PreviousStage => "previous_stage",
            DonorField::AssignedTo => "assigned_to",
            DonorField::NextAction => "next_action",
            DonorField::NextActionDate => "next_action_date",
            DonorField::LastContactDate => "last_contact_date",
            DonorField::SectorTags => "sector_tags",
            DonorField::Geography => "geography",
            DonorField::Notes => "notes",
            DonorField::Probability => "probability",
        }
    }

    /// Apply a stored-form value back onto a record.
    ///
    /// Used by the engine to project the post-commit record without a
    /// read-back that could observe a later writer's state.
    pub fn apply(&self, record: &mut DonorRecord, value: Option<&str>) -> Result<()> {
        match self {
            DonorField::ContactPerson => record.contact_person = value.map(String::from),
            DonorField::ContactEmail => record.contact_email = value.map(String::from),
            DonorField::ContactRole => record.contact_role = value.map(String::from),
            DonorField::CurrentStage => {
                let value = value
                    .ok_or_else(|| Error::Internal("current_stage cannot be NULL".to_string()))?;
                record.current_stage = Stage::parse(value)?;
            }
            DonorField::PreviousStage => {
                record.previous_stage = value.map(Stage::parse).transpose()?;
            }
            DonorField::AssignedTo => record.assigned_to = value.map(String::from),
            DonorField::NextAction => record.next_action = value.map(String::from),
            DonorField::NextActionDate => {
                record.next_action_date = parse_stored_date(value.map(String::from))?;
            }
            DonorField::LastContactDate => {
                record.last_contact_date = parse_stored_date(value.map(String::from))?;
            }
            DonorField::SectorTags => record.sector_tags = value.map(String::from),
            DonorField::Geography => record.geography = value.map(String::from),
            DonorField::Notes => record.notes = value.map(String::from),
            DonorField::Probability => {
                record.probability = value
                    .map(|v| {
                        v.parse::<i64>()
                            .map_err(|_| Error::Internal(format!("Invalid probability: {}", v)))
                    })
                    .transpose()?;
            }
        }
        Ok(())
    }

    /// Current value of this field on a record, in stored (text) form
    pub fn value_of(&self, record: &DonorRecord) -> Option<String> {
        match self {
            DonorField::ContactPerson => record.contact_person.clone(),
            DonorField::ContactEmail => record.contact_email.clone(),
            DonorField::ContactRole => record.contact_role.clone(),
            DonorField::CurrentStage => Some(record.current_stage.as_str().to_string()),
            DonorField::PreviousStage => {
                record.previous_stage.map(|s| s.as_str().to_string())
            }
            DonorField::AssignedTo => record.assigned_to.clone(),
            DonorField::NextAction => record.next_action.clone(),
            DonorField::NextActionDate => {
                record.next_action_date.map(|d| d.to_string())
            }
            DonorField::LastContactDate => {
                record.last_contact_date.map(|d| d.to_string())
            }
            DonorField::SectorTags => record.sector_tags.clone(),
            DonorField::Geography => record.geography.clone(),
            DonorField::Notes => record.notes.clone(),
            DonorField::Probability => record.probability.map(|p| p.to_string()),
        }
    }
}

/// One field assignment within a partial update
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub field: DonorField,
    /// New stored value; None writes SQL NULL
    pub value: Option<String>,
}

impl FieldChange {
    pub fn set(field: DonorField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: Some(value.into()),
        }
    }

    pub fn clear(field: DonorField) -> Self {
        Self { field, value: None }
    }
}

/// Result of a compare-and-set update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The whole field set committed
    Applied,
    /// Row exists but the token no longer matches
    TokenMismatch,
    /// Row is gone (never created or key changed underneath us)
    Missing,
}

/// Persistence adapter for the donors table
#[derive(Clone)]
pub struct RecordStore {
    db: SqlitePool,
}

impl RecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Load a record by guid
    pub async fn get(&self, guid: &str) -> Result<Option<DonorRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM donors WHERE guid = ?",
            SELECT_COLUMNS
        ))
        .bind(guid)
        .fetch_optional(&self.db)
        .await
        .map_err(map_store_error)?;

        row.map(row_to_record).transpose()
    }

    /// Load a record by exact organization name (case-insensitive)
    pub async fn get_by_name(&self, name: &str) -> Result<Option<DonorRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM donors WHERE organization_name = ? COLLATE NOCASE",
            SELECT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .map_err(map_store_error)?;

        row.map(row_to_record).transpose()
    }

    /// All records ordered by organization name.
    ///
    /// Fails whole rather than returning a partial list.
    pub async fn list(&self) -> Result<Vec<DonorRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM donors ORDER BY organization_name COLLATE NOCASE ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await
        .map_err(map_store_error)?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Insert a newly created record
    pub async fn insert(&self, record: &DonorRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO donors (
                guid, organization_name, contact_person, contact_email, contact_role,
                current_stage, previous_stage, assigned_to, next_action, next_action_date,
                last_contact_date, sector_tags, geography, notes, probability,
                created_at, last_updated
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.guid)
        .bind(&record.organization_name)
        .bind(&record.contact_person)
        .bind(&record.contact_email)
        .bind(&record.contact_role)
        .bind(record.current_stage.as_str())
        .bind(record.previous_stage.map(|s| s.as_str()))
        .bind(&record.assigned_to)
        .bind(&record.next_action)
        .bind(record.next_action_date.map(|d| d.to_string()))
        .bind(record.last_contact_date.map(|d| d.to_string()))
        .bind(&record.sector_tags)
        .bind(&record.geography)
        .bind(&record.notes)
        .bind(record.probability)
        .bind(&record.created_at)
        .bind(&record.last_updated)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::AlreadyExists(record.organization_name.clone()))
            }
            Err(e) => Err(map_store_error(e)),
        }
    }

    /// Compare-and-set partial update.
    ///
    /// Either the whole field set commits in one statement or nothing does.
    /// `expected_token` is the `last_updated` value the caller read;
    /// `new_token` becomes the record's token on success.
    pub async fn update(
        &self,
        guid: &str,
        changes: &[FieldChange],
        expected_token: &str,
        new_token: &str,
    ) -> Result<CasOutcome> {
        if changes.is_empty() {
            return Err(Error::Internal("Empty field change set".to_string()));
        }

        let assignments: Vec<String> = changes
            .iter()
            .map(|c| format!("{} = ?", c.field.column()))
            .collect();
        let sql = format!(
            "UPDATE donors SET {}, last_updated = ? WHERE guid = ? AND last_updated = ?",
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for change in changes {
            query = query.bind(change.value.as_deref());
        }
        query = query.bind(new_token).bind(guid).bind(expected_token);

        let result = query.execute(&self.db).await.map_err(map_store_error)?;

        if result.rows_affected() == 1 {
            debug!(guid, fields = changes.len(), "Record updated");
            return Ok(CasOutcome::Applied);
        }

        // Zero rows: distinguish a stale token from a missing row
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM donors WHERE guid = ?")
            .bind(guid)
            .fetch_one(&self.db)
            .await
            .map_err(map_store_error)?;

        if exists > 0 {
            Ok(CasOutcome::TokenMismatch)
        } else {
            Ok(CasOutcome::Missing)
        }
    }
}

/// Columns in row_to_record order
const SELECT_COLUMNS: &str = "guid, organization_name, contact_person, contact_email, \
     contact_role, current_stage, previous_stage, assigned_to, next_action, \
     next_action_date, last_contact_date, sector_tags, geography, notes, probability, \
     created_at, last_updated";

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<DonorRecord> {
    let current_stage: String = row.get("current_stage");
    let previous_stage: Option<String> = row.get("previous_stage");

    Ok(DonorRecord {
        guid: row.get("guid"),
        organization_name: row.get("organization_name"),
        contact_person: row.get("contact_person"),
        contact_email: row.get("contact_email"),
        contact_role: row.get("contact_role"),
        current_stage: Stage::parse(&current_stage)
            .map_err(|_| Error::Internal(format!("Invalid stage in database: {}", current_stage)))?,
        previous_stage: previous_stage
            .map(|s| {
                Stage::parse(&s)
                    .map_err(|_| Error::Internal(format!("Invalid stage in database: {}", s)))
            })
            .transpose()?,
        assigned_to: row.get("assigned_to"),
        next_action: row.get("next_action"),
        next_action_date: parse_stored_date(row.get("next_action_date"))?,
        last_contact_date: parse_stored_date(row.get("last_contact_date"))?,
        sector_tags: row.get("sector_tags"),
        geography: row.get("geography"),
        notes: row.get("notes"),
        probability: row.get("probability"),
        created_at: row.get("created_at"),
        last_updated: row.get("last_updated"),
    })
}

fn parse_stored_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|_| Error::Internal(format!("Invalid date in database: {}", s)))
        })
        .transpose()
}

/// Map low-level store failures onto the engine-facing taxonomy.
///
/// Pool exhaustion and lock timeouts surface as `StoreUnavailable` so
/// front-ends can retry with backoff; everything else stays a database error.
fn map_store_error(e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            Error::StoreUnavailable(e.to_string())
        }
        sqlx::Error::Io(io) => Error::StoreUnavailable(io.to_string()),
        sqlx::Error::Database(db) => {
            let message = db.message().to_lowercase();
            if message.contains("locked") || message.contains("busy") {
                Error::StoreUnavailable(db.message().to_string())
            } else {
                Error::Database(sqlx::Error::Database(db))
            }
        }
        other => Error::Database(other),
    }
}
