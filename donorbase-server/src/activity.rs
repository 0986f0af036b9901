//! Activity Log
//!
//! Append-only ledger of every mutation, regardless of which front-end
//! issued it. No update or delete surface exists; audit integrity depends
//! on that. Ordering within one record's history is by timestamp with the
//! AUTOINCREMENT id breaking same-tick ties in arrival order.

use donorbase_common::db::{ActivityKind, ActivityRecord};
use donorbase_common::{time, Result};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// A mutation about to be recorded
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub record_key: String,
    pub organization_name: String,
    pub actor: String,
    pub action: ActivityKind,
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub detail: Option<String>,
}

/// Append-only persistence surface for activity records
#[derive(Clone)]
pub struct ActivityLog {
    db: SqlitePool,
}

impl ActivityLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append one entry; returns its id
    pub async fn append(&self, entry: NewActivity) -> Result<i64> {
        let timestamp = time::fresh_token();
        let result = sqlx::query(
            r#"
            INSERT INTO activity_log
                (record_key, organization_name, actor, action, field, before, after, detail, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.record_key)
        .bind(&entry.organization_name)
        .bind(&entry.actor)
        .bind(entry.action.as_str())
        .bind(&entry.field)
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(&entry.detail)
        .bind(&timestamp)
        .execute(&self.db)
        .await?;

        let id = result.last_insert_rowid();
        debug!(
            id,
            organization = %entry.organization_name,
            action = entry.action.as_str(),
            "Activity recorded"
        );
        Ok(id)
    }

    /// Most recent entries across all records, newest first
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            "SELECT id, record_key, organization_name, actor, action, field, before, after, detail, timestamp
             FROM activity_log
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(row_to_activity).collect()
    }

    /// One record's full history, newest first
    pub async fn list_for_organization(&self, record_key: &str) -> Result<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            "SELECT id, record_key, organization_name, actor, action, field, before, after, detail, timestamp
             FROM activity_log
             WHERE record_key = ?
             ORDER BY timestamp DESC, id DESC",
        )
        .bind(record_key)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(row_to_activity).collect()
    }

    /// Fields of one record mutated strictly after the given token.
    ///
    /// Used to decide whether a stale client edit touches disjoint fields.
    /// Tokens and activity timestamps share the same fixed-width RFC 3339
    /// format, so lexical comparison is chronological.
    pub async fn fields_changed_since(
        &self,
        record_key: &str,
        token: &str,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT field FROM activity_log
             WHERE record_key = ? AND timestamp > ?",
        )
        .bind(record_key)
        .bind(token)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("field")).collect())
    }
}

fn row_to_activity(row: sqlx::sqlite::SqliteRow) -> Result<ActivityRecord> {
    let action: String = row.get("action");
    Ok(ActivityRecord {
        id: row.get("id"),
        record_key: row.get("record_key"),
        organization_name: row.get("organization_name"),
        actor: row.get("actor"),
        action: ActivityKind::parse(&action)?,
        field: row.get("field"),
        before: row.get("before"),
        after: row.get("after"),
        detail: row.get("detail"),
        timestamp: row.get("timestamp"),
    })
}
