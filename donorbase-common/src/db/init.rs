//! Database initialization
//!
//! Creates the schema idempotently on startup and seeds default settings.
//! The donors table carries the concurrency token (`last_updated`); the
//! activity log is append-only with an AUTOINCREMENT id so same-timestamp
//! entries keep their arrival order.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while one front-end writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Default busy timeout; re-applied below from settings once they exist
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_donors_table(&pool).await?;
    create_activity_log_table(&pool).await?;
    create_settings_table(&pool).await?;

    init_default_settings(&pool).await?;

    // Apply configurable busy timeout from settings
    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'store_busy_timeout_ms'",
    )
    .fetch_optional(&pool)
    .await?
    .unwrap_or(5000);

    let pragma_sql = format!("PRAGMA busy_timeout = {}", timeout_ms);
    sqlx::query(&pragma_sql).execute(&pool).await?;

    Ok(pool)
}

async fn create_donors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS donors (
            guid TEXT PRIMARY KEY,
            organization_name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            contact_person TEXT,
            contact_email TEXT,
            contact_role TEXT,
            current_stage TEXT NOT NULL,
            previous_stage TEXT,
            assigned_to TEXT,
            next_action TEXT,
            next_action_date TEXT,
            last_contact_date TEXT,
            sector_tags TEXT,
            geography TEXT,
            notes TEXT,
            probability INTEGER,
            created_at TEXT NOT NULL,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_activity_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_key TEXT NOT NULL,
            organization_name TEXT NOT NULL,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            field TEXT NOT NULL,
            before TEXT,
            after TEXT,
            detail TEXT,
            timestamp TEXT NOT NULL,
            FOREIGN KEY (record_key) REFERENCES donors(guid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_activity_log_record_key ON activity_log(record_key)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed default settings without overwriting operator changes
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults = [
        // Terminal-stage policy: when "1", closed stages only allow
        // Closed Won -> Thank You Sent
        ("lock_closed_stages", "0"),
        ("store_busy_timeout_ms", "5000"),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Write a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
