//! Lightweight schema migration for the table store.
//!
//! Runs on every `SqliteStore::open` and is idempotent:
//! 1. create `configentry` if missing (fatal on failure)
//! 2. add any missing column (each one advisory)
//! 3. copy rows from a legacy key/value table into an empty `configentry`
//!    (advisory)

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::StoreError;

pub const TABLE: &str = "configentry";

/// Legacy single key/value tables, checked in this order.
pub const LEGACY_TABLES: &[&str] = &["setting", "legacysetting"];

/// Columns beyond `key`/`value` and the type used when adding them.
const COLUMNS: &[(&str, &str)] = &[
    ("value_type", "TEXT DEFAULT 'str'"),
    ("description", "TEXT"),
    ("is_immutable", "INTEGER DEFAULT 0"),
    ("created_at", "TEXT"),
    ("updated_at", "TEXT"),
];

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS configentry (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    value_type TEXT DEFAULT 'str',
    description TEXT,
    is_immutable INTEGER DEFAULT 0,
    created_at TEXT,
    updated_at TEXT
)";

/// Outcome of a migration run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Columns added to an older `configentry` table.
    pub added_columns: Vec<String>,
    /// Legacy table that rows were copied from, if any.
    pub legacy_table: Option<String>,
    pub copied_rows: usize,
    /// Advisory failures that did not stop the migration.
    pub warnings: Vec<String>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.added_columns.is_empty() && self.copied_rows == 0 && self.warnings.is_empty()
    }
}

pub async fn run(pool: &SqlitePool) -> Result<MigrationReport, StoreError> {
    let mut report = MigrationReport::default();

    sqlx::query(CREATE_TABLE).execute(pool).await?;

    ensure_columns(pool, &mut report).await;

    match copy_legacy_rows(pool, &mut report).await {
        Ok(()) => {}
        Err(e) => report.warnings.push(format!("legacy copy failed: {e}")),
    }

    Ok(report)
}

async fn ensure_columns(pool: &SqlitePool, report: &mut MigrationReport) {
    let existing: Vec<String> = match sqlx::query("PRAGMA table_info('configentry')")
        .fetch_all(pool)
        .await
    {
        Ok(rows) => rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .collect(),
        Err(e) => {
            report.warnings.push(format!("cannot inspect columns: {e}"));
            Vec::new()
        }
    };

    for (column, sql_type) in COLUMNS {
        if existing.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            continue;
        }
        let statement = format!("ALTER TABLE {TABLE} ADD COLUMN {column} {sql_type}");
        match sqlx::query(&statement).execute(pool).await {
            Ok(_) => report.added_columns.push((*column).to_string()),
            Err(e) => report
                .warnings
                .push(format!("cannot add column {column}: {e}")),
        }
    }
}

async fn find_legacy_table(pool: &SqlitePool) -> Result<Option<String>, sqlx::Error> {
    for name in LEGACY_TABLES {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

async fn copy_legacy_rows(
    pool: &SqlitePool,
    report: &mut MigrationReport,
) -> Result<(), sqlx::Error> {
    let Some(legacy) = find_legacy_table(pool).await? else {
        return Ok(());
    };

    let has_rows: Option<String> = sqlx::query_scalar("SELECT key FROM configentry LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if has_rows.is_some() {
        return Ok(());
    }

    // Table name comes from LEGACY_TABLES, never from input.
    let rows = sqlx::query(&format!("SELECT key, value FROM {legacy}"))
        .fetch_all(pool)
        .await?;

    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut copied = 0;
    for row in rows {
        let key: String = row.try_get(0)?;
        let value: Option<String> = row.try_get(1)?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO configentry
                (key, value, value_type, description, is_immutable, created_at, updated_at)
             VALUES (?, ?, 'str', NULL, 0, ?, ?)",
        )
        .bind(&key)
        .bind(value.unwrap_or_default())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        copied += result.rows_affected() as usize;
    }
    tx.commit().await?;

    report.legacy_table = Some(legacy);
    report.copied_rows = copied;
    Ok(())
}
