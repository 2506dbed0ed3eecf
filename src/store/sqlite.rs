//! SQLite table backend.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::migration::{self, MigrationReport};
use super::{strip_quotes, SettingsStore, StoreError};

/// Settings kept in the `configentry` table of a SQLite database.
///
/// Holds a single pooled connection shared by every request task.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database and run the schema migration.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::from_pool(pool, path.to_path_buf()).await
    }

    /// In-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // One connection: every new connection to :memory: is a fresh database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool, PathBuf::from(":memory:")).await
    }

    async fn from_pool(pool: SqlitePool, path: PathBuf) -> Result<Self, StoreError> {
        let report = migration::run(&pool).await?;
        log_migration(&path, &report);
        Ok(Self { pool, path })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flag or unflag an existing row as immutable.
    ///
    /// Returns `false` when the key has no row.
    pub async fn set_immutable(&self, key: &str, immutable: bool) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE configentry SET is_immutable = ?, updated_at = ? WHERE key = ?")
            .bind(i64::from(immutable))
            .bind(Utc::now().to_rfc3339())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Full metadata for every row.
    pub async fn entries(&self) -> Result<Vec<ConfigEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT key, value, value_type, description, is_immutable, created_at, updated_at
             FROM configentry ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ConfigEntry {
                    key: row.try_get("key")?,
                    value: row.try_get("value")?,
                    value_type: row
                        .try_get::<Option<String>, _>("value_type")?
                        .unwrap_or_else(|| "str".to_string()),
                    description: row.try_get("description")?,
                    is_immutable: row.try_get::<Option<i64>, _>("is_immutable")?.unwrap_or(0) != 0,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }
}

/// One row of the settings table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub value_type: String,
    pub description: Option<String>,
    pub is_immutable: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

fn log_migration(path: &Path, report: &MigrationReport) {
    for warning in &report.warnings {
        tracing::warn!(db = %path.display(), warning = %warning, "Settings migration step skipped");
    }
    if !report.added_columns.is_empty() {
        tracing::info!(db = %path.display(), columns = ?report.added_columns, "Added settings columns");
    }
    if let Some(legacy) = &report.legacy_table {
        tracing::info!(
            db = %path.display(),
            legacy_table = %legacy,
            rows = report.copied_rows,
            "Migrated legacy settings table"
        );
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM configentry")
            .fetch_all(&self.pool)
            .await?;

        let mut values = BTreeMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            values.insert(key, strip_quotes(&value).to_string());
        }
        Ok(values)
    }

    async fn write_many(&self, updates: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for (key, value) in updates {
            let existing = sqlx::query("SELECT is_immutable FROM configentry WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;

            match existing {
                Some(row) => {
                    let immutable = row.try_get::<Option<i64>, _>(0)?.unwrap_or(0) != 0;
                    if immutable {
                        tracing::debug!(key = %key, "Skipping write to immutable setting");
                        continue;
                    }
                    sqlx::query("UPDATE configentry SET value = ?, updated_at = ? WHERE key = ?")
                        .bind(value)
                        .bind(&now)
                        .bind(key)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO configentry
                            (key, value, value_type, description, is_immutable, created_at, updated_at)
                         VALUES (?, ?, 'str', NULL, 0, ?, ?)",
                    )
                    .bind(key)
                    .bind(value)
                    .bind(&now)
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        tracing::debug!(db = %self.path.display(), keys = updates.len(), "Table store written");
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool, StoreError> {
        let first: Option<String> = sqlx::query_scalar("SELECT key FROM configentry LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(first.is_none())
    }

    async fn immutable_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM configentry WHERE is_immutable = 1")
                .fetch_all(&self.pool)
                .await?;
        Ok(keys.into_iter().collect())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
