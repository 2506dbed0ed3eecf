//! Durable key-value persistence for settings.
//!
//! # Data Flow
//! ```text
//! BootConfig.store (SETTINGS_USE_DB, SETTINGS_DB_PATH, SETTINGS_ENV_PATH)
//!     → open() picks a backend once at startup
//!     → FileStore  (flat KEY=VALUE file, whole-file rewrite per batch)
//!     → SqliteStore (configentry table, migrated on open)
//!     → shared as Arc<dyn SettingsStore>
//! ```
//!
//! # Design Decisions
//! - Both backends speak the same text format: values are strings and one
//!   layer of surrounding quotes is stripped on read
//! - Immutable rows are skipped silently here; rejecting them with an error
//!   is the admin protocol's job
//! - Migration problems that are not fatal are reported, not raised

pub mod file;
pub mod migration;
pub mod sqlite;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::schema::StoreConfig;

pub use file::FileStore;
pub use migration::MigrationReport;
pub use sqlite::SqliteStore;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Pluggable persistence for settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Every persisted key with its (unquoted) value.
    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError>;

    /// Merge `updates` into the store as one batch.
    async fn write_many(&self, updates: &BTreeMap<String, String>) -> Result<(), StoreError>;

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read_all().await?.is_empty())
    }

    /// Keys the backend itself marks as immutable.
    async fn immutable_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(BTreeSet::new())
    }

    /// Reason this backend cannot hold `key`/`value`, if any.
    fn check_storable(&self, _key: &str, _value: &str) -> Result<(), String> {
        Ok(())
    }

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// Open the backend selected by the boot configuration.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn SettingsStore>, StoreError> {
    if config.use_db {
        let store = SqliteStore::open(&config.db_path).await?;
        Ok(Arc::new(store))
    } else {
        Ok(Arc::new(FileStore::new(&config.env_path)))
    }
}

/// Copy every entry of a flat file into the table store.
///
/// Rows already flagged immutable in the table keep their value.
pub async fn migrate_file_to_table(
    file: &FileStore,
    table: &SqliteStore,
) -> Result<usize, StoreError> {
    let values = file.read_all().await?;
    if values.is_empty() {
        return Ok(0);
    }
    table.write_many(&values).await?;
    tracing::info!(
        from = %file.describe(),
        to = %table.describe(),
        count = values.len(),
        "Migrated file settings into table store"
    );
    Ok(values.len())
}

/// Remove one layer of matching single or double quotes.
pub fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"\"abc\"\""), "\"abc\"");
        assert_eq!(strip_quotes("\"abc'"), "\"abc'");
        assert_eq!(strip_quotes("\""), "\"");
        assert_eq!(strip_quotes("plain"), "plain");
        assert_eq!(strip_quotes("''"), "");
    }

    #[tokio::test]
    async fn test_migrate_file_to_table() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(&env_path, "LOG_LEVEL=DEBUG\nFEATURE_X='on'\n").unwrap();

        let file = FileStore::new(&env_path);
        let table = SqliteStore::open(&dir.path().join("settings.db")).await.unwrap();

        let copied = migrate_file_to_table(&file, &table).await.unwrap();
        assert_eq!(copied, 2);

        let values = table.read_all().await.unwrap();
        assert_eq!(values.get("LOG_LEVEL").map(String::as_str), Some("DEBUG"));
        assert_eq!(values.get("FEATURE_X").map(String::as_str), Some("on"));
    }
}
