//! Store backends against real files on disk.

use std::collections::BTreeMap;
use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use settings_server::config::StoreConfig;
use settings_server::store::{
    self, migrate_file_to_table, migration, FileStore, SettingsStore, SqliteStore,
};

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn raw_pool(path: &Path) -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
        .await
        .unwrap()
}

async fn assert_round_trip(store: &dyn SettingsStore) {
    assert!(store.is_empty().await.unwrap());

    store
        .write_many(&values(&[("A", "1"), ("B", "two words")]))
        .await
        .unwrap();
    store.write_many(&values(&[("A", "3")])).await.unwrap();

    assert_eq!(
        store.read_all().await.unwrap(),
        values(&[("A", "3"), ("B", "two words")])
    );
    assert!(!store.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_round_trip_both_backends() {
    let dir = tempfile::tempdir().unwrap();

    let file = FileStore::new(&dir.path().join("nested/settings.env"));
    assert_round_trip(&file).await;

    let table = SqliteStore::open(&dir.path().join("nested/settings.db")).await.unwrap();
    assert_round_trip(&table).await;
}

#[tokio::test]
async fn test_open_selects_backend() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig {
        use_db: true,
        db_path: dir.path().join("s.db"),
        env_path: dir.path().join("s.env"),
    };

    let table = store::open(&config).await.unwrap();
    assert!(table.describe().starts_with("sqlite:"));

    config.use_db = false;
    let file = store::open(&config).await.unwrap();
    assert!(file.describe().starts_with("file:"));
}

#[tokio::test]
async fn test_legacy_rows_copied_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let pool = raw_pool(&path).await;
    sqlx::query("CREATE TABLE setting (key TEXT PRIMARY KEY, value TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO setting (key, value) VALUES ('PORT', '9001'), ('NAME', 'legacy')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let first = SqliteStore::open(&path).await.unwrap();
    assert_eq!(
        first.read_all().await.unwrap(),
        values(&[("NAME", "legacy"), ("PORT", "9001")])
    );
    first.pool().close().await;

    let second = SqliteStore::open(&path).await.unwrap();
    let entries = second.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.value_type == "str" && !e.is_immutable));
}

#[tokio::test]
async fn test_old_table_gains_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.db");

    let pool = raw_pool(&path).await;
    sqlx::query("CREATE TABLE configentry (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO configentry (key, value) VALUES ('KEEP', 'me')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let store = SqliteStore::open(&path).await.unwrap();
    assert_eq!(store.read_all().await.unwrap(), values(&[("KEEP", "me")]));

    assert!(store.set_immutable("KEEP", true).await.unwrap());
    assert!(store.immutable_keys().await.unwrap().contains("KEEP"));

    let entries = store.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_immutable);
}

#[tokio::test]
async fn test_failed_column_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let pool = raw_pool(&dir.path().join("partial.db")).await;

    // A generated column is hidden from PRAGMA table_info, so adding
    // `updated_at` collides with it. `Description` differs only in case.
    sqlx::query(
        "CREATE TABLE configentry (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            Description TEXT,
            updated_at TEXT GENERATED ALWAYS AS ('fixed') VIRTUAL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    let report = migration::run(&pool).await.unwrap();
    assert_eq!(
        report.added_columns,
        vec!["value_type", "is_immutable", "created_at"]
    );
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("updated_at"));

    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('configentry')")
        .fetch_all(&pool)
        .await
        .unwrap();
    for column in ["value_type", "is_immutable", "created_at"] {
        assert!(columns.iter().any(|c| c == column), "missing {column}");
    }

    let again = migration::run(&pool).await.unwrap();
    assert!(again.added_columns.is_empty());
}

#[tokio::test]
async fn test_env_file_migrates_into_table() {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join(".env");
    std::fs::write(&env_path, "# comment\nHOST=\"0.0.0.0\"\nPORT=8100\n\nBAD LINE\n").unwrap();

    let file = FileStore::new(&env_path);
    let table = SqliteStore::open(&dir.path().join("settings.db")).await.unwrap();

    let count = migrate_file_to_table(&file, &table).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        table.read_all().await.unwrap(),
        values(&[("HOST", "0.0.0.0"), ("PORT", "8100")])
    );
}
