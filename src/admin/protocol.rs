//! Create/update distinction and pre-checks on top of the update pipeline.
//!
//! # Design Decisions
//! - All pre-checks run before validation or any write
//! - Bulk requests are all-or-nothing: every offending key is reported and
//!   nothing is written
//! - Immutability is checked against the live roster (`IMMUTABLE_KEYS`) and
//!   the rows the store itself flags
//! - Keys naming a declared field are rewritten to its alias first, so
//!   `admin_jwt_secret` is checked and stored as `ADMIN_JWT_SECRET`

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use crate::error::SettingsError;
use crate::settings::registry::canonical_key;
use crate::settings::{Applied, SettingsHandle, UpdatePipeline};

/// Which side of the create/update split a request is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create,
    Update,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::Create => "create",
            Mutation::Update => "update",
        }
    }
}

/// Admin operations on settings.
pub struct AdminService {
    pipeline: UpdatePipeline,
}

impl AdminService {
    pub fn new(pipeline: UpdatePipeline) -> Self {
        Self { pipeline }
    }

    pub fn handle(&self) -> &Arc<SettingsHandle> {
        self.pipeline.handle()
    }

    /// Raw store values overlaid with the typed snapshot.
    pub async fn read_all(&self) -> Result<BTreeMap<String, Value>, SettingsError> {
        let handle = self.pipeline.handle();
        let mut merged: BTreeMap<String, Value> = handle
            .store()
            .read_all()
            .await?
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        merged.extend(handle.snapshot().to_values());
        Ok(merged)
    }

    pub async fn read_one(&self, key: &str) -> Result<Value, SettingsError> {
        self.read_all()
            .await?
            .remove(&canonical_key(key))
            .ok_or_else(|| SettingsError::NotFound(key.to_string()))
    }

    /// Add keys that do not exist yet.
    pub async fn create(
        &self,
        updates: &BTreeMap<String, Value>,
        restart: bool,
    ) -> Result<Applied, SettingsError> {
        self.mutate(Mutation::Create, updates, restart).await
    }

    /// Change keys that already exist.
    pub async fn update(
        &self,
        updates: &BTreeMap<String, Value>,
        restart: bool,
    ) -> Result<Applied, SettingsError> {
        self.mutate(Mutation::Update, updates, restart).await
    }

    async fn mutate(
        &self,
        mutation: Mutation,
        updates: &BTreeMap<String, Value>,
        restart: bool,
    ) -> Result<Applied, SettingsError> {
        if updates.is_empty() {
            return Err(SettingsError::Validation(BTreeMap::from([(
                String::new(),
                "no settings supplied".to_string(),
            )])));
        }

        let updates = canonicalize(updates)?;
        let existing = self.pipeline.handle().store().read_all().await?;

        match mutation {
            Mutation::Create => {
                let conflicts: Vec<String> = updates
                    .keys()
                    .filter(|k| existing.contains_key(*k))
                    .cloned()
                    .collect();
                if !conflicts.is_empty() {
                    tracing::warn!(keys = ?conflicts, "Create rejected, settings already exist");
                    return Err(SettingsError::Conflict(conflicts));
                }
            }
            Mutation::Update => {
                let missing: Vec<String> = updates
                    .keys()
                    .filter(|k| !existing.contains_key(*k))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    tracing::warn!(keys = ?missing, "Update rejected, settings do not exist");
                    return Err(SettingsError::Missing(missing));
                }
            }
        }

        let protected = self.immutable_keys().await?;
        let blocked: Vec<String> = updates
            .keys()
            .filter(|k| protected.contains(*k))
            .cloned()
            .collect();
        if !blocked.is_empty() {
            tracing::warn!(keys = ?blocked, op = mutation.as_str(), "Write to immutable settings rejected");
            return Err(SettingsError::Immutable(blocked));
        }

        self.pipeline.apply_updates(&updates, restart).await
    }

    async fn immutable_keys(&self) -> Result<BTreeSet<String>, SettingsError> {
        let handle = self.pipeline.handle();
        let mut keys = handle.store().immutable_keys().await?;
        keys.extend(
            handle
                .snapshot()
                .immutable_keys
                .0
                .iter()
                .map(|k| canonical_key(k)),
        );
        Ok(keys)
    }
}

/// Rewrite field names to aliases. Two spellings of one field in a batch is
/// a validation error.
fn canonicalize(
    updates: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>, SettingsError> {
    let mut canonical = BTreeMap::new();
    let mut duplicates = BTreeMap::new();
    for (key, value) in updates {
        let alias = canonical_key(key);
        if canonical.insert(alias.clone(), value.clone()).is_some() {
            duplicates.insert(alias, "supplied more than once".to_string());
        }
    }
    if duplicates.is_empty() {
        Ok(canonical)
    } else {
        Err(SettingsError::Validation(duplicates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::RestartSignal;
    use crate::settings::model::REDACTED;
    use crate::store::{SettingsStore, SqliteStore};
    use serde_json::json;

    async fn service_with(seed: &[(&str, &str)]) -> (AdminService, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let seed: BTreeMap<String, String> = seed
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if !seed.is_empty() {
            store.write_many(&seed).await.unwrap();
        }
        let dyn_store: Arc<dyn SettingsStore> = store.clone();
        let handle = Arc::new(SettingsHandle::load(dyn_store, BTreeMap::new()).await.unwrap());
        let pipeline = UpdatePipeline::new(handle, None, Arc::new(RestartSignal::new()));
        (AdminService::new(pipeline), store)
    }

    fn body(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let (service, store) = service_with(&[]).await;
        let payload = body(&[("TEST_NEW1", json!("v1")), ("TEST_NEW2", json!("v2"))]);

        let applied = service.create(&payload, false).await.unwrap();
        assert_eq!(applied.values.len(), 2);

        let err = service.create(&payload, false).await.unwrap_err();
        match err {
            SettingsError::Conflict(keys) => assert_eq!(keys, vec!["TEST_NEW1", "TEST_NEW2"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.read_all().await.unwrap()["TEST_NEW1"], "v1");
    }

    #[tokio::test]
    async fn test_bulk_create_is_all_or_nothing() {
        let (service, store) = service_with(&[("EXISTING", "old")]).await;
        let before = store.read_all().await.unwrap();

        let payload = body(&[
            ("A_NEW", json!("1")),
            ("EXISTING", json!("new")),
            ("B_NEW", json!("2")),
        ]);
        let err = service.create(&payload, false).await.unwrap_err();

        assert!(matches!(err, SettingsError::Conflict(ref keys) if keys == &vec!["EXISTING".to_string()]));
        assert_eq!(store.read_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_requires_existing_keys() {
        let (service, store) = service_with(&[("PRESENT", "1")]).await;

        let err = service
            .update(&body(&[("PRESENT", json!("2")), ("ABSENT", json!("x")), ("GONE", json!("y"))]), false)
            .await
            .unwrap_err();
        match err {
            SettingsError::Missing(keys) => assert_eq!(keys, vec!["ABSENT", "GONE"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.read_all().await.unwrap()["PRESENT"], "1");

        let applied = service
            .update(&body(&[("PRESENT", json!("2"))]), false)
            .await
            .unwrap();
        assert_eq!(applied.values["PRESENT"], "2");
    }

    #[tokio::test]
    async fn test_roster_blocks_create_and_update() {
        let (service, store) = service_with(&[("IMMUTABLE_KEYS", "TEST_IMM,LOCKED"), ("LOCKED", "orig")]).await;

        let err = service
            .create(&body(&[("TEST_IMM", json!("orig"))]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Immutable(ref keys) if keys == &vec!["TEST_IMM".to_string()]));
        assert!(!store.read_all().await.unwrap().contains_key("TEST_IMM"));

        let err = service
            .update(&body(&[("LOCKED", json!("changed"))]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Immutable(_)));
        assert_eq!(store.read_all().await.unwrap()["LOCKED"], "orig");
    }

    #[tokio::test]
    async fn test_field_name_spelling_hits_roster() {
        let (service, store) = service_with(&[]).await;
        let before = service.handle().snapshot();

        let err = service
            .create(
                &body(&[("admin_jwt_secret", json!("attacker")), ("immutable_keys", json!(""))]),
                false,
            )
            .await
            .unwrap_err();
        match err {
            SettingsError::Immutable(keys) => {
                assert_eq!(keys, vec!["ADMIN_JWT_SECRET", "IMMUTABLE_KEYS"])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.read_all().await.unwrap().is_empty());
        assert_eq!(service.handle().snapshot(), before);
    }

    #[tokio::test]
    async fn test_field_name_spelling_conflicts_with_alias() {
        let (service, store) = service_with(&[("PORT", "9001")]).await;

        let err = service
            .create(&body(&[("port", json!(9002))]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Conflict(ref keys) if keys == &vec!["PORT".to_string()]));

        let applied = service
            .update(&body(&[("port", json!(9002))]), false)
            .await
            .unwrap();
        assert_eq!(applied.values["PORT"], "9002");
        assert_eq!(store.read_all().await.unwrap()["PORT"], "9002");
        assert!(!store.read_all().await.unwrap().contains_key("port"));
        assert_eq!(service.handle().snapshot().port, 9002);

        let err = service
            .update(&body(&[("port", json!(1)), ("PORT", json!(2))]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_store_flag_blocks_update() {
        let (service, store) = service_with(&[("FROZEN", "orig")]).await;
        store.set_immutable("FROZEN", true).await.unwrap();

        let err = service
            .update(&body(&[("FROZEN", json!("changed"))]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Immutable(_)));
        assert_eq!(store.read_all().await.unwrap()["FROZEN"], "orig");
    }

    #[tokio::test]
    async fn test_validation_errors_after_prechecks() {
        let (service, _) = service_with(&[]).await;
        let err = service
            .create(&body(&[("PORT", json!("abc")), ("LOG_LEVEL", json!("nope"))]), false)
            .await
            .unwrap_err();
        match err {
            SettingsError::Validation(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors["PORT"], "expected an integer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let (service, _) = service_with(&[]).await;
        let err = service.create(&BTreeMap::new(), false).await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_read_views() {
        let (service, _) = service_with(&[("CUSTOM", "'quoted'"), ("PORT", "9001")]).await;

        let all = service.read_all().await.unwrap();
        assert_eq!(all["CUSTOM"], json!("quoted"));
        assert_eq!(all["PORT"], json!(9001));
        assert_eq!(all["LOG_LEVEL"], json!("INFO"));
        assert_eq!(all["ADMIN_JWT_SECRET"], json!(REDACTED));

        assert_eq!(service.read_one("CUSTOM").await.unwrap(), json!("quoted"));
        assert!(matches!(
            service.read_one("NOPE").await,
            Err(SettingsError::NotFound(_))
        ));
    }
}
