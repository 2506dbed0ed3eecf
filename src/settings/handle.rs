//! Live settings snapshot shared by every request.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::model::{Settings, SettingsSources};
use crate::store::{SettingsStore, StoreError};

/// Owner of the current `Settings` snapshot and the store it comes from.
///
/// Readers take an `Arc<Settings>` and keep a consistent view even while a
/// reload swaps in a newer snapshot.
pub struct SettingsHandle {
    store: Arc<dyn SettingsStore>,
    env: BTreeMap<String, String>,
    current: ArcSwap<Settings>,
}

impl SettingsHandle {
    /// Build the first snapshot from the store and captured environment.
    pub async fn load(
        store: Arc<dyn SettingsStore>,
        env: BTreeMap<String, String>,
    ) -> Result<Self, StoreError> {
        let values = store.read_all().await?;
        let settings = Settings::initialize(&SettingsSources {
            env: env.clone(),
            store: values,
        });
        Ok(Self {
            store,
            env,
            current: ArcSwap::from_pointee(settings),
        })
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Re-read the store and swap in a fresh snapshot.
    pub async fn reload(&self) -> Result<Arc<Settings>, StoreError> {
        let values = self.store.read_all().await?;
        let settings = Arc::new(Settings::initialize(&SettingsSources {
            env: self.env.clone(),
            store: values,
        }));
        self.current.store(settings.clone());
        tracing::debug!(store = %self.store.describe(), "Settings reloaded");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "PORT=9001\n").unwrap();

        let store: Arc<dyn SettingsStore> = Arc::new(FileStore::new(&path));
        let env = BTreeMap::from([("HOST".to_string(), "127.0.0.1".to_string())]);
        let handle = SettingsHandle::load(store.clone(), env).await.unwrap();

        let before = handle.snapshot();
        assert_eq!(before.port, 9001);
        assert_eq!(before.host, "127.0.0.1");

        let updates = BTreeMap::from([("PORT".to_string(), "9002".to_string())]);
        store.write_many(&updates).await.unwrap();
        let after = handle.reload().await.unwrap();

        assert_eq!(after.port, 9002);
        assert_eq!(handle.snapshot().port, 9002);
        assert_eq!(handle.snapshot().host, "127.0.0.1");
        // Earlier readers keep their own consistent view.
        assert_eq!(before.port, 9001);
    }
}
