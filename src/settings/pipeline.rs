//! Validate → persist → reload → reconfigure logging → request restart.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::handle::SettingsHandle;
use super::validation::validate_all_with;
use crate::error::SettingsError;
use crate::lifecycle::RestartSignal;
use crate::observability::logging::LogReconfigure;

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Canonical values written to the store.
    pub values: BTreeMap<String, String>,
    pub restart_requested: bool,
}

/// Applies validated updates to the store and the live snapshot.
pub struct UpdatePipeline {
    handle: Arc<SettingsHandle>,
    logging: Option<Arc<dyn LogReconfigure>>,
    restart: Arc<RestartSignal>,
}

impl UpdatePipeline {
    pub fn new(
        handle: Arc<SettingsHandle>,
        logging: Option<Arc<dyn LogReconfigure>>,
        restart: Arc<RestartSignal>,
    ) -> Self {
        Self {
            handle,
            logging,
            restart,
        }
    }

    pub fn handle(&self) -> &Arc<SettingsHandle> {
        &self.handle
    }

    pub async fn apply_updates(
        &self,
        updates: &BTreeMap<String, Value>,
        restart: bool,
    ) -> Result<Applied, SettingsError> {
        let store = self.handle.store();
        let validated = validate_all_with(updates, |key, value| store.check_storable(key, value))
            .map_err(SettingsError::Validation)?;

        if let Err(e) = self.handle.store().write_many(&validated).await {
            tracing::error!(
                error = ?e,
                store = %self.handle.store().describe(),
                keys = ?validated.keys().collect::<Vec<_>>(),
                "Failed to persist settings"
            );
            return Err(SettingsError::Persistence(e));
        }

        let settings = match self.handle.reload().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(error = ?e, "Failed to reload settings after write");
                return Err(SettingsError::Persistence(e));
            }
        };

        if let Some(logging) = &self.logging {
            if let Err(e) = logging.reconfigure(&settings) {
                tracing::error!(error = %e, "Failed to reconfigure logging after settings update");
            }
        }

        tracing::info!(keys = ?validated.keys().collect::<Vec<_>>(), restart, "Settings updated");

        if restart {
            tracing::info!("Restart requested to apply settings");
            self.restart.request();
        }

        Ok(Applied {
            values: validated,
            restart_requested: restart,
        })
    }
}
