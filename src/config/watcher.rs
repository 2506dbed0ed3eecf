//! File store watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself because the
//! file store replaces its file by rename, which drops a per-file watch.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::observability::LogReconfigure;
use crate::settings::SettingsHandle;

/// Reloads the settings snapshot when the store file changes on disk.
pub struct StoreWatcher {
    path: PathBuf,
    handle: Arc<SettingsHandle>,
    logging: Option<Arc<dyn LogReconfigure>>,
}

impl StoreWatcher {
    pub fn new(
        path: &Path,
        handle: Arc<SettingsHandle>,
        logging: Option<Arc<dyn LogReconfigure>>,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            handle,
            logging,
        }
    }

    /// Start watching. Dropping the returned watcher stops it.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let file_name: Option<OsString> = self.path.file_name().map(OsString::from);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify() || event.kind.is_create();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(OsString::from) == file_name);
                    if relevant && ours {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Store watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let handle = self.handle;
        let logging = self.logging;
        let path = self.path;
        tracing::info!(path = %path.display(), "Store watcher started");

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Collapse bursts from a single save.
                while rx.try_recv().is_ok() {}

                match handle.reload().await {
                    Ok(settings) => {
                        tracing::info!(path = %path.display(), "Settings reloaded from store file");
                        if let Some(logging) = &logging {
                            if let Err(e) = logging.reconfigure(&settings) {
                                tracing::error!(error = %e, "Failed to reconfigure logging after reload");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload settings. Keeping current snapshot.");
                    }
                }
            }
        });

        Ok(watcher)
    }
}
