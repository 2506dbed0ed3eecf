//! Structured logging setup and runtime reconfiguration.
//!
//! The level filter sits behind a `reload` handle. The file layer writes
//! through a swappable non-blocking writer, so a new path, rotation or
//! retention takes effect on the next event.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::settings::model::{Rotation, Settings};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to reload log filter: {0}")]
    Reload(String),

    #[error("cannot open log file {path}: {reason}")]
    File { path: String, reason: String },

    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Applies new settings to an initialized logging subsystem.
pub trait LogReconfigure: Send + Sync {
    fn reconfigure(&self, settings: &Settings) -> Result<(), LoggingError>;
}

/// Handle to the live log filter and file output.
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    files: Arc<FileOutput>,
}

/// Flushes buffered file output when dropped.
pub struct LoggingGuard {
    files: Arc<FileOutput>,
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        self.files.flush();
    }
}

/// File settings that require a new appender when they change.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileTarget {
    path: String,
    rotation: Rotation,
    retention: usize,
}

impl FileTarget {
    fn of(settings: &Settings) -> Self {
        Self {
            path: settings.log_file_path.clone(),
            rotation: settings.log_file_rotation,
            retention: settings.log_file_retention,
        }
    }
}

/// `MakeWriter` for the file layer. Writes are dropped while no file is open.
#[derive(Clone, Default)]
struct FileSink {
    current: Arc<ArcSwapOption<NonBlocking>>,
}

struct SinkWriter(Option<NonBlocking>);

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.0 {
            Some(writer) => writer.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for FileSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter(self.current.load_full().map(|writer| (*writer).clone()))
    }
}

#[derive(Default)]
struct FileState {
    target: Option<FileTarget>,
    guard: Option<WorkerGuard>,
}

/// Log file output that can be pointed at another file while running.
#[derive(Default)]
struct FileOutput {
    sink: FileSink,
    state: Mutex<FileState>,
}

impl FileOutput {
    fn writer(&self) -> FileSink {
        self.sink.clone()
    }

    /// Open the file named by `settings` unless it is already the target.
    ///
    /// Returns whether the sink changed. On error the previous sink stays.
    fn apply(&self, settings: &Settings) -> Result<bool, LoggingError> {
        let target = FileTarget::of(settings);
        let mut state = self
            .state
            .lock()
            .map_err(|_| LoggingError::Reload("file output lock poisoned".to_string()))?;
        if state.target.as_ref() == Some(&target) {
            return Ok(false);
        }

        let (writer, guard) = tracing_appender::non_blocking(file_appender(settings)?);
        self.sink.current.store(Some(Arc::new(writer)));
        // Dropping the old guard flushes what was queued for the old file.
        let previous = state.guard.replace(guard);
        state.target = Some(target);
        drop(previous);
        Ok(true)
    }

    fn flush(&self) {
        self.sink.current.store(None);
        if let Ok(mut state) = self.state.lock() {
            state.guard.take();
            state.target = None;
        }
    }
}

fn filter_for(settings: &Settings) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(format!(
        "{},sqlx=warn,hyper=info",
        settings.log_level.as_filter()
    ))
    .map_err(|e| LoggingError::Filter(e.to_string()))
}

fn file_appender(settings: &Settings) -> Result<RollingFileAppender, LoggingError> {
    let path = Path::new(&settings.log_file_path);
    let file_error = |reason: String| LoggingError::File {
        path: settings.log_file_path.clone(),
        reason,
    };

    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| file_error("path has no file name".to_string()))?;

    std::fs::create_dir_all(directory).map_err(|e| file_error(e.to_string()))?;

    let rotation = match settings.log_file_rotation {
        Rotation::Never => rolling::Rotation::NEVER,
        Rotation::Minutely => rolling::Rotation::MINUTELY,
        Rotation::Hourly => rolling::Rotation::HOURLY,
        Rotation::Daily => rolling::Rotation::DAILY,
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .max_log_files(settings.log_file_retention)
        .build(directory)
        .map_err(|e| file_error(e.to_string()))
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `LOG_LEVEL` until the first
/// reconfigure. A log file that cannot be opened is reported and skipped; a
/// later reconfigure with a usable path enables it.
pub fn init(settings: &Settings) -> Result<(LoggingHandle, LoggingGuard), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(settings)?,
    };
    let (filter, handle) = reload::Layer::new(filter);

    let files = Arc::new(FileOutput::default());
    let file_error = files.apply(settings).err();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(files.writer()).with_ansi(false))
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "File logging disabled");
    }
    tracing::info!(
        level = ?settings.log_level,
        file = %settings.log_file_path,
        rotation = ?settings.log_file_rotation,
        "Logging initialized"
    );

    Ok((
        LoggingHandle {
            filter: handle,
            files: files.clone(),
        },
        LoggingGuard { files },
    ))
}

impl LogReconfigure for LoggingHandle {
    fn reconfigure(&self, settings: &Settings) -> Result<(), LoggingError> {
        let filter = filter_for(settings).and_then(|filter| {
            self.filter
                .reload(filter)
                .map_err(|e| LoggingError::Reload(e.to_string()))
        });
        let file = self.files.apply(settings);

        filter?;
        if file? {
            tracing::info!(
                file = %settings.log_file_path,
                rotation = ?settings.log_file_rotation,
                retention = settings.log_file_retention,
                "Log file output switched"
            );
        }
        tracing::debug!(level = ?settings.log_level, "Log level reconfigured");
        Ok(())
    }
}
