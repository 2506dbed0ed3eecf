//! Restart requests after a settings update.
//!
//! The process never replaces itself. It stops serving and exits with
//! `RESTART_EXIT_CODE`; the supervisor (systemd, a container runtime, a
//! wrapper script) is expected to start it again.

use std::sync::atomic::{AtomicBool, Ordering};

use super::shutdown::Shutdown;

/// Exit status telling the supervisor to start the service again (EX_TEMPFAIL).
pub const RESTART_EXIT_CODE: i32 = 75;

/// Shared flag plus the shutdown trigger it fires.
pub struct RestartSignal {
    requested: AtomicBool,
    shutdown: Shutdown,
}

impl RestartSignal {
    pub fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            shutdown: Shutdown::new(),
        }
    }

    /// Mark a restart as requested and begin graceful shutdown.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.shutdown.trigger();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }
}

impl Default for RestartSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_triggers_shutdown() {
        let signal = RestartSignal::new();
        let mut rx = signal.shutdown().subscribe();
        assert!(!signal.is_requested());

        signal.request();

        assert!(signal.is_requested());
        assert!(rx.recv().await.is_ok());
    }
}
