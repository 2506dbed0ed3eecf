//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Exit
//!
//! Restart (restart.rs):
//!     Settings update with ?restart=true → RestartSignal::request
//!     → graceful shutdown → flush logs → exit(RESTART_EXIT_CODE)
//!     → supervisor starts a fresh process
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod restart;
pub mod shutdown;
pub mod signals;

pub use restart::{RestartSignal, RESTART_EXIT_CODE};
pub use shutdown::Shutdown;
