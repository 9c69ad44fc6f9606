//! Operational logging for the link layer.
//!
//! This is separate from the mandated JSONL *event* log
//! (`crate::runtime::logging::JsonlLogger`), which is a data product
//! consumed by offline metrics. This module is for operators: retries,
//! manifest mismatches, and parse failures surfaced via the standard `log`
//! facade.

use log::{debug, error, info, log_enabled, warn, Level};

/// Initialises the process-wide logger via `env_logger`.
///
/// Call once at process start. Idempotent calls after the first are
/// harmless no-ops (`env_logger::try_init` swallows the "already
/// initialized" error).
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// Logs an error-level message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning-level message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an info-level message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug-level message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}
