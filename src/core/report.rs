//! Operator-visible channel for problems of the logger itself
//!
//! Configuration mistakes and failing writers must never surface at the
//! application's call sites. They are handed to an [`ErrorReporter`] instead.

use super::log_level::LogLevel;
use std::sync::Arc;

/// Receives internal warnings and errors of the logging core
pub trait ErrorReporter: Send + Sync {
    fn report(&self, level: LogLevel, message: &str);
}

/// Default reporter: tagged lines on standard error
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&self, level: LogLevel, message: &str) {
        eprintln!("[LOGGER {}] {}", level, message);
    }
}

/// Shared handle used by the logger, writers and worker threads
pub type SharedReporter = Arc<dyn ErrorReporter>;

pub(crate) fn default_reporter() -> SharedReporter {
    Arc::new(StderrReporter)
}
