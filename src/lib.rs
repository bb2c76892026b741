//! # Rust Logger Core
//!
//! An embeddable logging core: level-tagged calls are gated by prefix
//! rules, filled with only the record fields the active writers need and
//! dispatched to pluggable writers, directly or through writing threads.
//!
//! ## Features
//!
//! - **Cheap when disabled**: the level gate runs before any formatting
//! - **Compiled patterns**: `{date:%H:%M} {level} {class}.{method}(): {message}`
//! - **Caller resolution**: per-call-site cached stack offsets
//! - **Writers**: console, file, rolling file and JSON lines, looked up by name
//! - **Atomic reconfiguration**: every call sees one complete snapshot
//!
//! ```
//! use rust_logger_core::prelude::*;
//! use rust_logger_core::info;
//!
//! let logger = Logger::new(
//!     Configuration::new()
//!         .with_level(LogLevel::Debug)
//!         .with_format("{level}: {message}")
//!         .with_writer(WriterSpec::new("console").with_option("stream", "err")),
//! );
//! info!(logger, "ready after {} ms", 12);
//! ```

pub mod core;
pub mod macros;
pub mod writers;

use std::sync::OnceLock;

pub mod prelude {
    pub use crate::core::{
        CallSite, Configuration, ErrorReporter, LogLevel, LogRecord, Logger, LoggerBuilder,
        LoggerError, LoggerMetrics, RequiredFields, Result, StackFrame, Throwable, Writer,
        WriterSpec, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::writers::{WriterContext, WriterOptions, WriterRegistry};
}

pub use crate::core::{
    CallSite, CallerResolver, CompiledPattern, Configuration, ConfigurationSnapshot,
    ErrorReporter, LogLevel, LogRecord, Logger, LoggerBuilder, LoggerError, LoggerMetrics,
    MetricsSnapshot, RequiredFields, Result, StackFrame, StderrReporter, Throwable, Writer,
    WriterSpec, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::writers::WriterRegistry;

/// The process-wide logger used by macros without a logger argument.
///
/// Starts with the default configuration (INFO and above on the console).
/// It is never dropped; call [`Logger::flush`] or [`Logger::shutdown`]
/// before the process exits when writers buffer.
pub fn global() -> &'static Logger {
    static GLOBAL: OnceLock<Logger> = OnceLock::new();
    GLOBAL.get_or_init(Logger::default)
}

/// Reconfigure the [`global`] logger
pub fn activate(configuration: Configuration) {
    global().activate(configuration);
}
