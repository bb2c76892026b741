//! Core logger types and traits

pub mod caller;
pub mod configuration;
pub mod dispatcher;
pub mod error;
pub mod fields;
pub mod level_registry;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod pattern;
pub mod report;
pub mod throwable;
pub mod timestamp;
pub mod writer;

pub use caller::{
    BacktraceSource, CallSite, CallerResolver, FrameOffset, FrameSource, UNAVAILABLE,
};
pub use configuration::{
    Configuration, ConfigurationSnapshot, WriterSpec, DEFAULT_MAX_STACK_DEPTH,
    DEFAULT_QUEUE_CAPACITY,
};
pub use dispatcher::DEFAULT_SHUTDOWN_TIMEOUT;
pub use error::{LoggerError, Result};
pub use fields::RequiredFields;
pub use level_registry::LevelRegistry;
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use logger::{Logger, LoggerBuilder};
pub use metrics::{LoggerMetrics, MetricsSnapshot};
pub use pattern::{CompiledPattern, Token, DEFAULT_FORMAT};
pub use report::{ErrorReporter, SharedReporter, StderrReporter};
pub use throwable::{StackFrame, Throwable, MAX_CAUSE_DEPTH, NEW_LINE};
pub use timestamp::{DateFormat, DEFAULT_DATE_FORMAT};
pub use writer::Writer;
