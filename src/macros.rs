//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. Each expansion
//! owns one static [`CallSite`](crate::CallSite), checks the level before
//! any argument is evaluated and logs to the given logger, or to the
//! [`global`](crate::global) one when the logger is omitted.
//!
//! # Examples
//!
//! ```
//! use rust_logger_core::prelude::*;
//! use rust_logger_core::{error, info};
//!
//! let logger = Logger::new(Configuration::new());
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // With an exception
//! let failure = Throwable::new("io::Error").with_message("connection reset");
//! error!(logger, exception = failure, "Request {} failed", 17);
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($logger:expr, $level:expr, $message:expr, $exception:expr) => {{
        static __CALL_SITE: $crate::CallSite =
            $crate::CallSite::new(::core::module_path!(), ::core::file!(), ::core::line!());
        let logger: &$crate::Logger = &$logger;
        let level: $crate::LogLevel = $level;
        if logger.is_enabled_for(::core::module_path!(), level) {
            logger.log_at(&__CALL_SITE, level, $message, $exception);
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at_level {
    ($level:expr; exception = $ex:expr, $fmt:literal $($rest:tt)*) => {
        $crate::__log_emit!(
            $crate::global(),
            $level,
            ::core::option::Option::Some(::core::format_args!($fmt $($rest)*)),
            ::core::option::Option::Some(::core::borrow::Borrow::<$crate::Throwable>::borrow(&$ex))
        )
    };
    ($level:expr; exception = $ex:expr $(,)?) => {
        $crate::__log_emit!(
            $crate::global(),
            $level,
            ::core::option::Option::None,
            ::core::option::Option::Some(::core::borrow::Borrow::<$crate::Throwable>::borrow(&$ex))
        )
    };
    ($level:expr; $fmt:literal $($rest:tt)*) => {
        $crate::__log_emit!(
            $crate::global(),
            $level,
            ::core::option::Option::Some(::core::format_args!($fmt $($rest)*)),
            ::core::option::Option::None
        )
    };
    ($level:expr; $logger:expr, exception = $ex:expr, $fmt:literal $($rest:tt)*) => {
        $crate::__log_emit!(
            $logger,
            $level,
            ::core::option::Option::Some(::core::format_args!($fmt $($rest)*)),
            ::core::option::Option::Some(::core::borrow::Borrow::<$crate::Throwable>::borrow(&$ex))
        )
    };
    ($level:expr; $logger:expr, exception = $ex:expr $(,)?) => {
        $crate::__log_emit!(
            $logger,
            $level,
            ::core::option::Option::None,
            ::core::option::Option::Some(::core::borrow::Borrow::<$crate::Throwable>::borrow(&$ex))
        )
    };
    ($level:expr; $logger:expr, $fmt:literal $($rest:tt)*) => {
        $crate::__log_emit!(
            $logger,
            $level,
            ::core::option::Option::Some(::core::format_args!($fmt $($rest)*)),
            ::core::option::Option::None
        )
    };
}

/// Log a message at a level chosen at runtime.
///
/// # Examples
///
/// ```
/// # use rust_logger_core::prelude::*;
/// # let logger = Logger::new(Configuration::new());
/// use rust_logger_core::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// log!(LogLevel::Warn, "On the global logger");
/// ```
#[macro_export]
macro_rules! log {
    ($level:expr, exception = $($rest:tt)+) => {
        $crate::__log_at_level!($level; exception = $($rest)+)
    };
    ($level:expr, $fmt:literal $($rest:tt)*) => {
        $crate::__log_at_level!($level; $fmt $($rest)*)
    };
    ($logger:expr, $level:expr, $($rest:tt)+) => {
        $crate::__log_at_level!($level; $logger, $($rest)+)
    };
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use rust_logger_core::prelude::*;
/// # let logger = Logger::new(Configuration::new().with_level(LogLevel::Trace));
/// use rust_logger_core::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {
        $crate::__log_at_level!($crate::LogLevel::Trace; $($arg)+)
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rust_logger_core::prelude::*;
/// # let logger = Logger::new(Configuration::new());
/// use rust_logger_core::debug;
/// debug!(logger, "Debug information");
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::__log_at_level!($crate::LogLevel::Debug; $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_logger_core::prelude::*;
/// # let logger = Logger::new(Configuration::new());
/// use rust_logger_core::info;
/// info!(logger, "Application started");
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::__log_at_level!($crate::LogLevel::Info; $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use rust_logger_core::prelude::*;
/// # let logger = Logger::new(Configuration::new());
/// use rust_logger_core::warn;
/// warn!(logger, "Low disk space");
/// warn!(logger, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::__log_at_level!($crate::LogLevel::Warn; $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_logger_core::prelude::*;
/// # let logger = Logger::new(Configuration::new());
/// use rust_logger_core::error;
/// error!(logger, "Failed to connect to database");
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::__log_at_level!($crate::LogLevel::Error; $($arg)+)
    };
}

/// Whether a level is enabled for the calling module.
///
/// # Examples
///
/// ```
/// # use rust_logger_core::prelude::*;
/// use rust_logger_core::enabled;
/// let logger = Logger::new(Configuration::new().with_level(LogLevel::Warn));
/// assert!(!enabled!(logger, LogLevel::Info));
/// assert!(enabled!(logger, LogLevel::Error));
/// ```
#[macro_export]
macro_rules! enabled {
    ($level:expr) => {
        $crate::global().is_enabled_for(::core::module_path!(), $level)
    };
    ($logger:expr, $level:expr) => {{
        let logger: &$crate::Logger = &$logger;
        logger.is_enabled_for(::core::module_path!(), $level)
    }};
}
