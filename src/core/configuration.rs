//! Configuration values and the snapshots built from them
//!
//! A [`Configuration`] is plain data produced by whatever loads settings
//! (files, environment, code). Activating it compiles everything once into a
//! [`ConfigurationSnapshot`]: level rules, patterns, writers and their
//! dispatch targets. Log calls only ever read a complete snapshot.

use super::dispatcher::{Dispatcher, Target};
use super::fields::RequiredFields;
use super::level_registry::LevelRegistry;
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::pattern::{CompiledPattern, DEFAULT_FORMAT};
use super::report::SharedReporter;
use super::timestamp::parse_locale;
use crate::writers::{WriterContext, WriterOptions, WriterRegistry};
use chrono::Locale;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Frames printed per exception unless configured otherwise
pub const DEFAULT_MAX_STACK_DEPTH: usize = 40;

/// Capacity of each writer queue in asynchronous mode
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Options the core interprets itself; everything else belongs to the writer
const OPTION_LEVEL: &str = "level";
const OPTION_ASYNC: &str = "async";
const OPTION_FORMAT: &str = "format";

/// One configured writer: a registered name plus its options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterSpec {
    pub name: String,
    #[serde(default)]
    pub options: WriterOptions,
}

impl WriterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Complete logging configuration
///
/// # Example
///
/// ```
/// use rust_logger_core::core::{Configuration, LogLevel, WriterSpec};
///
/// let configuration = Configuration::new()
///     .with_level(LogLevel::Warn)
///     .with_level_for("app::net", LogLevel::Debug)
///     .with_format("{level}: {message}")
///     .with_writer(WriterSpec::new("console").with_option("stream", "err"));
///
/// assert_eq!(configuration.levels.get("app::net"), Some(&LogLevel::Debug));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub default_level: LogLevel,
    /// Module path prefix to level
    pub levels: BTreeMap<String, LogLevel>,
    /// Pattern for writers without their own `format` option
    pub format: String,
    /// Locale tag for date rendering, e.g. `de_DE`
    pub locale: Option<String>,
    /// Frames per exception, `None` for unlimited
    pub max_stack_depth: Option<usize>,
    /// Hand records to a background thread per writer
    pub writing_thread: bool,
    pub queue_capacity: usize,
    /// Writers to create; a console writer is used when empty
    pub writers: Vec<WriterSpec>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            levels: BTreeMap::new(),
            format: DEFAULT_FORMAT.to_string(),
            locale: None,
            max_stack_depth: Some(DEFAULT_MAX_STACK_DEPTH),
            writing_thread: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            writers: Vec::new(),
        }
    }
}

impl Configuration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Level for a module path and everything below it
    #[must_use = "builder methods return a new value"]
    pub fn with_level_for(mut self, prefix: impl Into<String>, level: LogLevel) -> Self {
        self.levels.insert(prefix.into(), level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Negative values mean unlimited
    #[must_use = "builder methods return a new value"]
    pub fn with_max_stack_depth(mut self, depth: i64) -> Self {
        self.max_stack_depth = usize::try_from(depth).ok();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_writing_thread(mut self, enabled: bool) -> Self {
        self.writing_thread = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_writer(mut self, writer: WriterSpec) -> Self {
        self.writers.push(writer);
        self
    }
}

/// Immutable result of activating a [`Configuration`]
pub struct ConfigurationSnapshot {
    configuration: Configuration,
    levels: LevelRegistry,
    dispatcher: Dispatcher,
    /// Union of required fields of the writers accepting each level
    fields_by_level: [RequiredFields; 5],
}

impl ConfigurationSnapshot {
    /// Compile `configuration`. Invalid parts are reported and replaced by
    /// defaults or skipped; building never fails.
    pub(crate) fn build(
        configuration: Configuration,
        registry: &WriterRegistry,
        reporter: &SharedReporter,
        metrics: &Arc<LoggerMetrics>,
    ) -> Self {
        let levels = LevelRegistry::new(
            configuration.default_level,
            configuration
                .levels
                .iter()
                .map(|(prefix, level)| (prefix.clone(), *level)),
        );

        let locale = match configuration.locale.as_deref() {
            Some(tag) => parse_locale(tag).unwrap_or_else(|message| {
                reporter.report(LogLevel::Error, &message);
                Locale::POSIX
            }),
            None => Locale::POSIX,
        };

        let default_pattern = compile_or_default(&configuration.format, locale, reporter);

        let console_only;
        let specs: &[WriterSpec] = if configuration.writers.is_empty() {
            console_only = [WriterSpec::new("console")];
            &console_only
        } else {
            &configuration.writers
        };

        let mut targets = Vec::with_capacity(specs.len());
        for spec in specs {
            let pattern = match spec.options.get(OPTION_FORMAT) {
                Some(format) => compile_or_default(format, locale, reporter),
                None => default_pattern.clone(),
            };

            let level = match spec.options.get(OPTION_LEVEL) {
                Some(value) => value.parse::<LogLevel>().unwrap_or_else(|message| {
                    reporter.report(
                        LogLevel::Error,
                        &format!("Writer '{}': {}", spec.name, message),
                    );
                    LogLevel::Trace
                }),
                None => LogLevel::Trace,
            };

            let queued = match spec.options.get(OPTION_ASYNC) {
                Some(value) => parse_flag(value).unwrap_or_else(|| {
                    reporter.report(
                        LogLevel::Error,
                        &format!("Writer '{}': invalid async flag '{}'", spec.name, value),
                    );
                    configuration.writing_thread
                }),
                None => configuration.writing_thread,
            };

            let context = WriterContext {
                pattern,
                reporter: Arc::clone(reporter),
                metrics: Arc::clone(metrics),
            };

            match registry.create(&spec.name, &spec.options, &context) {
                Ok(writer) => targets.push(Target {
                    level,
                    queued,
                    writer,
                }),
                Err(e) => reporter.report(LogLevel::Error, &e.to_string()),
            }
        }

        let dispatcher = Dispatcher::new(
            targets,
            configuration.queue_capacity.max(1),
            Arc::clone(reporter),
            Arc::clone(metrics),
        );

        let mut fields_by_level = [RequiredFields::empty(); 5];
        for level in LogLevel::EMITTABLE {
            if let Some(idx) = level.index() {
                fields_by_level[idx] = dispatcher.required_fields(level);
            }
        }

        Self {
            configuration,
            levels,
            dispatcher,
            fields_by_level,
        }
    }

    /// Snapshot that accepts nothing; installed by shutdown
    pub(crate) fn disabled(reporter: &SharedReporter, metrics: &Arc<LoggerMetrics>) -> Self {
        let configuration = Configuration::new().with_level(LogLevel::Off);
        Self {
            levels: LevelRegistry::new(LogLevel::Off, std::iter::empty::<(String, LogLevel)>()),
            dispatcher: Dispatcher::new(
                Vec::new(),
                DEFAULT_QUEUE_CAPACITY,
                Arc::clone(reporter),
                Arc::clone(metrics),
            ),
            fields_by_level: [RequiredFields::empty(); 5],
            configuration,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn levels(&self) -> &LevelRegistry {
        &self.levels
    }

    pub fn max_stack_depth(&self) -> Option<usize> {
        self.configuration.max_stack_depth
    }

    /// Fields to fill for a record at `level`; empty when no writer accepts it
    #[inline]
    pub fn required_fields(&self, level: LogLevel) -> RequiredFields {
        level
            .index()
            .map_or(RequiredFields::empty(), |idx| self.fields_by_level[idx])
    }

    /// Whether at least one writer accepts `level`
    #[inline]
    pub fn accepts(&self, level: LogLevel) -> bool {
        self.dispatcher.accepts(level)
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Compile `format`, falling back to [`DEFAULT_FORMAT`] after reporting the error
pub fn compile_or_default(
    format: &str,
    locale: Locale,
    reporter: &SharedReporter,
) -> CompiledPattern {
    match CompiledPattern::compile_with_locale(format, locale) {
        Ok(pattern) => pattern,
        Err(e) => {
            reporter.report(LogLevel::Error, &e.to_string());
            CompiledPattern::fallback(locale)
        }
    }
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
