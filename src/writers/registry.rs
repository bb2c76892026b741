//! Name-to-constructor registry for writers
//!
//! Configurations refer to writers by name (`"console"`, `"rolling file"`,
//! ...). The registry maps each name to a factory that builds the writer
//! from its options, so new sink types plug in without touching the core.

use crate::core::error::{LoggerError, Result};
use crate::core::metrics::LoggerMetrics;
use crate::core::pattern::CompiledPattern;
use crate::core::report::SharedReporter;
use crate::core::writer::Writer;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Writer-specific options of a configured writer
pub type WriterOptions = BTreeMap<String, String>;

/// Everything the core resolved for a writer before creating it
#[derive(Clone)]
pub struct WriterContext {
    /// The writer's `format` option or the configuration format, compiled
    pub pattern: CompiledPattern,
    /// Where writers report configuration and rotation problems
    pub reporter: SharedReporter,
    pub metrics: Arc<LoggerMetrics>,
}

pub type WriterFactory = fn(&WriterOptions, &WriterContext) -> Result<Box<dyn Writer>>;

/// Registered writer factories by name
///
/// # Example
///
/// ```
/// use rust_logger_core::writers::WriterRegistry;
///
/// let registry = WriterRegistry::with_defaults();
/// assert!(registry.contains("console"));
/// assert!(registry.contains("rolling file"));
/// assert!(!registry.contains("syslog"));
/// ```
#[derive(Clone, Default)]
pub struct WriterRegistry {
    factories: HashMap<String, WriterFactory>,
}

impl WriterRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the console, file, rolling file and JSON writers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("console", console);
        registry.register("file", file);
        registry.register("rolling file", rolling_file);
        registry.register("json", json);
        registry
    }

    /// Register `factory` under `name`, returning the factory it replaces
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: WriterFactory,
    ) -> Option<WriterFactory> {
        self.factories.insert(name.into(), factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn create(
        &self,
        name: &str,
        options: &WriterOptions,
        context: &WriterContext,
    ) -> Result<Box<dyn Writer>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| LoggerError::unknown_writer(name))?;
        factory(options, context)
    }
}

fn console(options: &WriterOptions, context: &WriterContext) -> Result<Box<dyn Writer>> {
    Ok(Box::new(super::ConsoleWriter::from_options(options, context)?))
}

fn file(options: &WriterOptions, context: &WriterContext) -> Result<Box<dyn Writer>> {
    Ok(Box::new(super::FileWriter::from_options(options, context)?))
}

fn rolling_file(options: &WriterOptions, context: &WriterContext) -> Result<Box<dyn Writer>> {
    Ok(Box::new(super::RollingFileWriter::from_options(options, context)?))
}

fn json(options: &WriterOptions, context: &WriterContext) -> Result<Box<dyn Writer>> {
    Ok(Box::new(super::JsonWriter::from_options(options, context)?))
}

/// Value of a mandatory option
pub(crate) fn required_option<'a>(
    options: &'a WriterOptions,
    writer: &str,
    key: &str,
) -> Result<&'a str> {
    options
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            LoggerError::config(
                format!("{} writer", writer),
                format!("missing '{}' option", key),
            )
        })
}

/// Boolean option with a default for when it is absent
pub(crate) fn flag_option(
    options: &WriterOptions,
    writer: &str,
    key: &str,
    default: bool,
) -> Result<bool> {
    match options.get(key) {
        Some(value) => crate::core::configuration::parse_flag(value).ok_or_else(|| {
            LoggerError::config(
                format!("{} writer", writer),
                format!("invalid value '{}' for '{}'", value, key),
            )
        }),
        None => Ok(default),
    }
}
