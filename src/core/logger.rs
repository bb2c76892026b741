//! Main logger implementation

use super::{
    caller::{split_function_path, CallSite, CallerResolver, FrameSource, UNAVAILABLE},
    configuration::{Configuration, ConfigurationSnapshot},
    dispatcher::DEFAULT_SHUTDOWN_TIMEOUT,
    fields::RequiredFields,
    log_level::LogLevel,
    log_record::{current_thread, LogRecord},
    metrics::LoggerMetrics,
    report::{default_reporter, ErrorReporter, SharedReporter},
    throwable::{self, StackFrame, Throwable},
};
use crate::writers::WriterRegistry;
use chrono::Local;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

/// Logging front end: gates calls, fills records and hands them to the
/// writers of the active [`ConfigurationSnapshot`].
///
/// Reconfiguration swaps the whole snapshot, so every call observes one
/// consistent set of level rules, patterns and writers.
pub struct Logger {
    snapshot: RwLock<Arc<ConfigurationSnapshot>>,
    registry: WriterRegistry,
    resolver: CallerResolver,
    reporter: SharedReporter,
    /// Metrics for observability (dropped count, total logged, etc.)
    metrics: Arc<LoggerMetrics>,
}

/// Caller frame, resolved at most once per call
struct Caller<'a> {
    resolver: &'a CallerResolver,
    site: &'a CallSite,
    frame: Option<Option<StackFrame>>,
}

impl Caller<'_> {
    /// Only called directly from `Logger::log_at`: cached frame positions
    /// rely on the stack depth between the capture and the caller being fixed.
    #[inline(never)]
    fn resolve(&mut self) {
        if self.frame.is_none() {
            self.frame = Some(self.resolver.resolve(self.site));
        }
    }

    /// Owning path and function name of the caller
    fn split(&self) -> (Cow<'static, str>, Cow<'static, str>) {
        match self.frame.as_ref().and_then(Option::as_ref) {
            Some(frame) => split_function_path(&frame.function),
            None => (Cow::Borrowed(UNAVAILABLE), Cow::Borrowed(UNAVAILABLE)),
        }
    }

    fn class(&self) -> Cow<'static, str> {
        match self.site.module_path() {
            Some(path) => Cow::Borrowed(path),
            None => self.split().0,
        }
    }
}

impl Logger {
    /// Logger with the default writers, activated with `configuration`
    #[must_use]
    pub fn new(configuration: Configuration) -> Self {
        Self::builder().configuration(configuration).build()
    }

    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use rust_logger_core::prelude::*;
    ///
    /// let logger = Logger::builder()
    ///     .configuration(Configuration::new().with_level(LogLevel::Debug))
    ///     .build();
    /// assert!(logger.is_enabled(LogLevel::Debug));
    /// ```
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Compile `configuration` and make it current.
    ///
    /// Invalid parts are reported and replaced by defaults. The previous
    /// snapshot drains its queues and closes its writers once the last call
    /// still using it has finished.
    pub fn activate(&self, configuration: Configuration) {
        let snapshot = Arc::new(ConfigurationSnapshot::build(
            configuration,
            &self.registry,
            &self.reporter,
            &self.metrics,
        ));

        let previous = std::mem::replace(&mut *self.snapshot.write(), snapshot);
        // Retire outside the lock so logging threads are not held up
        drop(previous);
    }

    /// The active snapshot
    pub fn snapshot(&self) -> Arc<ConfigurationSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// The configuration of the active snapshot
    pub fn configuration(&self) -> Configuration {
        self.snapshot.read().configuration().clone()
    }

    /// Whether `level` may produce output for some caller
    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        let snapshot = self.snapshot.read();
        snapshot.accepts(level) && snapshot.levels().may_be_enabled(level)
    }

    /// Whether `level` produces output for callers under `class`
    #[inline]
    pub fn is_enabled_for(&self, class: &str, level: LogLevel) -> bool {
        let snapshot = self.snapshot.read();
        snapshot.accepts(level) && snapshot.levels().is_enabled(class, level)
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        if !self.is_enabled(level) {
            return;
        }
        let site = self.resolver.site_for(Location::caller());
        self.log_at(&site, level, Some(format_args!("{}", message)), None);
    }

    /// Log an exception with an accompanying message
    #[track_caller]
    pub fn log_exception(
        &self,
        level: LogLevel,
        exception: &Throwable,
        message: impl fmt::Display,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        let site = self.resolver.site_for(Location::caller());
        self.log_at(&site, level, Some(format_args!("{}", message)), Some(exception));
    }

    /// Log an error and its `source()` chain as an exception
    #[track_caller]
    pub fn log_error<E: Error + 'static>(&self, level: LogLevel, error: &E) {
        if !self.is_enabled(level) {
            return;
        }
        let site = self.resolver.site_for(Location::caller());
        self.log_at(&site, level, None, Some(&Throwable::from_error(error)));
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, message: impl fmt::Display) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }

    /// Entry point of the logging macros
    #[doc(hidden)]
    pub fn log_at(
        &self,
        site: &CallSite,
        level: LogLevel,
        message: Option<fmt::Arguments<'_>>,
        exception: Option<&Throwable>,
    ) {
        let snapshot = self.snapshot();
        if !snapshot.accepts(level) {
            return;
        }

        let mut caller = Caller {
            resolver: &self.resolver,
            site,
            frame: None,
        };

        let levels = snapshot.levels();
        let enabled = if levels.is_uniform() {
            level >= levels.default_level()
        } else {
            // Without a module path the class comes from the stack
            if site.module_path().is_none() {
                caller.resolve();
            }
            let class = caller.class();
            levels.is_enabled(&class, level)
        };
        if !enabled {
            return;
        }

        let fields = snapshot.required_fields(level);
        let mut record = LogRecord::new(level);

        if fields.contains(RequiredFields::METHOD)
            || (fields.contains(RequiredFields::CLASS) && site.module_path().is_none())
        {
            caller.resolve();
        }

        if fields.contains(RequiredFields::DATE) {
            record.timestamp = Some(Local::now());
        }
        if fields.contains(RequiredFields::THREAD) {
            record.thread = Some(current_thread());
        }
        if fields.contains(RequiredFields::CLASS) {
            record.class = Some(caller.class());
        }
        if fields.contains(RequiredFields::METHOD) {
            record.method = Some(caller.split().1);
        }
        if fields.contains(RequiredFields::FILE) {
            record.file = Some(site.file());
        }
        if fields.contains(RequiredFields::LINE) {
            record.line = Some(site.line());
        }
        if fields.contains(RequiredFields::MESSAGE) {
            record.message = message.map(|args| match args.as_str() {
                Some(text) => text.to_string(),
                None => args.to_string(),
            });
        }
        if fields.contains(RequiredFields::EXCEPTION) {
            record.exception =
                exception.map(|t| throwable::render(t, snapshot.max_stack_depth()));
        }

        snapshot.dispatcher().dispatch(record);
    }

    /// Flush all writers of the active snapshot.
    ///
    /// Returns once everything logged before the call has been written.
    pub fn flush(&self) {
        self.snapshot().dispatcher().flush();
    }

    /// Gracefully shutdown the logger with a custom timeout
    ///
    /// Pending records are written, then every writer is closed. Later calls
    /// are discarded until [`activate`](Self::activate) is called again.
    ///
    /// **Note**: Replacing or dropping a snapshot waits up to
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`] for its writers.
    ///
    /// # Returns
    ///
    /// `true` if shutdown completed successfully within timeout, `false` otherwise
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_logger_core::prelude::*;
    /// use std::time::Duration;
    ///
    /// let logger = Logger::new(Configuration::new().with_writing_thread(true));
    /// logger.info("Important message");
    ///
    /// if !logger.shutdown(Duration::from_secs(10)) {
    ///     eprintln!("Warning: Some logs may not have been written");
    /// }
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let disabled = Arc::new(ConfigurationSnapshot::disabled(&self.reporter, &self.metrics));
        let previous = std::mem::replace(&mut *self.snapshot.write(), disabled);
        previous.dispatcher().shutdown(timeout)
    }

    /// Get the logger metrics for detailed observability
    ///
    /// # Example
    ///
    /// ```
    /// use rust_logger_core::prelude::*;
    ///
    /// let logger = Logger::new(Configuration::new().with_level(LogLevel::Off));
    ///
    /// logger.error("not accepted by any writer");
    ///
    /// let snapshot = logger.metrics().snapshot();
    /// assert_eq!(snapshot.logged, 0);
    /// println!("Drop rate: {:.2}%", snapshot.drop_rate());
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// The registry this logger creates writers from
    pub fn registry(&self) -> &WriterRegistry {
        &self.registry
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        // Graceful shutdown with default timeout
        let _ = self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

/// Builder for Logger with fluent API
pub struct LoggerBuilder {
    configuration: Configuration,
    registry: WriterRegistry,
    reporter: SharedReporter,
    frame_source: Option<Arc<dyn FrameSource>>,
}

impl LoggerBuilder {
    /// Default configuration, default writers, reports on standard error
    #[must_use]
    pub fn new() -> Self {
        Self {
            configuration: Configuration::default(),
            registry: WriterRegistry::with_defaults(),
            reporter: default_reporter(),
            frame_source: None,
        }
    }

    /// Configuration activated by [`build`](Self::build)
    #[must_use = "builder methods return a new value"]
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Writers available to configurations of this logger
    #[must_use = "builder methods return a new value"]
    pub fn registry(mut self, registry: WriterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Where configuration and write errors are reported
    #[must_use = "builder methods return a new value"]
    pub fn reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Shared reporter, e.g. one a test keeps a handle to
    #[must_use = "builder methods return a new value"]
    pub fn shared_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Stack access for caller resolution
    #[must_use = "builder methods return a new value"]
    pub fn frame_source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.frame_source = Some(source);
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        let resolver = match self.frame_source {
            Some(source) => CallerResolver::new(source),
            None => CallerResolver::default(),
        };
        let metrics = Arc::new(LoggerMetrics::new());
        let snapshot = ConfigurationSnapshot::build(
            self.configuration,
            &self.registry,
            &self.reporter,
            &metrics,
        );

        Logger {
            snapshot: RwLock::new(Arc::new(snapshot)),
            registry: self.registry,
            resolver,
            reporter: self.reporter,
            metrics,
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::configuration::WriterSpec;
    use crate::core::error::Result;
    use crate::core::writer::Writer;
    use crate::writers::{WriterContext, WriterOptions};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::OnceLock;

    /// Records rendered lines into a process-wide sink picked by the `sink` option
    struct MemoryWriter {
        pattern: crate::core::CompiledPattern,
        sink: Arc<Mutex<Vec<String>>>,
    }

    fn sinks() -> &'static Mutex<HashMap<String, Arc<Mutex<Vec<String>>>>> {
        static SINKS: OnceLock<Mutex<HashMap<String, Arc<Mutex<Vec<String>>>>>> = OnceLock::new();
        SINKS.get_or_init(Default::default)
    }

    fn sink(name: &str) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(sinks().lock().entry(name.to_string()).or_default())
    }

    fn memory(options: &WriterOptions, context: &WriterContext) -> Result<Box<dyn Writer>> {
        let name = options.get("sink").cloned().unwrap_or_default();
        Ok(Box::new(MemoryWriter {
            pattern: context.pattern.clone(),
            sink: sink(&name),
        }))
    }

    impl Writer for MemoryWriter {
        fn required_fields(&self) -> RequiredFields {
            self.pattern.required_fields()
        }

        fn write(&mut self, record: &LogRecord) -> Result<()> {
            let mut text = String::new();
            self.pattern.render_into(record, &mut text);
            self.sink.lock().push(text);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "memory"
        }
    }

    /// Fixed stack: two logger frames, then the application caller
    struct FakeStack;

    impl FrameSource for FakeStack {
        fn capture(&self) -> Vec<usize> {
            vec![0, 1, 2, 3]
        }

        fn resolve(&self, ip: usize) -> Vec<StackFrame> {
            let function = match ip {
                0 => "backtrace::trace",
                1 => "rust_logger_core::core::logger::Logger::log_at",
                2 => "app::service::Handler::handle",
                _ => "app::main",
            };
            vec![StackFrame::new(function)]
        }
    }

    fn logger(configuration: Configuration) -> Logger {
        let mut registry = WriterRegistry::with_defaults();
        registry.register("memory", memory);
        Logger::builder()
            .registry(registry)
            .frame_source(Arc::new(FakeStack))
            .configuration(configuration)
            .build()
    }

    fn memory_spec(sink: &str, format: &str) -> WriterSpec {
        WriterSpec::new("memory")
            .with_option("sink", sink)
            .with_option("format", format)
    }

    #[test]
    fn test_level_gate() {
        let logger = logger(
            Configuration::new()
                .with_level(LogLevel::Warn)
                .with_writer(memory_spec("gate", "{level} {message}")),
        );

        logger.info("hidden");
        logger.warn("shown");
        logger.error(format_args!("code {}", 7));

        assert!(!logger.is_enabled(LogLevel::Info));
        assert!(logger.is_enabled(LogLevel::Error));
        assert_eq!(*sink("gate").lock(), vec!["WARN shown", "ERROR code 7"]);
    }

    #[test]
    fn test_off_disables_everything() {
        let logger = logger(
            Configuration::new()
                .with_level(LogLevel::Off)
                .with_writer(memory_spec("off", "{message}")),
        );

        logger.error("never");
        assert!(!logger.is_enabled(LogLevel::Error));
        assert!(sink("off").lock().is_empty());
    }

    #[test]
    fn test_method_api_fills_caller_fields() {
        let logger = logger(
            Configuration::new()
                .with_writer(memory_spec("caller", "{class}.{method}() {file}:{line}")),
        );

        let line = line!() + 1;
        logger.info("located");

        let lines = sink("caller").lock().clone();
        assert_eq!(
            lines,
            vec![format!("app::service::Handler.handle() {}:{}", file!(), line)]
        );
    }

    #[test]
    fn test_prefix_rules_use_caller_class() {
        let logger = logger(
            Configuration::new()
                .with_level(LogLevel::Error)
                .with_level_for("app::service", LogLevel::Debug)
                .with_writer(memory_spec("prefix", "{message}")),
        );

        // FakeStack places every method call in app::service::Handler
        logger.debug("from service");
        assert!(logger.is_enabled_for("app::service::Handler", LogLevel::Debug));
        assert!(!logger.is_enabled_for("app::other", LogLevel::Debug));
        assert_eq!(*sink("prefix").lock(), vec!["from service"]);
    }

    #[test]
    fn test_exception_fields() {
        let logger = logger(
            Configuration::new()
                .with_max_stack_depth(1)
                .with_writer(memory_spec("exception", "{message}")),
        );

        let exception = Throwable::new("io::Error")
            .with_message("disk full")
            .with_frames(vec![StackFrame::new("a::b"), StackFrame::new("c::d")]);
        logger.log_exception(LogLevel::Error, &exception, "save failed");

        let lines = sink("exception").lock().clone();
        assert_eq!(lines.len(), 1);
        let expected = format!(
            "save failed: io::Error: disk full{nl}\tat a::b(Unknown Source){nl}\t...",
            nl = crate::core::NEW_LINE
        );
        assert!(lines[0].starts_with(&expected), "{:?}", lines[0]);
    }

    #[test]
    fn test_reactivation_swaps_writers() {
        let logger = logger(Configuration::new().with_writer(memory_spec("first", "{message}")));
        logger.info("one");

        logger.activate(Configuration::new().with_writer(memory_spec("second", "[{message}]")));
        logger.info("two");

        assert_eq!(*sink("first").lock(), vec!["one"]);
        assert_eq!(*sink("second").lock(), vec!["[two]"]);
        assert_eq!(logger.configuration().writers[0].options["sink"], "second");
    }

    #[test]
    fn test_shutdown_discards_later_calls() {
        let logger = logger(
            Configuration::new()
                .with_writing_thread(true)
                .with_writer(memory_spec("shutdown", "{message}")),
        );

        for i in 0..20 {
            logger.info(i);
        }
        assert!(logger.shutdown(Duration::from_secs(5)));
        logger.info("after");

        let lines = sink("shutdown").lock().clone();
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[19], "19");
        assert_eq!(logger.metrics().total_logged(), 20);
    }

    /// Keeps whole records to inspect which fields were filled
    struct Fields;

    static FILLED: Mutex<Vec<LogRecord>> = Mutex::new(Vec::new());

    impl Writer for Fields {
        fn required_fields(&self) -> RequiredFields {
            RequiredFields::MESSAGE
        }

        fn write(&mut self, record: &LogRecord) -> Result<()> {
            FILLED.lock().push(record.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "fields"
        }
    }

    /// Fails the test if the stack is inspected
    struct NoStack;

    impl FrameSource for NoStack {
        fn capture(&self) -> Vec<usize> {
            panic!("stack walked without a caller field")
        }

        fn resolve(&self, _: usize) -> Vec<StackFrame> {
            Vec::new()
        }
    }

    #[test]
    fn test_unneeded_fields_stay_empty() {
        let mut registry = WriterRegistry::new();
        registry.register("fields", |_, _| Ok(Box::new(Fields)));

        let logger = Logger::builder()
            .registry(registry)
            .frame_source(Arc::new(NoStack))
            .configuration(Configuration::new().with_writer(WriterSpec::new("fields")))
            .build();
        logger.info("only the message");
        logger.log_exception(LogLevel::Warn, &Throwable::new("Ignored"), "no exception field");

        let records = FILLED.lock().clone();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message.as_deref(), Some("only the message"));
        assert_eq!(records[1].exception, None);
        for record in &records {
            assert_eq!(record.timestamp, None);
            assert_eq!(record.thread, None);
            assert_eq!(record.class, None);
            assert_eq!(record.method, None);
            assert_eq!(record.line, None);
        }
    }
}
