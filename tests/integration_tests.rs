//! Integration tests for the logger core
//!
//! These tests verify:
//! - Record fields and pattern rendering end to end
//! - Exception depth truncation
//! - Console stream routing and its configuration errors
//! - Rolling file rotation without name collisions
//! - Reconfiguration, writing threads and failing writers

use chrono::{Datelike, Local};
use parking_lot::Mutex;
use rust_logger_core::core::{FrameSource, NEW_LINE};
use rust_logger_core::prelude::*;
use rust_logger_core::writers::ConsoleWriter;
use rust_logger_core::{error, info, log, warn};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;

/// Collects internal reports instead of printing them
#[derive(Default)]
struct Collect(Mutex<Vec<(LogLevel, String)>>);

impl ErrorReporter for Collect {
    fn report(&self, level: LogLevel, message: &str) {
        self.0.lock().push((level, message.to_string()));
    }
}

impl Collect {
    fn reports(&self) -> Vec<(LogLevel, String)> {
        self.0.lock().clone()
    }
}

/// Two logger frames followed by a fixed application caller
struct FakeStack;

impl FrameSource for FakeStack {
    fn capture(&self) -> Vec<usize> {
        vec![0, 1, 2]
    }

    fn resolve(&self, ip: usize) -> Vec<StackFrame> {
        let function = match ip {
            0 => "rust_logger_core::core::caller::CallerResolver::resolve",
            1 => "rust_logger_core::core::logger::Logger::log_at",
            _ => "shop::orders::Checkout::submit",
        };
        vec![StackFrame::new(function)]
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn file_spec(path: &Path, format: &str) -> WriterSpec {
    WriterSpec::new("file")
        .with_option("file", path_str(path))
        .with_option("format", format)
}

// ============================================================================
// Console capture
// ============================================================================

type Buffers = HashMap<String, Arc<Mutex<Vec<u8>>>>;

fn buffer(name: &str) -> Arc<Mutex<Vec<u8>>> {
    static BUFFERS: OnceLock<Mutex<Buffers>> = OnceLock::new();
    let buffers = BUFFERS.get_or_init(Default::default);
    Arc::clone(buffers.lock().entry(name.to_string()).or_default())
}

fn captured(name: &str) -> String {
    String::from_utf8_lossy(&buffer(name).lock()).into_owned()
}

struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Console writer whose streams go to `<capture>.out` and `<capture>.err`
fn captured_console(options: &WriterOptions, context: &WriterContext) -> Result<Box<dyn Writer>> {
    let name = options.get("capture").cloned().unwrap_or_default();
    let writer = ConsoleWriter::from_options(options, context)?.with_streams(
        Capture(buffer(&format!("{}.out", name))),
        Capture(buffer(&format!("{}.err", name))),
    );
    Ok(Box::new(writer))
}

fn console_logger(capture: &str, stream: Option<&str>) -> (Logger, Arc<Collect>) {
    let mut registry = WriterRegistry::with_defaults();
    registry.register("console", captured_console);

    let mut spec = WriterSpec::new("console")
        .with_option("capture", capture)
        .with_option("format", "{message}");
    if let Some(stream) = stream {
        spec = spec.with_option("stream", stream);
    }

    let collect = Arc::new(Collect::default());
    let logger = Logger::builder()
        .registry(registry)
        .shared_reporter(collect.clone())
        .configuration(Configuration::new().with_level(LogLevel::Trace).with_writer(spec))
        .build();
    (logger, collect)
}

fn log_every_level(logger: &Logger) {
    for level in LogLevel::EMITTABLE {
        log!(logger, level, "{}", level);
    }
}

#[test]
fn test_console_default_routing() {
    let (logger, _) = console_logger("default", None);
    log_every_level(&logger);

    let nl = NEW_LINE;
    assert_eq!(captured("default.out"), format!("TRACE{nl}DEBUG{nl}INFO{nl}"));
    assert_eq!(captured("default.err"), format!("WARN{nl}ERROR{nl}"));
}

#[test]
fn test_console_explicit_streams() {
    let (logger, _) = console_logger("all_out", Some("out"));
    log_every_level(&logger);
    assert!(captured("all_out.out").contains("ERROR"));
    assert!(captured("all_out.err").is_empty());

    let (logger, _) = console_logger("all_err", Some("err"));
    log_every_level(&logger);
    assert!(captured("all_err.out").is_empty());
    assert_eq!(captured("all_err.err").lines().count(), 5);
}

#[test]
fn test_console_invalid_stream_reported_once() {
    let (logger, collect) = console_logger("invalid", Some("abc"));
    log_every_level(&logger);
    log_every_level(&logger);

    let reports = collect.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, LogLevel::Error);
    assert!(reports[0].1.contains("abc"));

    // Degrades to level-based routing
    assert!(captured("invalid.out").contains("INFO"));
    assert!(!captured("invalid.out").contains("ERROR"));
    assert!(captured("invalid.err").contains("ERROR"));
}

// ============================================================================
// Record fields
// ============================================================================

#[test]
fn test_full_entry_format() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("full.log");

    let logger = Logger::builder()
        .frame_source(Arc::new(FakeStack))
        .configuration(Configuration::new().with_writer(file_spec(
            &log_file,
            "{thread}#{class}#{method}#{file}#{line}#{level}#{date:%Y}#{message}",
        )))
        .build();

    let line = line!() + 1;
    info!(logger, "Hello {}!", "World");
    logger.flush();

    let thread = std::thread::current().name().map(str::to_string).unwrap_or_default();
    let expected = format!(
        "{}#integration_tests#submit#{}#{}#INFO#{}#Hello World!{}",
        thread,
        file!(),
        line,
        Local::now().year(),
        NEW_LINE
    );
    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert_eq!(content, expected);
}

#[test]
fn test_method_api_uses_stack_for_class() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("method.log");

    let logger = Logger::builder()
        .frame_source(Arc::new(FakeStack))
        .configuration(
            Configuration::new()
                .with_level(LogLevel::Off)
                .with_level_for("shop::orders", LogLevel::Info)
                .with_writer(file_spec(&log_file, "{class}.{method}() {message}")),
        )
        .build();

    logger.info("order placed");
    logger.debug("too detailed");
    logger.flush();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert_eq!(
        content,
        format!("shop::orders::Checkout.submit() order placed{}", NEW_LINE)
    );
}

#[inline(never)]
fn place_order(logger: &Logger) {
    logger.info("placed by method");
}

#[inline(never)]
fn cancel_order(logger: &Logger) {
    info!(logger, "cancelled by macro");
}

#[test]
fn test_real_stack_names_the_calling_function() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("real.log");

    let logger = Logger::new(
        Configuration::new().with_writer(file_spec(&log_file, "{class}|{method}|{message}")),
    );
    // Twice each, so the second call goes through the cached frame position
    for _ in 0..2 {
        place_order(&logger);
        cancel_order(&logger);
    }
    logger.flush();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "integration_tests|place_order|placed by method",
            "integration_tests|cancel_order|cancelled by macro",
            "integration_tests|place_order|placed by method",
            "integration_tests|cancel_order|cancelled by macro",
        ]
    );
}

// ============================================================================
// Exceptions
// ============================================================================

fn failure() -> Throwable {
    let cause = Throwable::new("io::Error")
        .with_message("disk full")
        .with_frames(vec![
            StackFrame::new("store::write").with_location("store.rs", 10),
            StackFrame::new("store::flush").with_location("store.rs", 20),
        ]);
    Throwable::new("SaveError")
        .with_frames(vec![
            StackFrame::new("app::save").with_location("app.rs", 1),
            StackFrame::new("app::main").with_location("main.rs", 2),
        ])
        .with_cause(cause)
}

fn exception_output(depth: i64) -> String {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("exception.log");

    let logger = Logger::new(
        Configuration::new()
            .with_max_stack_depth(depth)
            .with_writer(file_spec(&log_file, "{exception}")),
    );
    error!(logger, exception = failure());
    logger.flush();

    fs::read_to_string(&log_file).expect("Failed to read log file")
}

#[test]
fn test_exception_without_frames() {
    let nl = NEW_LINE;
    assert_eq!(
        exception_output(0),
        format!("SaveError{nl}Caused by: io::Error: disk full{nl}")
    );
}

#[test]
fn test_exception_truncated_to_one_frame() {
    let nl = NEW_LINE;
    assert_eq!(
        exception_output(1),
        format!(
            "SaveError{nl}\tat app::save(app.rs:1){nl}\t...{nl}\
             Caused by: io::Error: disk full{nl}\tat store::write(store.rs:10){nl}\t...{nl}"
        )
    );
}

#[test]
fn test_exception_unlimited_depth() {
    let output = exception_output(-1);
    assert_eq!(output.matches("\tat ").count(), 4);
    assert!(!output.contains("\t..."));
}

#[test]
fn test_error_source_chain() {
    #[derive(Debug)]
    struct Outer(io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("source.log");
    let logger = Logger::new(Configuration::new().with_writer(file_spec(&log_file, "{message}")));

    logger.log_error(
        LogLevel::Error,
        &Outer(io::Error::new(io::ErrorKind::Other, "connection reset")),
    );
    logger.flush();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("Outer: request failed"));
    assert!(content.contains("Caused by: "));
    assert!(content.contains("connection reset"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_invalid_configuration_degrades() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("degraded.log");
    let collect = Arc::new(Collect::default());

    let logger = Logger::builder()
        .shared_reporter(collect.clone())
        .configuration(
            Configuration::new()
                .with_writer(WriterSpec::new("syslog"))
                .with_writer(file_spec(&log_file, "{level} {unknown}")),
        )
        .build();
    logger.warn("still logged");
    logger.flush();

    let reports = collect.reports();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|(level, _)| *level == LogLevel::Error));
    assert!(reports.iter().any(|(_, message)| message.contains("syslog")));
    assert!(reports.iter().any(|(_, message)| message.contains("unknown")));

    // The fallback pattern still renders the message
    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("WARN: still logged"));
}

#[test]
fn test_reconfiguration_switches_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = temp_dir.path().join("first.log");
    let second = temp_dir.path().join("second.log");

    let logger = Logger::new(Configuration::new().with_writer(file_spec(&first, "{message}")));
    logger.info("one");

    logger.activate(
        Configuration::new()
            .with_level(LogLevel::Debug)
            .with_writer(file_spec(&second, "{level} {message}")),
    );
    logger.debug("two");
    logger.flush();

    assert_eq!(fs::read_to_string(&first).unwrap(), format!("one{}", NEW_LINE));
    assert_eq!(fs::read_to_string(&second).unwrap(), format!("DEBUG two{}", NEW_LINE));
    assert_eq!(logger.configuration().default_level, LogLevel::Debug);
}

#[test]
fn test_configuration_from_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("json_config.log");

    let json = serde_json::json!({
        "default_level": "WARN",
        "levels": { "integration_tests": "DEBUG" },
        "format": "{level}|{message}",
        "writers": [
            { "name": "file", "options": { "file": path_str(&log_file), "level": "INFO" } }
        ]
    });
    let configuration: Configuration = serde_json::from_value(json).unwrap();
    assert_eq!(configuration.max_stack_depth, Some(40));

    let logger = Logger::new(configuration);
    info!(logger, "accepted");
    log!(logger, LogLevel::Debug, "below the writer level");
    logger.flush();

    assert_eq!(
        fs::read_to_string(&log_file).unwrap(),
        format!("INFO|accepted{}", NEW_LINE)
    );
}

// ============================================================================
// Writers
// ============================================================================

#[test]
fn test_rolling_file_rotation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("app.log");
    // An older archive that must not be overwritten
    fs::write(temp_dir.path().join("app.log.1"), "archived earlier\n").unwrap();

    let logger = Logger::new(
        Configuration::new().with_writer(
            WriterSpec::new("rolling file")
                .with_option("file", path_str(&log_file))
                .with_option("format", "{message}")
                .with_option("policies", "size: 1KB"),
        ),
    );

    let payload = "x".repeat(100);
    for i in 0..15 {
        info!(logger, "{:02} {}", i, payload);
    }
    logger.flush();

    assert_eq!(
        fs::read_to_string(temp_dir.path().join("app.log.1")).unwrap(),
        "archived earlier\n"
    );
    let archived = fs::read_to_string(temp_dir.path().join("app.log.2")).unwrap();
    assert!(archived.starts_with("00 "));
    let current = fs::read_to_string(&log_file).unwrap();
    assert!(current.lines().all(|line| line.ends_with(&payload)));
    assert_eq!(logger.metrics().rotations(), 1);

    let total = archived.lines().count() + current.lines().count();
    assert_eq!(total, 15);
}

#[test]
fn test_json_writer_through_logger() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("records.jsonl");

    let logger = Logger::new(
        Configuration::new().with_writer(
            WriterSpec::new("json")
                .with_option("file", path_str(&log_file))
                .with_option("fields", "level,class,line,message"),
        ),
    );
    warn!(logger, "disk at {}%", 91);
    logger.flush();

    let content = fs::read_to_string(&log_file).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(parsed["level"], "WARN");
    assert_eq!(parsed["class"], "integration_tests");
    assert_eq!(parsed["message"], "disk at 91%");
    assert!(parsed["line"].is_u64());
    assert!(parsed.get("date").is_none());
}

#[test]
fn test_writing_thread_flush() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("async.log");

    let logger = Logger::new(
        Configuration::new()
            .with_writing_thread(true)
            .with_queue_capacity(4)
            .with_writer(file_spec(&log_file, "{message}").with_option("buffered", "true")),
    );

    for i in 0..50 {
        logger.info(format!("Message {}", i));
    }
    // Returns only after the worker has written everything queued before it
    logger.flush();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 50, "Should have 50 log entries");
    assert_eq!(lines[49], "Message 49");
    assert_eq!(logger.metrics().dropped_count(), 0);
}

#[test]
fn test_failing_writer_is_isolated() {
    struct Broken;

    impl Writer for Broken {
        fn required_fields(&self) -> RequiredFields {
            RequiredFields::MESSAGE
        }

        fn write(&mut self, _: &LogRecord) -> Result<()> {
            Err(LoggerError::write("broken", "device unplugged"))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("healthy.log");
    let collect = Arc::new(Collect::default());

    let mut registry = WriterRegistry::with_defaults();
    registry.register("broken", |_, _| Ok(Box::new(Broken)));

    let logger = Logger::builder()
        .registry(registry)
        .shared_reporter(collect.clone())
        .configuration(
            Configuration::new()
                .with_writer(WriterSpec::new("broken"))
                .with_writer(file_spec(&log_file, "{message}")),
        )
        .build();

    for i in 0..3 {
        info!(logger, "attempt {}", i);
    }
    logger.flush();

    assert_eq!(fs::read_to_string(&log_file).unwrap().lines().count(), 3);
    assert_eq!(logger.metrics().dropped_count(), 3);
    let reports = collect.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].1.contains("device unplugged"));
}

#[test]
fn test_shutdown_closes_writers() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("shutdown.log");

    let logger = Logger::new(
        Configuration::new()
            .with_writing_thread(true)
            .with_writer(file_spec(&log_file, "{message}").with_option("buffered", "true")),
    );
    for i in 0..10 {
        logger.info(i);
    }

    assert!(logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
    logger.error("after shutdown");
    assert!(!logger.is_enabled(LogLevel::Error));

    let content = fs::read_to_string(&log_file).unwrap();
    assert_eq!(content.lines().count(), 10);
    assert!(!content.contains("after shutdown"));
}
