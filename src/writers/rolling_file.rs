//! Rolling file writer with automatic log rotation
//!
//! Before each write the writer checks its [`RotationPolicy`]. When a
//! trigger fires, the current file is closed, renamed to an archive name
//! chosen by the [`LabelStrategy`] (never one that already exists),
//! optionally gzip-compressed, and a fresh file is opened. Rotation failures
//! are reported and the writer keeps writing to the current file.

use super::file::open_log_file;
use super::registry::{flag_option, required_option, WriterContext, WriterOptions};
use crate::core::{
    CompiledPattern, LogLevel, LogRecord, LoggerError, LoggerMetrics, RequiredFields, Result,
    SharedReporter, StderrReporter, Writer,
};
use chrono::format::{Item, Parsed, StrftimeItems};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default strftime format of timestamp labels
pub const DEFAULT_TIMESTAMP_LABEL: &str = "%Y-%m-%d_%H-%M-%S";

const COMPRESSED_SUFFIX: &str = ".gz";

/// Condition that starts a new file
///
/// # Examples
///
/// ```
/// use rust_logger_core::writers::RotationTrigger;
/// use std::time::Duration;
///
/// assert_eq!("size: 10KB".parse(), Ok(RotationTrigger::Size(10 * 1024)));
/// assert_eq!("startup".parse(), Ok(RotationTrigger::Startup));
/// assert_eq!("interval: 1h".parse(), Ok(RotationTrigger::Interval(Duration::from_secs(3600))));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationTrigger {
    /// Archive a non-empty file when the writer is created
    Startup,

    /// Rotate once the file has reached this many bytes
    Size(u64),

    /// Rotate at this local time of day
    Daily(NaiveTime),

    /// Rotate when the file has been in use this long
    Interval(Duration),
}

impl std::str::FromStr for RotationTrigger {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, argument) = match s.split_once(':') {
            Some((name, argument)) => (name.trim(), Some(argument.trim())),
            None => (s.trim(), None),
        };

        match (name.to_lowercase().as_str(), argument) {
            ("startup", None) => Ok(RotationTrigger::Startup),
            ("daily", None) => Ok(RotationTrigger::Daily(NaiveTime::MIN)),
            ("daily", Some(time)) => NaiveTime::parse_from_str(time, "%H:%M")
                .map(RotationTrigger::Daily)
                .map_err(|_| format!("invalid time '{}' for daily policy, expected HH:MM", time)),
            ("size", Some(size)) => parse_size(size).map(RotationTrigger::Size),
            ("interval", Some(interval)) => parse_interval(interval).map(RotationTrigger::Interval),
            _ => Err(format!("unknown rotation policy '{}'", s.trim())),
        }
    }
}

/// `512`, `10KB`, `5 MB`, `1GB` (binary multiples)
fn parse_size(value: &str) -> std::result::Result<u64, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let multiplier: u64 = match unit.trim().to_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return Err(format!("invalid size '{}'", value)),
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("invalid size '{}'", value))
}

/// Seconds, or a number with an `s`, `m`, `h` or `d` suffix
fn parse_interval(value: &str) -> std::result::Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let seconds: u64 = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(format!("invalid interval '{}'", value)),
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(seconds))
        .filter(|n| *n > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("invalid interval '{}'", value))
}

/// Naming scheme of archived files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelStrategy {
    /// `app.log.1`, `app.log.2`, ...; the highest number is the newest
    Count,

    /// `app.log.<strftime>`, with a counter appended if that name is taken
    Timestamp(String),
}

impl Default for LabelStrategy {
    fn default() -> Self {
        LabelStrategy::Count
    }
}

impl std::str::FromStr for LabelStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, argument) = match s.split_once(':') {
            Some((name, argument)) => (name.trim(), Some(argument.trim())),
            None => (s.trim(), None),
        };

        match (name.to_lowercase().as_str(), argument) {
            ("count", None) => Ok(LabelStrategy::Count),
            ("timestamp", None) => {
                Ok(LabelStrategy::Timestamp(DEFAULT_TIMESTAMP_LABEL.to_string()))
            }
            ("timestamp", Some(format)) => validate_label_format(format)
                .map(|()| LabelStrategy::Timestamp(format.to_string())),
            _ => Err(format!("unknown label '{}'", s.trim())),
        }
    }
}

/// A label format must be valid strftime and contain at least one date or
/// time field, otherwise every archive would get the same literal name
fn validate_label_format(format: &str) -> std::result::Result<(), String> {
    let mut has_field = false;
    for item in StrftimeItems::new(format) {
        match item {
            Item::Error => return Err(format!("invalid timestamp label '{}'", format)),
            Item::Numeric(..) | Item::Fixed(..) => has_field = true,
            _ => {}
        }
    }
    if has_field {
        Ok(())
    } else {
        Err(format!("timestamp label '{}' has no date or time field", format))
    }
}

impl LabelStrategy {
    /// Archive name for `base` that collides with no existing file,
    /// compressed or not
    fn next_archive(&self, base: &Path, now: &DateTime<Local>) -> PathBuf {
        let file_name = file_name(base);
        let taken = |path: &Path| path.exists() || with_suffix(path, COMPRESSED_SUFFIX).exists();

        match self {
            LabelStrategy::Count => {
                let mut index = archives(base, self)
                    .last()
                    .and_then(|path| count_label(&file_name, path))
                    .unwrap_or(0)
                    + 1;
                loop {
                    let candidate = base.with_file_name(format!("{}.{}", file_name, index));
                    if !taken(&candidate) {
                        return candidate;
                    }
                    index += 1;
                }
            }
            LabelStrategy::Timestamp(format) => {
                let label = now.format(format).to_string();
                let candidate = base.with_file_name(format!("{}.{}", file_name, label));
                if !taken(&candidate) {
                    return candidate;
                }
                let mut index = 1u64;
                loop {
                    let candidate =
                        base.with_file_name(format!("{}.{}.{}", file_name, label, index));
                    if !taken(&candidate) {
                        return candidate;
                    }
                    index += 1;
                }
            }
        }
    }
}

/// When to rotate and what to keep
///
/// # Examples
///
/// ```
/// use rust_logger_core::writers::{LabelStrategy, RotationPolicy, RotationTrigger};
///
/// let policy = RotationPolicy::new()
///     .with_trigger(RotationTrigger::Size(50 * 1024 * 1024))
///     .with_label(LabelStrategy::Timestamp("%Y%m%d".to_string()))
///     .with_max_backups(7)
///     .with_compression(true);
/// assert_eq!(policy.triggers.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RotationPolicy {
    pub triggers: Vec<RotationTrigger>,
    pub label: LabelStrategy,
    /// Archives to keep; older ones are deleted. `None` keeps all
    pub max_backups: Option<usize>,
    /// Gzip archives after rotation
    pub compress: bool,
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_trigger(mut self, trigger: RotationTrigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_label(mut self, label: LabelStrategy) -> Self {
        self.label = label;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = Some(count);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    fn has(&self, trigger: &RotationTrigger) -> bool {
        self.triggers.contains(trigger)
    }
}

/// File writer that rotates according to a [`RotationPolicy`].
///
/// Options: `file` (required), `policies` (comma separated: `startup`,
/// `daily` or `daily: HH:MM`, `size: 10MB`, `interval: 1h`; `startup` when
/// absent), `label` (`count`, `timestamp` or `timestamp: <strftime>`),
/// `backups`, `compress` and `buffered`.
pub struct RollingFileWriter {
    path: PathBuf,
    pattern: CompiledPattern,
    policy: RotationPolicy,
    buffered: bool,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    /// When the current file was started
    opened_at: DateTime<Local>,
    /// Earliest daily rollover after `opened_at`
    next_rollover: Option<DateTime<Local>>,
    reporter: SharedReporter,
    metrics: Arc<LoggerMetrics>,
}

impl RollingFileWriter {
    /// Create the writer; a `Startup` trigger archives existing content first
    pub fn new(
        path: impl Into<PathBuf>,
        pattern: CompiledPattern,
        policy: RotationPolicy,
    ) -> Result<Self> {
        Self::with_observers(
            path.into(),
            pattern,
            policy,
            false,
            Arc::new(StderrReporter),
            Arc::new(LoggerMetrics::new()),
        )
    }

    pub fn from_options(options: &WriterOptions, context: &WriterContext) -> Result<Self> {
        let config_error = |message: String| LoggerError::config("rolling file writer", message);

        let path = required_option(options, "rolling file", "file")?;

        let triggers = match options.get("policies") {
            Some(value) => value
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(str::parse::<RotationTrigger>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(config_error)?,
            None => vec![RotationTrigger::Startup],
        };

        let label = match options.get("label") {
            Some(value) => value.parse::<LabelStrategy>().map_err(config_error)?,
            None => LabelStrategy::default(),
        };

        let max_backups = match options.get("backups") {
            Some(value) => Some(
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| config_error(format!("invalid backups '{}'", value)))?,
            ),
            None => None,
        };

        let policy = RotationPolicy {
            triggers,
            label,
            max_backups,
            compress: flag_option(options, "rolling file", "compress", false)?,
        };

        Self::with_observers(
            PathBuf::from(path),
            context.pattern.clone(),
            policy,
            flag_option(options, "rolling file", "buffered", false)?,
            Arc::clone(&context.reporter),
            Arc::clone(&context.metrics),
        )
    }

    fn with_observers(
        path: PathBuf,
        pattern: CompiledPattern,
        policy: RotationPolicy,
        buffered: bool,
        reporter: SharedReporter,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self> {
        let mut writer = Self {
            path,
            pattern,
            policy,
            buffered,
            writer: None,
            current_size: 0,
            opened_at: Local::now(),
            next_rollover: None,
            reporter,
            metrics,
        };

        let existing = fs::metadata(&writer.path).ok().filter(|m| m.len() > 0);
        if existing.is_some() && writer.policy.has(&RotationTrigger::Startup) {
            if let Err(e) = writer.rotate() {
                writer.report_rotation_failure(&e);
            }
        }

        if writer.writer.is_none() {
            writer.reopen()?;
        }
        Ok(writer)
    }

    /// Open the current file in append mode and pick up its size and age
    fn reopen(&mut self) -> Result<()> {
        let file = open_log_file(&self.path, true)?;
        let metadata = file.metadata().map_err(|e| {
            LoggerError::io_operation(
                "read log file metadata",
                format!("Cannot access '{}'", self.path.display()),
                e,
            )
        })?;

        self.current_size = metadata.len();
        // An existing file keeps aging from its last modification
        self.opened_at = match metadata.modified() {
            Ok(modified) if self.current_size > 0 => modified.into(),
            _ => Local::now(),
        };
        self.next_rollover = self.next_daily_rollover();
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn next_daily_rollover(&self) -> Option<DateTime<Local>> {
        self.policy
            .triggers
            .iter()
            .filter_map(|trigger| match trigger {
                RotationTrigger::Daily(time) => next_occurrence(&self.opened_at, *time),
                _ => None,
            })
            .min()
    }

    fn should_rotate(&self, now: &DateTime<Local>) -> bool {
        if self.next_rollover.is_some_and(|at| *now >= at) {
            return true;
        }
        self.policy.triggers.iter().any(|trigger| match trigger {
            RotationTrigger::Size(max_bytes) => self.current_size >= *max_bytes,
            RotationTrigger::Interval(interval) => ChronoDuration::from_std(*interval)
                .map(|interval| *now - self.opened_at >= interval)
                .unwrap_or(false),
            RotationTrigger::Startup | RotationTrigger::Daily(_) => false,
        })
    }

    /// Archive the current file and start a new one
    fn rotate(&mut self) -> Result<()> {
        let path_str = self.path.display().to_string();

        // Explicitly drop writer to release file handle before renaming
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::rotation(&path_str, format!("Failed to flush before rotation: {}", e))
            })?;
        }

        let now = Local::now();
        let archive = self.policy.label.next_archive(&self.path, &now);
        if self.path.exists() {
            fs::rename(&self.path, &archive).map_err(|e| {
                LoggerError::rotation(
                    &path_str,
                    format!("Failed to rename to '{}': {}", archive.display(), e),
                )
            })?;

            if self.policy.compress {
                if let Err(e) = compress_file(&archive) {
                    self.reporter.report(LogLevel::Warn, &e.to_string());
                }
            }
        }

        if let Some(keep) = self.policy.max_backups {
            self.prune_archives(keep);
        }

        let file = open_log_file(&self.path, false).map_err(|e| {
            LoggerError::rotation(&path_str, format!("Failed to create new log file: {}", e))
        })?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        self.opened_at = now;
        self.next_rollover = self.next_daily_rollover();
        self.metrics.record_rotation();
        Ok(())
    }

    /// Delete the oldest archives beyond `keep`
    fn prune_archives(&self, keep: usize) {
        let archives = archives(&self.path, &self.policy.label);
        let excess = archives.len().saturating_sub(keep);
        for old in &archives[..excess] {
            if let Err(e) = fs::remove_file(old) {
                self.reporter.report(
                    LogLevel::Warn,
                    &format!("Failed to remove old archive '{}': {}", old.display(), e),
                );
            }
        }
    }

    fn report_rotation_failure(&self, error: &LoggerError) {
        self.reporter.report(
            LogLevel::Warn,
            &format!("{}. Continuing with current file.", error),
        );
    }

    /// Get current file size
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Get base path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get rotation policy
    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }
}

impl Writer for RollingFileWriter {
    fn required_fields(&self) -> RequiredFields {
        self.pattern.required_fields()
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let now = Local::now();
        if self.should_rotate(&now) {
            if let Err(e) = self.rotate() {
                // Keep the record: fall back to the current file
                self.report_rotation_failure(&e);

                if self.writer.is_none() {
                    self.reopen().map_err(|reopen| {
                        self.reporter.report(
                            LogLevel::Error,
                            &format!(
                                "Failed to reopen log file after rotation failure: {}",
                                reopen
                            ),
                        );
                        e
                    })?;
                }

                // Allow the file to grow past its limit instead of retrying on every write
                self.current_size = 0;
                self.opened_at = now;
                self.next_rollover = self.next_daily_rollover();
            }
        }

        let text = self.pattern.render(record);
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::write("rolling file", "writer is closed"))?;

        let result = if self.buffered {
            writer.write_all(text.as_bytes())
        } else {
            writer.write_all(text.as_bytes()).and_then(|()| writer.flush())
        };
        result.map_err(|e| {
            LoggerError::write("rolling file", format!("'{}': {}", self.path.display(), e))
        })?;

        self.current_size += text.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::write("rolling file", format!("Failed to flush: {}", e))
            })?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rolling file"
    }
}

impl Drop for RollingFileWriter {
    fn drop(&mut self) {
        // Best effort flush - ignore errors during drop
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

/// First instant strictly after `after` at local `time`
fn next_occurrence(after: &DateTime<Local>, time: NaiveTime) -> Option<DateTime<Local>> {
    let mut day = after.date_naive();
    // Two days cover DST gaps that swallow `time` on one of them
    for _ in 0..3 {
        if let Some(candidate) = day.and_time(time).and_local_timezone(Local).earliest() {
            if candidate > *after {
                return Some(candidate);
            }
        }
        day = day.succ_opt()?;
    }
    None
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app.log".to_string())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Index of a count label archive, ignoring a compression suffix
fn count_label(file_name: &str, archive: &Path) -> Option<u64> {
    let name = archive.file_name()?.to_str()?;
    let label = name.strip_prefix(file_name)?.strip_prefix('.')?;
    let label = label.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(label);
    label.parse().ok()
}

/// Time and collision index of a timestamp label archive; `None` for names
/// the format could not have produced
fn timestamp_label(
    file_name: &str,
    format: &str,
    archive: &Path,
) -> Option<(Option<NaiveDateTime>, u64)> {
    let name = archive.file_name()?.to_str()?;
    let label = name.strip_prefix(file_name)?.strip_prefix('.')?;
    let label = label.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(label);

    if let Some(time) = parse_label(label, format) {
        return Some((time, 0));
    }
    let (stem, index) = label.rsplit_once('.')?;
    let index = index.parse::<u64>().ok().filter(|index| *index > 0)?;
    parse_label(stem, format).map(|time| (time, index))
}

/// Matches `label` against the whole of `format`. The inner value is the
/// labelled time, when the format carries a date.
fn parse_label(label: &str, format: &str) -> Option<Option<NaiveDateTime>> {
    let mut parsed = Parsed::new();
    chrono::format::parse(&mut parsed, label, StrftimeItems::new(format)).ok()?;
    let time = parsed.to_naive_time().unwrap_or(NaiveTime::MIN);
    Some(parsed.to_naive_date().ok().map(|date| date.and_time(time)))
}

/// Existing archives of `base`, oldest first
fn archives(base: &Path, label: &LabelStrategy) -> Vec<PathBuf> {
    let file_name = file_name(base);
    let prefix = format!("{}.", file_name);
    let directory = match base.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };

    let Ok(entries) = fs::read_dir(&directory) else {
        return Vec::new();
    };

    let mut found: Vec<((Option<NaiveDateTime>, u64, String), PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            if !name.starts_with(&prefix) || name.ends_with(".tmp") {
                return None;
            }
            let path = entry.path();
            match label {
                LabelStrategy::Count => {
                    count_label(&file_name, &path).map(|index| ((None, index, name), path))
                }
                LabelStrategy::Timestamp(format) => timestamp_label(&file_name, format, &path)
                    .map(|(time, index)| ((time, index, name), path)),
            }
        })
        .collect();

    found.sort();
    found.into_iter().map(|(_, path)| path).collect()
}

/// Gzip `path` into `path.gz` through a temporary file and remove the
/// original only once the archive is complete
fn compress_file(path: &Path) -> Result<()> {
    let gz_path = with_suffix(path, COMPRESSED_SUFFIX);
    let temp_gz_path = with_suffix(path, ".gz.tmp");

    let compress_error = |message: String, e: std::io::Error| {
        let _ = fs::remove_file(&temp_gz_path);
        LoggerError::io_operation("compress log file", message, e)
    };

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp_gz_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_gz_path.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    // Stream in chunks instead of loading the whole file
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| {
            compress_error(format!("Failed to read from file: {}", path.display()), e)
        })?;
        if bytes_read == 0 {
            break;
        }
        encoder
            .write_all(&buffer[..bytes_read])
            .map_err(|e| compress_error("Failed to compress data chunk".to_string(), e))?;
    }

    encoder
        .finish()
        .and_then(|mut output| output.flush())
        .map_err(|e| compress_error("Failed to finish compression".to_string(), e))?;

    fs::rename(&temp_gz_path, &gz_path).map_err(|e| {
        compress_error(
            format!("Failed to rename compressed file to: {}", gz_path.display()),
            e,
        )
    })?;

    // The archive is complete; a leftover original only costs disk space
    fs::remove_file(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!(
                "Compression succeeded but failed to remove original file {}",
                path.display()
            ),
            e,
        )
    })
}
