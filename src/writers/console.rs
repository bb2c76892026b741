//! Console writer implementation

use super::registry::{flag_option, WriterContext, WriterOptions};
use crate::core::{CompiledPattern, LogLevel, LogRecord, RequiredFields, Result, Writer};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::{self, Write};

/// Output stream of the console writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Out,
    Err,
}

impl ConsoleStream {
    /// Level-based routing: `WARN` and `ERROR` go to the error stream
    pub fn for_level(level: LogLevel) -> Self {
        if level >= LogLevel::Warn {
            ConsoleStream::Err
        } else {
            ConsoleStream::Out
        }
    }
}

/// Writes rendered records to standard output or standard error.
///
/// Options: `stream` (`out` or `err`, forces every record onto that stream)
/// and `colors` (tint records by level).
pub struct ConsoleWriter {
    pattern: CompiledPattern,
    stream: Option<ConsoleStream>,
    colors: bool,
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

impl ConsoleWriter {
    pub fn new(pattern: CompiledPattern) -> Self {
        Self {
            pattern,
            stream: None,
            colors: false,
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
        }
    }

    /// Build from configuration options.
    ///
    /// An unrecognized `stream` value is reported once and the writer keeps
    /// the level-based routing.
    pub fn from_options(options: &WriterOptions, context: &WriterContext) -> Result<Self> {
        let stream = match options.get("stream").map(|s| s.trim().to_lowercase()) {
            None => None,
            Some(value) if value == "out" => Some(ConsoleStream::Out),
            Some(value) if value == "err" => Some(ConsoleStream::Err),
            Some(_) => {
                let raw = options.get("stream").map(String::as_str).unwrap_or_default();
                context.reporter.report(
                    LogLevel::Error,
                    &format!(
                        "Invalid stream '{}' for console writer, expected 'out' or 'err'",
                        raw
                    ),
                );
                None
            }
        };

        Ok(Self::new(context.pattern.clone())
            .with_stream(stream)
            .with_colors(flag_option(options, "console", "colors", false)?))
    }

    /// Force all records onto one stream, or `None` for level-based routing
    #[must_use]
    pub fn with_stream(mut self, stream: Option<ConsoleStream>) -> Self {
        self.stream = stream;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Replace the process streams, e.g. with capture buffers
    #[must_use]
    pub fn with_streams(
        mut self,
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
    ) -> Self {
        self.out = Box::new(out);
        self.err = Box::new(err);
        self
    }

    pub fn stream(&self) -> Option<ConsoleStream> {
        self.stream
    }

    #[cfg(feature = "console")]
    fn tint(&self, text: String, level: LogLevel) -> String {
        if self.colors {
            text.color(level.color_code()).to_string()
        } else {
            text
        }
    }

    #[cfg(not(feature = "console"))]
    fn tint(&self, text: String, _level: LogLevel) -> String {
        text
    }
}

impl Writer for ConsoleWriter {
    fn required_fields(&self) -> RequiredFields {
        self.pattern.required_fields() | RequiredFields::LEVEL
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let text = self.tint(self.pattern.render(record), record.level);

        let target = match self.stream.unwrap_or_else(|| ConsoleStream::for_level(record.level)) {
            ConsoleStream::Out => &mut self.out,
            ConsoleStream::Err => &mut self.err,
        };
        // One call per record keeps lines from different threads whole
        target.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Flush both streams since we write to both
        self.out.flush()?;
        self.err.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
