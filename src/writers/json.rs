//! JSON writer for structured logging
//!
//! Writes each record as a single-line JSON object (JSONL format), which log
//! aggregation tools like ELK or Loki ingest directly.

use super::file::open_log_file;
use super::registry::{flag_option, required_option, WriterContext, WriterOptions};
use crate::core::{LogLevel, LogRecord, LoggerError, RequiredFields, Result, Writer};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Fields written when the `fields` option is absent
pub const DEFAULT_JSON_FIELDS: &str = "date,level,message,exception";

/// Borrowed view of the selected record fields
#[derive(Serialize)]
struct JsonLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<&'a DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<LogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a str>,
}

/// Parse a comma separated field list such as `date,level,message`
pub fn parse_fields(list: &str) -> std::result::Result<RequiredFields, String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .try_fold(RequiredFields::empty(), |fields, name| {
            Ok(fields | name.parse::<RequiredFields>()?)
        })
}

/// JSON lines file writer
///
/// Options: `file` (required), `fields` (see [`DEFAULT_JSON_FIELDS`]),
/// `append` and `buffered`. Absent values are left out of the object.
pub struct JsonWriter {
    path: PathBuf,
    fields: RequiredFields,
    writer: Option<BufWriter<File>>,
    buffered: bool,
}

impl JsonWriter {
    /// Create a new JSON writer that appends the given fields
    pub fn new(path: impl Into<PathBuf>, fields: RequiredFields) -> Result<Self> {
        let path = path.into();
        let file = open_log_file(&path, true)?;
        Ok(Self {
            path,
            fields,
            writer: Some(BufWriter::new(file)),
            buffered: false,
        })
    }

    pub fn from_options(options: &WriterOptions, _context: &WriterContext) -> Result<Self> {
        let path = PathBuf::from(required_option(options, "json", "file")?);
        let list = options
            .get("fields")
            .map(String::as_str)
            .unwrap_or(DEFAULT_JSON_FIELDS);
        let fields = parse_fields(list).map_err(|e| LoggerError::config("json writer", e))?;
        let append = flag_option(options, "json", "append", false)?;

        let file = open_log_file(&path, append)?;
        Ok(Self {
            path,
            fields,
            writer: Some(BufWriter::new(file)),
            buffered: flag_option(options, "json", "buffered", false)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn line<'a>(&self, record: &'a LogRecord) -> JsonLine<'a> {
        let has = |field| self.fields.contains(field);
        JsonLine {
            date: record.timestamp.as_ref().filter(|_| has(RequiredFields::DATE)),
            level: Some(record.level).filter(|_| has(RequiredFields::LEVEL)),
            thread: record.thread.as_deref().filter(|_| has(RequiredFields::THREAD)),
            class: record.class.as_deref().filter(|_| has(RequiredFields::CLASS)),
            method: record.method.as_deref().filter(|_| has(RequiredFields::METHOD)),
            file: record.file.filter(|_| has(RequiredFields::FILE)),
            line: record.line.filter(|_| has(RequiredFields::LINE)),
            message: record.message.as_deref().filter(|_| has(RequiredFields::MESSAGE)),
            exception: record.exception.as_deref().filter(|_| has(RequiredFields::EXCEPTION)),
        }
    }
}

impl Writer for JsonWriter {
    fn required_fields(&self) -> RequiredFields {
        self.fields
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let mut json = serde_json::to_string(&self.line(record))?;
        json.push('\n');

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::write("json", "writer is closed"))?;
        writer.write_all(json.as_bytes())?;
        if !self.buffered {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
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
        "json"
    }
}

impl Drop for JsonWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
