//! File writer implementation

use super::registry::{flag_option, required_option, WriterContext, WriterOptions};
use crate::core::{CompiledPattern, LogRecord, LoggerError, RequiredFields, Result, Writer};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Open `path` for logging, creating missing parent directories
pub(crate) fn open_log_file(path: &Path, append: bool) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LoggerError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    options.open(path).map_err(|e| {
        LoggerError::io_operation(
            "open log file",
            format!("Failed to open '{}'", path.display()),
            e,
        )
    })
}

/// Writes rendered records to a single file.
///
/// Options: `file` (required), `append` (keep existing content, default
/// false), `buffered` (flush only on demand) and `shared` (several processes
/// write to the same file; takes an exclusive lock around every record and
/// implies `append`).
pub struct FileWriter {
    path: PathBuf,
    pattern: CompiledPattern,
    writer: Option<BufWriter<File>>,
    buffered: bool,
    shared: bool,
}

impl FileWriter {
    /// Unbuffered writer that truncates the file
    pub fn new(path: impl Into<PathBuf>, pattern: CompiledPattern) -> Result<Self> {
        Self::open(path.into(), pattern, false, false, false)
    }

    pub fn from_options(options: &WriterOptions, context: &WriterContext) -> Result<Self> {
        let path = required_option(options, "file", "file")?;
        let append = flag_option(options, "file", "append", false)?;
        let buffered = flag_option(options, "file", "buffered", false)?;
        let shared = flag_option(options, "file", "shared", false)?;

        Self::open(
            PathBuf::from(path),
            context.pattern.clone(),
            append,
            buffered,
            shared,
        )
    }

    fn open(
        path: PathBuf,
        pattern: CompiledPattern,
        append: bool,
        buffered: bool,
        shared: bool,
    ) -> Result<Self> {
        if shared && cfg!(not(feature = "file")) {
            return Err(LoggerError::config(
                "file writer",
                "'shared' requires the 'file' feature",
            ));
        }

        let file = open_log_file(&path, append || shared)?;
        Ok(Self {
            path,
            pattern,
            writer: Some(BufWriter::new(file)),
            buffered: buffered && !shared,
            shared,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_locked(writer: &mut BufWriter<File>, bytes: &[u8]) -> std::io::Result<()> {
        #[cfg(feature = "file")]
        {
            use fs2::FileExt;
            writer.get_ref().lock_exclusive()?;
            let result = writer.write_all(bytes).and_then(|()| writer.flush());
            let unlocked = writer.get_ref().unlock();
            result.and(unlocked)
        }
        #[cfg(not(feature = "file"))]
        {
            writer.write_all(bytes).and_then(|()| writer.flush())
        }
    }
}

impl Writer for FileWriter {
    fn required_fields(&self) -> RequiredFields {
        self.pattern.required_fields()
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::write("file", "writer is closed"))?;

        let text = self.pattern.render(record);
        let result = if self.shared {
            Self::write_locked(writer, text.as_bytes())
        } else if self.buffered {
            writer.write_all(text.as_bytes())
        } else {
            writer.write_all(text.as_bytes()).and_then(|()| writer.flush())
        };

        result.map_err(|e| {
            LoggerError::write("file", format!("'{}': {}", self.path.display(), e))
        })
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Flush and drop the handle so the file is released
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}
