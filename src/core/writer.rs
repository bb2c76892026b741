//! Writer trait for log output destinations

use super::{error::Result, fields::RequiredFields, log_record::LogRecord};

/// A sink that persists or emits filled [`LogRecord`]s.
///
/// Calls on one writer are always serialized by the dispatcher, either by a
/// lock or by a single worker thread, so implementations need no internal
/// synchronization.
pub trait Writer: Send {
    /// Record fields this writer reads; the logger fills nothing else
    fn required_fields(&self) -> RequiredFields;

    fn write(&mut self, record: &LogRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Release resources; no writes follow
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str;
}
