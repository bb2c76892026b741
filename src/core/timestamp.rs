//! Date formatting for the `{date}` pattern token
//!
//! A sub-format is either one of the named presets (`iso8601`, `rfc3339`,
//! `unix`, ...) or a strftime string. Strftime strings are validated when the
//! pattern is compiled so rendering can never fail.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Locale};

/// Sub-format used by `{date}` without an explicit one
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compiled `{date}` sub-format
///
/// # Examples
///
/// ```
/// use rust_logger_core::core::DateFormat;
///
/// assert_eq!(DateFormat::parse("iso8601"), Ok(DateFormat::Iso8601));
/// assert!(DateFormat::parse("%Y-%m-%d").is_ok());
/// assert!(DateFormat::parse("%Q").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFormat {
    /// `2025-01-08T10:30:45.123+01:00`
    Iso8601,

    /// `2025-01-08T10:30:45.123456+01:00`
    Iso8601Micros,

    /// `2025-01-08T10:30:45+01:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Unix timestamp in microseconds: `1736332245123456`
    UnixMicros,

    /// Validated strftime format, rendered with the configured locale
    Custom(String),
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat::Custom(DEFAULT_DATE_FORMAT.to_string())
    }
}

impl DateFormat {
    /// Parse a sub-format; strftime strings with unknown specifiers are rejected
    pub fn parse(spec: &str) -> Result<Self, String> {
        match spec {
            "iso8601" => Ok(DateFormat::Iso8601),
            "iso8601_micros" => Ok(DateFormat::Iso8601Micros),
            "rfc3339" => Ok(DateFormat::Rfc3339),
            "unix" => Ok(DateFormat::Unix),
            "unix_millis" => Ok(DateFormat::UnixMillis),
            "unix_micros" => Ok(DateFormat::UnixMicros),
            custom => {
                if custom.is_empty() {
                    return Err("empty date format".to_string());
                }
                if StrftimeItems::new(custom).any(|item| matches!(item, Item::Error)) {
                    return Err(format!("invalid date format '{}'", custom));
                }
                Ok(DateFormat::Custom(custom.to_string()))
            }
        }
    }

    #[must_use]
    pub fn format(&self, datetime: &DateTime<Local>, locale: Locale) -> String {
        match self {
            DateFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
            DateFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string(),
            DateFormat::Rfc3339 => datetime.to_rfc3339(),
            DateFormat::Unix => datetime.timestamp().to_string(),
            DateFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            DateFormat::UnixMicros => datetime.timestamp_micros().to_string(),
            DateFormat::Custom(format_str) => {
                datetime.format_localized(format_str, locale).to_string()
            }
        }
    }
}

/// Parse a locale tag such as `de_DE`
pub fn parse_locale(tag: &str) -> Result<Locale, String> {
    Locale::try_from(tag).map_err(|_| format!("unknown locale '{}'", tag))
}
