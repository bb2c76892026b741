//! Effective level resolution by longest module-path prefix

use super::log_level::LogLevel;
use std::collections::HashMap;

const SEPARATOR: &str = "::";

/// Level rules of one configuration snapshot.
///
/// A rule for `app::net` applies to `app::net` itself and to everything
/// below it (`app::net::tcp`), but not to `app::network`. Callers that no
/// rule covers get the default level.
#[derive(Debug, Clone)]
pub struct LevelRegistry {
    default: LogLevel,
    rules: HashMap<String, LogLevel>,
    /// Lowest level any rule (or the default) lets through
    floor: LogLevel,
}

impl LevelRegistry {
    pub fn new<I, S>(default: LogLevel, rules: I) -> Self
    where
        I: IntoIterator<Item = (S, LogLevel)>,
        S: Into<String>,
    {
        let rules: HashMap<String, LogLevel> = rules
            .into_iter()
            .map(|(prefix, level)| (prefix.into(), level))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        let floor = rules.values().copied().fold(default, LogLevel::min);

        Self {
            default,
            rules,
            floor,
        }
    }

    #[must_use]
    pub fn default_level(&self) -> LogLevel {
        self.default
    }

    /// `true` when no prefix rule exists, so the caller's name never matters
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.rules.is_empty()
    }

    /// Effective level for `caller`, resolved without allocating
    #[must_use]
    pub fn effective_level(&self, caller: &str) -> LogLevel {
        if self.rules.is_empty() {
            return self.default;
        }

        let mut candidate = caller;
        loop {
            if let Some(level) = self.rules.get(candidate) {
                return *level;
            }
            match candidate.rfind(SEPARATOR) {
                Some(idx) => candidate = &candidate[..idx],
                None => return self.default,
            }
        }
    }

    /// Fast gate evaluated before any record is built
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, caller: &str, level: LogLevel) -> bool {
        if level == LogLevel::Off || level < self.floor {
            return false;
        }
        level >= self.effective_level(caller)
    }

    /// Whether `level` can pass for at least one caller
    #[inline]
    #[must_use]
    pub fn may_be_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.floor
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new(LogLevel::default(), std::iter::empty::<(String, LogLevel)>())
    }
}
