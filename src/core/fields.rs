//! Record fields a writer can ask for

use bitflags::bitflags;
use std::str::FromStr;

bitflags! {
    /// Set of [`LogRecord`](super::LogRecord) fields a writer consumes.
    ///
    /// The logger only fills the union of the fields required by the writers
    /// that accept a given record, so expensive fields (notably `METHOD`, which
    /// needs a stack walk) are skipped when nobody renders them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RequiredFields: u16 {
        const LEVEL = 1 << 0;
        const MESSAGE = 1 << 1;
        const EXCEPTION = 1 << 2;
        const DATE = 1 << 3;
        const CLASS = 1 << 4;
        const METHOD = 1 << 5;
        const FILE = 1 << 6;
        const LINE = 1 << 7;
        const THREAD = 1 << 8;
    }
}

impl RequiredFields {
    /// Fields that can only be determined by inspecting the call stack
    pub const CALLER: RequiredFields = RequiredFields::CLASS.union(RequiredFields::METHOD);
}

impl FromStr for RequiredFields {
    type Err = String;

    /// Parses a single field name such as `"message"` or `"line"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "level" => Ok(RequiredFields::LEVEL),
            "message" => Ok(RequiredFields::MESSAGE),
            "exception" => Ok(RequiredFields::EXCEPTION),
            "date" => Ok(RequiredFields::DATE),
            "class" => Ok(RequiredFields::CLASS),
            "method" => Ok(RequiredFields::METHOD),
            "file" => Ok(RequiredFields::FILE),
            "line" => Ok(RequiredFields::LINE),
            "thread" => Ok(RequiredFields::THREAD),
            other => Err(format!("Unknown record field '{}'", other)),
        }
    }
}
