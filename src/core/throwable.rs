//! Exception snapshots and their text rendering
//!
//! A [`Throwable`] is an immutable description of a failure: a type name, an
//! optional message, the stack frames it was raised from and an optional
//! cause. [`render`] turns a cause chain into the text that the `{exception}`
//! and `{message}` tokens print.

use super::caller::{symbol_starts_with, BacktraceSource, FrameSource};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Causes deeper than this are not rendered
pub const MAX_CAUSE_DEPTH: usize = 64;

#[cfg(windows)]
pub const NEW_LINE: &str = "\r\n";
#[cfg(not(windows))]
pub const NEW_LINE: &str = "\n";

/// One resolved frame of a call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Fully qualified function path, e.g. `app::server::handle`
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            file: None,
            line: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}({}:{})", self.function, file, line),
            (Some(file), None) => write!(f, "{}({})", self.function, file),
            _ => write!(f, "{}(Unknown Source)", self.function),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throwable {
    class_name: String,
    message: Option<String>,
    frames: Vec<StackFrame>,
    cause: Option<Arc<Throwable>>,
}

impl Throwable {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: None,
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Snapshot the current call stack, minus the logger's own frames
    pub fn capture(class_name: impl Into<String>, message: Option<String>) -> Self {
        let source = BacktraceSource;
        let mut frames: Vec<StackFrame> = source
            .capture()
            .into_iter()
            .flat_map(|ip| source.resolve(ip))
            .collect();

        let entry = format!("{}::capture", std::any::type_name::<Throwable>());
        if let Some(idx) = frames
            .iter()
            .position(|frame| symbol_starts_with(&frame.function, &entry))
        {
            frames.drain(..=idx);
        }

        Self {
            class_name: class_name.into(),
            message,
            frames,
            cause: None,
        }
    }

    /// Convert an error and its `source()` chain.
    ///
    /// The outermost error is named after its Rust type. Sources are only
    /// reachable as trait objects, so their name is taken from the leading
    /// identifier of their `Debug` output.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let mut chain: Vec<Throwable> = Vec::new();
        let mut current: Option<&(dyn Error + 'static)> = error.source();
        while let Some(source) = current {
            if chain.len() >= MAX_CAUSE_DEPTH {
                break;
            }
            chain.push(Self::from_dyn(source));
            current = source.source();
        }

        let mut cause: Option<Arc<Throwable>> = None;
        while let Some(mut link) = chain.pop() {
            link.cause = cause.take();
            cause = Some(Arc::new(link));
        }

        Self {
            class_name: std::any::type_name::<E>().to_string(),
            message: non_empty(error.to_string()),
            frames: Vec::new(),
            cause,
        }
    }

    fn from_dyn(error: &(dyn Error + 'static)) -> Self {
        let debug = format!("{:?}", error);
        let name: String = debug
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
            .collect();

        Self {
            class_name: if name.is_empty() {
                "error".to_string()
            } else {
                name
            },
            message: non_empty(error.to_string()),
            frames: Vec::new(),
            cause: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<Arc<Throwable>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn cause(&self) -> Option<&Throwable> {
        self.cause.as_deref()
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, None))
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Render `throwable` and its causes.
///
/// `max_stack_depth` limits the frames printed per exception: `Some(0)`
/// prints neither frames nor a marker, `Some(n)` prints at most `n`
/// followed by a `...` line when frames were cut, `None` prints all of them.
/// The result has no trailing line terminator.
pub fn render(throwable: &Throwable, max_stack_depth: Option<usize>) -> String {
    let mut out = String::new();
    let mut current = Some(throwable);
    let mut depth = 0;

    while let Some(exception) = current {
        if depth > 0 {
            out.push_str(NEW_LINE);
            out.push_str("Caused by: ");
        }

        out.push_str(&exception.class_name);
        if let Some(message) = &exception.message {
            out.push_str(": ");
            out.push_str(message);
        }

        let frames = &exception.frames;
        let shown = max_stack_depth.map_or(frames.len(), |max| max.min(frames.len()));
        for frame in &frames[..shown] {
            out.push_str(NEW_LINE);
            out.push_str("\tat ");
            out.push_str(&frame.to_string());
        }
        if shown > 0 && shown < frames.len() {
            out.push_str(NEW_LINE);
            out.push_str("\t...");
        }

        depth += 1;
        if depth > MAX_CAUSE_DEPTH {
            break;
        }
        current = exception.cause.as_deref();
    }

    out
}
