//! Call-site identification
//!
//! Every logging macro expansion owns one static [`CallSite`]. The first time
//! a site logs a record that needs the calling function, the
//! [`CallerResolver`] symbolicates the whole stack, expanding inlined calls
//! into their own logical frames. The caller is the frame right after the
//! outermost logging entry point (a `Logger` method or a registered facade).
//! Its position is cached, so later calls from that site capture the stack
//! and resolve only that one frame.
//!
//! The cached position assumes the set of wrapping facades does not change
//! while the process runs. Facades must register their entry points through
//! [`CallerResolver::register_internal`] before they start logging.

use super::logger::Logger;
use super::throwable::StackFrame;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

const UNKNOWN_OFFSET: usize = usize::MAX;
const INLINE_BITS: u32 = 16;
const INLINE_MASK: usize = (1 << INLINE_BITS) - 1;

/// Symbols of the language runtime, never reported as a caller
const RUNTIME_PREFIXES: [&str; 3] = ["core::", "std::", "alloc::"];

/// Marker rendered for caller fields that could not be determined
pub const UNAVAILABLE: &str = "<unknown>";

/// Position of a logical frame in a captured stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOffset {
    /// Index of the captured instruction pointer
    pub frame: usize,
    /// Index of the inlined symbol within that frame, innermost first
    pub inlined: usize,
}

impl FrameOffset {
    fn pack(self) -> Option<usize> {
        if self.inlined > INLINE_MASK || self.frame >= (UNKNOWN_OFFSET >> INLINE_BITS) {
            return None;
        }
        Some(self.frame << INLINE_BITS | self.inlined)
    }

    fn unpack(packed: usize) -> Self {
        Self {
            frame: packed >> INLINE_BITS,
            inlined: packed & INLINE_MASK,
        }
    }
}

/// A location in application code that issues log calls
#[derive(Debug)]
pub struct CallSite {
    module_path: Option<&'static str>,
    file: &'static str,
    line: u32,
    frame_offset: AtomicUsize,
}

impl CallSite {
    /// Used by the logging macros with `module_path!()`, `file!()` and `line!()`
    pub const fn new(module_path: &'static str, file: &'static str, line: u32) -> Self {
        Self {
            module_path: Some(module_path),
            file,
            line,
            frame_offset: AtomicUsize::new(UNKNOWN_OFFSET),
        }
    }

    fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            module_path: None,
            file: location.file(),
            line: location.line(),
            frame_offset: AtomicUsize::new(UNKNOWN_OFFSET),
        }
    }

    pub fn module_path(&self) -> Option<&'static str> {
        self.module_path
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Cached position of the caller in a captured stack
    pub fn frame_offset(&self) -> Option<FrameOffset> {
        match self.frame_offset.load(Ordering::Relaxed) {
            UNKNOWN_OFFSET => None,
            packed => Some(FrameOffset::unpack(packed)),
        }
    }

    fn remember(&self, offset: FrameOffset) {
        // Deterministic per site, so racing writers store the same value
        if let Some(packed) = offset.pack() {
            self.frame_offset.store(packed, Ordering::Relaxed);
        }
    }
}

/// Access to the current thread's call stack
pub trait FrameSource: Send + Sync {
    /// Instruction pointers of the current stack, innermost first, unresolved
    fn capture(&self) -> Vec<usize>;

    /// Symbolicate one captured frame into its logical frames, the innermost
    /// inlined call first. Empty when the frame has no symbol.
    fn resolve(&self, ip: usize) -> Vec<StackFrame>;
}

/// [`FrameSource`] backed by the `backtrace` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceSource;

impl FrameSource for BacktraceSource {
    fn capture(&self) -> Vec<usize> {
        let mut ips = Vec::with_capacity(48);
        backtrace::trace(|frame| {
            // Return addresses point past the call instruction
            ips.push((frame.ip() as usize).saturating_sub(1));
            true
        });
        ips
    }

    fn resolve(&self, ip: usize) -> Vec<StackFrame> {
        let mut resolved = Vec::new();
        backtrace::resolve(ip as *mut std::ffi::c_void, |symbol| {
            if let Some(name) = symbol.name() {
                resolved.push(StackFrame {
                    function: format!("{:#}", name),
                    file: symbol.filename().map(|path| path.display().to_string()),
                    line: symbol.lineno(),
                });
            }
        });
        resolved
    }
}

/// Symbol prefixes of the logging API's entry points
#[derive(Debug)]
pub struct EntryPoints {
    prefixes: RwLock<Vec<String>>,
}

impl EntryPoints {
    pub fn global() -> &'static EntryPoints {
        static ENTRY_POINTS: OnceLock<EntryPoints> = OnceLock::new();
        ENTRY_POINTS.get_or_init(|| EntryPoints {
            prefixes: RwLock::new(vec![std::any::type_name::<Logger>().to_string()]),
        })
    }

    pub fn register(&self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        let mut prefixes = self.prefixes.write();
        if !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
    }

    pub fn is_entry_point(&self, function: &str) -> bool {
        self.prefixes
            .read()
            .iter()
            .any(|prefix| symbol_starts_with(function, prefix))
    }
}

/// `prefix` matches whole path segments of `function`, ignoring the `<` of
/// trait-impl and inherent-impl wrappers
pub(crate) fn symbol_starts_with(function: &str, prefix: &str) -> bool {
    let function = function.trim_start_matches('<');
    match function.strip_prefix(prefix) {
        Some(rest) => {
            prefix.ends_with("::")
                || rest.is_empty()
                || rest.starts_with("::")
                || rest.starts_with('>')
                || rest.starts_with('<')
                || rest.starts_with(' ')
        }
        None => false,
    }
}

fn is_runtime(function: &str) -> bool {
    RUNTIME_PREFIXES
        .iter()
        .any(|prefix| symbol_starts_with(function, prefix))
}

/// Finds the application frame that issued a log call
pub struct CallerResolver {
    source: Arc<dyn FrameSource>,
    sites: RwLock<HashMap<(&'static str, u32, u32), Arc<CallSite>>>,
}

impl CallerResolver {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self {
            source,
            sites: RwLock::new(HashMap::new()),
        }
    }

    /// Treat frames whose symbol starts with `prefix` as a logging entry point
    pub fn register_internal(prefix: impl Into<String>) {
        EntryPoints::global().register(prefix);
    }

    /// Interned call site for a `#[track_caller]` location
    pub fn site_for(&self, location: &'static Location<'static>) -> Arc<CallSite> {
        let key = (location.file(), location.line(), location.column());
        if let Some(site) = self.sites.read().get(&key) {
            return Arc::clone(site);
        }
        let mut sites = self.sites.write();
        Arc::clone(
            sites
                .entry(key)
                .or_insert_with(|| Arc::new(CallSite::from_location(location))),
        )
    }

    /// Frame that called the outermost logging entry point, `None` if the
    /// stack is too shallow or cannot be symbolicated
    pub fn resolve(&self, site: &CallSite) -> Option<StackFrame> {
        let ips = self.source.capture();

        if let Some(offset) = site.frame_offset() {
            let ip = ips.get(offset.frame)?;
            return self.source.resolve(*ip).into_iter().nth(offset.inlined);
        }

        // Unresolvable frames keep a slot so positions stay aligned
        let mut logical: Vec<(FrameOffset, Option<StackFrame>)> = Vec::with_capacity(ips.len());
        for (frame, ip) in ips.iter().enumerate() {
            let symbols = self.source.resolve(*ip);
            if symbols.is_empty() {
                logical.push((FrameOffset { frame, inlined: 0 }, None));
            }
            for (inlined, symbol) in symbols.into_iter().enumerate() {
                logical.push((FrameOffset { frame, inlined }, Some(symbol)));
            }
        }

        let entry_points = EntryPoints::global();
        let boundary = logical.iter().rposition(|(_, frame)| {
            frame
                .as_ref()
                .is_some_and(|frame| entry_points.is_entry_point(&frame.function))
        })?;

        let (offset, frame) = logical
            .into_iter()
            .skip(boundary + 1)
            .find(|(_, frame)| frame.as_ref().map_or(true, |f| !is_runtime(&f.function)))?;
        let frame = frame?;
        site.remember(offset);
        Some(frame)
    }
}

impl Default for CallerResolver {
    fn default() -> Self {
        Self::new(Arc::new(BacktraceSource))
    }
}

/// Split a function path into its owning path (class) and function name.
///
/// `app::net::Conn::read` becomes (`app::net::Conn`, `read`); closure
/// segments are dropped and trait-impl wrappers are reduced to the self type.
pub fn split_function_path(function: &str) -> (Cow<'static, str>, Cow<'static, str>) {
    let mut path = function;
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }

    match path.rsplit_once("::") {
        Some((owner, method)) => {
            let mut owner = owner.trim_start_matches('<');
            if let Some(idx) = owner.find(" as ") {
                owner = &owner[..idx];
            }
            let owner = owner.trim_end_matches('>');
            (
                Cow::Owned(owner.to_string()),
                Cow::Owned(method.to_string()),
            )
        }
        None => (Cow::Borrowed(UNAVAILABLE), Cow::Owned(path.to_string())),
    }
}
