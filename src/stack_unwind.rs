//! In-process stack capture
//!
//! The attributor never walks the stack itself: it asks a [`StackProvider`]
//! for a list of [`RawFrame`]s, innermost first. [`BacktraceProvider`] walks
//! the live stack of the calling thread with the `backtrace` crate and
//! resolves file paths and demangled symbol names from debug info.
//! [`StaticStackProvider`] replays a fixed frame list.

use crate::attribution::AttributionError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Maximum stack depth to unwind (bounds the latency added to each call)
pub const MAX_STACK_DEPTH: usize = 64;

/// Displayed in place of an argument value that could not be rendered
pub const UNRENDERABLE_ARG: &str = "<?>";

/// A named argument value captured from a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameArg {
    pub name: String,
    /// `None` when the value could not be rendered
    pub value: Option<String>,
}

impl FrameArg {
    pub fn rendered(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            value: Some(value.to_string()),
        }
    }

    pub fn unrenderable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn display_value(&self) -> &str {
        self.value.as_deref().unwrap_or(UNRENDERABLE_ARG)
    }
}

/// A single frame as reported by a stack provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    /// Source file, when debug info has one
    pub file: Option<PathBuf>,
    /// Bare function name
    pub function: String,
    /// Type name of the bound receiver, if the function is a method
    pub self_type: Option<String>,
    pub args: Vec<FrameArg>,
}

impl RawFrame {
    pub fn new(file: impl Into<PathBuf>, function: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            function: function.into(),
            self_type: None,
            args: Vec::new(),
        }
    }

    pub fn with_self_type(mut self, self_type: impl Into<String>) -> Self {
        self.self_type = Some(self_type.into());
        self
    }

    pub fn with_arg(mut self, arg: FrameArg) -> Self {
        self.args.push(arg);
        self
    }
}

/// Source of the currently executing call stack
pub trait StackProvider: Send + Sync {
    /// Frames of the calling thread, innermost first
    fn capture(&self) -> Result<Vec<RawFrame>, AttributionError>;
}

/// Walks the calling thread's stack with the `backtrace` crate
#[derive(Debug, Clone)]
pub struct BacktraceProvider {
    max_depth: usize,
}

impl Default for BacktraceProvider {
    fn default() -> Self {
        Self {
            max_depth: MAX_STACK_DEPTH,
        }
    }
}

impl BacktraceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl StackProvider for BacktraceProvider {
    fn capture(&self) -> Result<Vec<RawFrame>, AttributionError> {
        let mut frames = Vec::with_capacity(16);
        let mut skipped = 0;
        let mut in_caller = false;

        backtrace::trace(|frame| {
            let mut resolved = Vec::new();
            // Inlined calls resolve to several symbols for one physical frame
            backtrace::resolve_frame(frame, |symbol| {
                if let Some(name) = symbol.name() {
                    resolved.push((format!("{:#}", name), symbol.filename().map(absolutize)));
                }
            });

            // The depth budget starts at the first resolved frame outside the
            // capture and dispatch path
            if !in_caller {
                let machinery = resolved.iter().all(|(name, _)| is_instrumentation_frame(name));
                if machinery && skipped < MAX_SKIPPED_FRAMES {
                    skipped += 1;
                    return true;
                }
                in_caller = true;
            }

            for (name, file) in resolved {
                let (self_type, function) = parse_symbol(&name);
                frames.push(RawFrame {
                    file,
                    function,
                    self_type,
                    args: Vec::new(),
                });
            }

            frames.len() < self.max_depth
        });

        if frames.is_empty() {
            return Err(AttributionError::NoFrames);
        }
        frames.truncate(self.max_depth);
        Ok(frames)
    }
}

/// Upper bound on leading instrumentation frames skipped before counting
const MAX_SKIPPED_FRAMES: usize = 64;

/// Symbol prefixes of frames between the caller and the unwinder
const INSTRUMENTATION_PREFIXES: &[&str] = &[
    "backtrace::",
    "httpwatch::",
    "std::panicking::",
    "std::panic::",
    "core::panic::",
    "core::ops::function::",
    "alloc::boxed::",
    "alloc::sync::",
    "__rust_try",
];

/// True for frames of the unwinder, httpwatch's recording and dispatch path,
/// and the std shims they call through
pub fn is_instrumentation_frame(symbol: &str) -> bool {
    let symbol = symbol.trim_start().trim_start_matches('<');
    INSTRUMENTATION_PREFIXES
        .iter()
        .any(|prefix| symbol.starts_with(prefix))
}

/// Replays a fixed list of frames
#[derive(Debug, Clone, Default)]
pub struct StaticStackProvider {
    frames: Vec<RawFrame>,
}

impl StaticStackProvider {
    pub fn new(frames: Vec<RawFrame>) -> Self {
        Self { frames }
    }
}

impl StackProvider for StaticStackProvider {
    fn capture(&self) -> Result<Vec<RawFrame>, AttributionError> {
        Ok(self.frames.clone())
    }
}

/// Relative debug-info paths are taken relative to the current directory
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Split a demangled symbol into (receiver type, function name)
///
/// - `a::b::Type::method` → (`Type`, `method`)
/// - `<a::Type<T> as a::Trait>::method` → (`Type`, `method`)
/// - `a::b::function::{{closure}}` → (none, `function`)
pub fn parse_symbol(symbol: &str) -> (Option<String>, String) {
    let symbol = symbol.trim();

    if let Some(rest) = symbol.strip_prefix('<') {
        if let Some(close) = matching_angle(rest) {
            let qualified = &rest[..close];
            let tail = &rest[close + 1..];
            let self_path = match find_top_level(qualified, " as ") {
                Some(idx) => &qualified[..idx],
                None => qualified,
            };
            let function = named_segments(tail)
                .last()
                .map(|s| s.to_string())
                .unwrap_or_else(|| symbol.to_string());
            return (type_name(self_path), function);
        }
    }

    let segments = named_segments(symbol);
    match segments.as_slice() {
        [] => (None, symbol.to_string()),
        [only] => (None, only.to_string()),
        [.., owner, function] => {
            let self_type = owner
                .starts_with(|c: char| c.is_ascii_uppercase())
                .then(|| strip_generics(owner).to_string());
            (self_type, function.to_string())
        }
    }
}

/// Index of the `>` closing an already-consumed `<`
fn matching_angle(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut prev = '\0';
    for (idx, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
        prev = c;
    }
    None
}

/// Byte index of `pat` outside any bracket nesting
fn find_top_level(s: &str, pat: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut prev = '\0';
    for (idx, c) in s.char_indices() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' if prev != '-' => depth -= 1,
            ')' | ']' | '}' => depth -= 1,
            _ if depth == 0 && s[idx..].starts_with(pat) => return Some(idx),
            _ => {}
        }
        prev = c;
    }
    None
}

/// Top-level `::` segments, without closure/shim markers like `{{closure}}`
fn named_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut rest = path;
    while let Some(idx) = find_top_level(rest, "::") {
        segments.push(&rest[..idx]);
        rest = &rest[idx + 2..];
    }
    segments.push(rest);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .collect()
}

fn strip_generics(segment: &str) -> &str {
    match segment.find('<') {
        Some(0) | None => segment,
        Some(idx) => &segment[..idx],
    }
}

fn type_name(path: &str) -> Option<String> {
    let path = path
        .trim()
        .trim_start_matches('&')
        .trim_start_matches("mut ")
        .trim_start_matches("dyn ")
        .trim_start_matches("impl ");
    let last = named_segments(path).last().copied()?;
    let name = strip_generics(last);
    (!name.is_empty()).then(|| name.to_string())
}
