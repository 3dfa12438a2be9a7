//! Captured failures: errors and panics turned into loggable values.
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicU64, Ordering};

/// Native code returned for failures that carry no OS error code.
pub const FAILURE_CODE: i32 = -1;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one captured failure.
///
/// Every capture gets a fresh id; clones of an [`ExceptionInfo`] keep it,
/// which is what lets two hook channels recognise the same failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionId(u64);

impl ExceptionId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A failure captured from an error value or a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    id: ExceptionId,
    message: String,
    causes: Vec<String>,
    origin: Option<String>,
    stack: Option<String>,
    code: i32,
}

/// Text of a panic payload, for the two payload types `panic!` produces.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn captured_stack(backtrace: &Backtrace) -> Option<String> {
    (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string())
}

/// Collapse a multi-line text onto one line.
fn one_line(text: &str, separator: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn os_code(err: &std::io::Error) -> i32 {
    err.raw_os_error()
        .filter(|&c| c != 0)
        .unwrap_or(FAILURE_CODE)
}

impl ExceptionInfo {
    /// A failure with just a message and a fresh identity.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: ExceptionId::next(),
            message: message.into(),
            causes: Vec::new(),
            origin: None,
            stack: None,
            code: FAILURE_CODE,
        }
    }

    /// Set where the failure happened (for example `src/main.rs:12`).
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach a stack trace.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Override the native error code. Zero is reserved for success and is
    /// mapped to [`FAILURE_CODE`].
    #[must_use]
    pub const fn with_code(mut self, code: i32) -> Self {
        self.code = if code == 0 { FAILURE_CODE } else { code };
        self
    }

    /// Capture an [`anyhow::Error`] with its cause chain and backtrace.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|e| e.downcast_ref::<std::io::Error>())
            .map_or(FAILURE_CODE, os_code);
        Self {
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
            stack: captured_stack(err.backtrace()),
            code,
            ..Self::new(err.to_string())
        }
    }

    /// Capture any standard error with its `source()` chain.
    #[must_use]
    pub fn from_std_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut code = err
            .downcast_ref::<std::io::Error>()
            .map_or(FAILURE_CODE, os_code);
        let mut next = err.source();
        while let Some(cause) = next {
            causes.push(cause.to_string());
            if code == FAILURE_CODE
                && let Some(io) = cause.downcast_ref::<std::io::Error>()
            {
                code = os_code(io);
            }
            next = cause.source();
        }
        Self {
            causes,
            code,
            ..Self::new(err.to_string())
        }
    }

    /// Capture a panic from inside the panic hook, with location and, when
    /// `RUST_BACKTRACE` enables it, a backtrace.
    #[must_use]
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let mut captured = Self::new(panic_message(info.payload()));
        captured.origin = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));
        captured.stack = captured_stack(&Backtrace::capture());
        captured
    }

    /// Capture a panic payload returned by `catch_unwind` or `join`.
    #[must_use]
    pub fn from_panic_payload(payload: &(dyn Any + Send)) -> Self {
        Self::new(panic_message(payload))
    }

    /// Identity shared by all clones of this capture.
    #[must_use]
    pub const fn id(&self) -> ExceptionId {
        self.id
    }

    /// Top-level failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Messages of the underlying causes, outermost first.
    #[must_use]
    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    /// Source location, if known.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Stack trace, if one was captured.
    #[must_use]
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Native error code; never zero.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Message, causes, origin and stack on a single line.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = one_line(&self.message, " ");
        if !self.causes.is_empty() {
            let causes: Vec<String> = self.causes.iter().map(|c| one_line(c, " ")).collect();
            line.push_str(&format!(" (caused by: {})", causes.join(": ")));
        }
        if let Some(origin) = &self.origin {
            line.push_str(&format!(" at {origin}"));
        }
        if let Some(stack) = &self.stack {
            line.push_str(&format!(" | stack: {}", one_line(stack, " <- ")));
        }
        line
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use anyhow::Context as _;
    use std::io;

    #[test]
    fn clones_share_identity() {
        let a = ExceptionInfo::new("boom");
        let b = a.clone();
        let c = ExceptionInfo::new("boom");
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id(), "separate captures get separate ids");
    }

    #[test]
    fn from_error_keeps_chain_and_os_code() {
        let err = Err::<(), _>(io::Error::from_raw_os_error(13))
            .context("opening settings")
            .unwrap_err();
        let info = ExceptionInfo::from_error(&err);
        assert_eq!(info.message(), "opening settings");
        assert_eq!(info.causes().len(), 1);
        assert_eq!(info.code(), 13);
    }

    #[test]
    fn from_error_without_io_uses_failure_code() {
        let info = ExceptionInfo::from_error(&anyhow::anyhow!("plain failure"));
        assert_eq!(info.code(), FAILURE_CODE);
        assert!(info.causes().is_empty());
    }

    #[test]
    fn from_std_error_walks_sources() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer")]
        struct Outer(#[source] io::Error);

        let err = Outer(io::Error::from_raw_os_error(2));
        let info = ExceptionInfo::from_std_error(&err);
        assert_eq!(info.message(), "outer");
        assert_eq!(info.causes().len(), 1);
        assert_eq!(info.code(), 2);
    }

    #[test]
    fn zero_code_is_not_success() {
        assert_eq!(ExceptionInfo::new("x").with_code(0).code(), FAILURE_CODE);
        assert_eq!(ExceptionInfo::new("x").with_code(5).code(), 5);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload = std::panic::catch_unwind(|| panic!("static text")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static text");
        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn summary_is_single_line() {
        let info = ExceptionInfo::new("first\nsecond")
            .with_origin("src/app.rs:10:5")
            .with_stack("frame one\n   frame two\n");
        assert_eq!(
            info.summary(),
            "first second at src/app.rs:10:5 | stack: frame one <- frame two"
        );
    }
}
