//! Core logging types: severity levels and the immutable [`LogRecord`].
use chrono::{DateTime, Local};

use super::utils::{format_local_timestamp, thread_label};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Diagnostic detail; dropped at the call site unless debug logging is on.
    Debug,
    /// Informational message.
    Info,
    /// Something unexpected that the application recovered from.
    Warning,
    /// A failure that did not terminate the application.
    GenericError,
    /// A failure that is terminating the application.
    CriticalError,
}

impl Severity {
    /// Uppercase tag written between parentheses in the log file.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::GenericError => "ERROR",
            Self::CriticalError => "CRITICAL",
        }
    }

    /// Severity used when reporting a failure.
    #[must_use]
    pub const fn for_failure(terminating: bool) -> Self {
        if terminating {
            Self::CriticalError
        } else {
            Self::GenericError
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One formatted log line, captured on the calling thread.
///
/// The timestamp and thread label are taken when the record is created,
/// not when the writer thread later dequeues it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    thread_name: Option<String>,
    severity: Severity,
    message: String,
}

impl LogRecord {
    /// Capture a record for the current thread at the current local time.
    #[must_use]
    pub fn capture(severity: Severity, message: String) -> Self {
        Self {
            timestamp: Local::now(),
            thread_name: thread_label(),
            severity,
            message,
        }
    }

    /// Build a record from explicit parts.
    #[must_use]
    pub const fn from_parts(
        timestamp: DateTime<Local>,
        thread_name: Option<String>,
        severity: Severity,
        message: String,
    ) -> Self {
        Self {
            timestamp,
            thread_name,
            severity,
            message,
        }
    }

    /// Time of the logging call.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Label of the originating thread, if it had one.
    #[must_use]
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Severity of the record.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Fully formatted message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Serialize to the on-disk line format, including the trailing CRLF.
    ///
    /// `YYYY-MM-DD hh:mm:ss.fff: [thread] (SEVERITY) message\r\n`, with the
    /// thread segment omitted when the record has no thread label.
    #[must_use]
    pub fn to_line(&self) -> String {
        let ts = format_local_timestamp(&self.timestamp);
        let sev = self.severity.tag();
        match &self.thread_name {
            Some(thread) => format!("{ts}: [{thread}] ({sev}) {}\r\n", self.message),
            None => format!("{ts}: ({sev}) {}\r\n", self.message),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 2)
            .single()
            .expect("unambiguous local time")
            + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn line_format_with_thread() {
        let rec = LogRecord::from_parts(
            fixed_time(),
            Some("main".to_string()),
            Severity::Warning,
            "disk almost full".to_string(),
        );
        insta::assert_snapshot!(
            rec.to_line().trim_end(),
            @"2024-03-09 07:05:02.042: [main] (WARNING) disk almost full"
        );
    }

    #[test]
    fn line_format_without_thread_omits_segment() {
        let rec = LogRecord::from_parts(
            fixed_time(),
            None,
            Severity::Debug,
            "Log created.".to_string(),
        );
        insta::assert_snapshot!(
            rec.to_line().trim_end(),
            @"2024-03-09 07:05:02.042: (DEBUG) Log created."
        );
    }

    #[test]
    fn line_ends_with_crlf() {
        let rec = LogRecord::from_parts(fixed_time(), None, Severity::Info, "x".into());
        assert!(rec.to_line().ends_with("\r\n"));
    }

    #[test]
    fn capture_uses_thread_name() {
        let rec = std::thread::Builder::new()
            .name("producer-7".to_string())
            .spawn(|| LogRecord::capture(Severity::Info, "hello".into()))
            .expect("spawn")
            .join()
            .expect("join");
        assert_eq!(rec.thread_name(), Some("producer-7"));
        assert_eq!(rec.message(), "hello");
    }

    #[test]
    fn severity_tags() {
        assert_eq!(Severity::Debug.tag(), "DEBUG");
        assert_eq!(Severity::Info.tag(), "INFO");
        assert_eq!(Severity::Warning.tag(), "WARNING");
        assert_eq!(Severity::GenericError.tag(), "ERROR");
        assert_eq!(Severity::CriticalError.tag(), "CRITICAL");
    }

    #[test]
    fn failure_severity_follows_terminating_flag() {
        assert_eq!(Severity::for_failure(true), Severity::CriticalError);
        assert_eq!(Severity::for_failure(false), Severity::GenericError);
    }

    #[test]
    fn severity_orders_by_importance() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::GenericError < Severity::CriticalError);
    }
}
