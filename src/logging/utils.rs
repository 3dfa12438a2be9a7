//! Utility functions for thread labels, message templates, and time formatting.
use std::cell::RefCell;

use chrono::{DateTime, Local, NaiveDate};

thread_local! {
    /// Label for the current thread when the OS thread has no name.
    ///
    /// `std::thread::scope` and most pool crates spawn unnamed threads, so
    /// `std::thread::current().name()` returns `None` there.
    static THREAD_LABEL: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Placeholder written for an absent template argument.
pub const NULL_ARG: &str = "<null>";
/// Placeholder written for an empty template argument.
pub const EMPTY_ARG: &str = "<empty>";
/// Placeholder written for a whitespace-only template argument.
pub const WHITESPACE_ARG: &str = "<whitespace>";

/// Set the label recorded for log calls made from the current thread.
///
/// Used only when the OS thread has no name of its own.
pub fn set_thread_label(name: &str) {
    THREAD_LABEL.with(|cell| {
        *cell.borrow_mut() = Some(name.to_string());
    });
}

/// Label of the current thread: its OS name, else the label set with
/// [`set_thread_label`], else `None`.
#[must_use]
pub fn thread_label() -> Option<String> {
    let thread = std::thread::current();
    if let Some(name) = thread.name() {
        return Some(name.to_string());
    }
    THREAD_LABEL.with(|cell| cell.borrow().clone())
}

/// Format a timestamp as `YYYY-MM-DD hh:mm:ss.fff`.
pub(super) fn format_local_timestamp(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Daily log file name: `<app>_<YYYY-MM-DD>.log`.
pub(crate) fn dated_file_name(app_name: &str, date: NaiveDate) -> String {
    format!("{app_name}_{}.log", date.format("%Y-%m-%d"))
}

/// Replace a template argument that carries no readable text.
fn sanitize_arg(arg: Option<&str>) -> &str {
    match arg {
        None => NULL_ARG,
        Some("") => EMPTY_ARG,
        Some(s) if s.trim().is_empty() => WHITESPACE_ARG,
        Some(s) => s,
    }
}

/// Substitute `{0}`, `{1}`, … in `template` with the sanitized arguments.
///
/// Absent, empty and whitespace-only arguments are replaced by
/// [`NULL_ARG`], [`EMPTY_ARG`] and [`WHITESPACE_ARG`].  Placeholders whose
/// index has no argument, and braces that do not form a placeholder, are
/// copied verbatim.
#[must_use]
pub fn format_template(template: &str, args: &[Option<&str>]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((before, after_brace)) = rest.split_once('{') {
        out.push_str(before);
        let substituted = after_brace.split_once('}').and_then(|(inner, tail)| {
            let index: usize = inner.parse().ok()?;
            let arg = args.get(index)?;
            Some((sanitize_arg(*arg), tail))
        });
        if let Some((value, tail)) = substituted {
            out.push_str(value);
            rest = tail;
        } else {
            out.push('{');
            rest = after_brace;
        }
    }
    out.push_str(rest);
    out
}
