#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the logging pipeline.
//!
//! Each test runs a real [`LogService`] with a [`faultlog::FileSink`] in its
//! own temporary directory and inspects the file after `begin_shutdown`.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use common::*;
use faultlog::{LogConfig, LogService, Severity};

fn start(config: LogConfig) -> Arc<LogService> {
    let service = Arc::new(LogService::new());
    service.initialize(config).expect("initialize");
    service
}

// ---------------------------------------------------------------------------
// File contents
// ---------------------------------------------------------------------------

#[test]
fn new_file_starts_with_log_created() {
    let ctx = IntegrationTestContext::new();
    let service = start(ctx.config());
    service.log(Severity::Info, "A");
    service.log(Severity::Info, "B");
    service.log(Severity::Info, "C");
    service.begin_shutdown().expect("shutdown");

    insta::assert_snapshot!(entries_text(&ctx.read_log()), @r"
    (DEBUG) Log created.
    (INFO) A
    (INFO) B
    (INFO) C
    ");
}

#[test]
fn file_is_named_after_app_and_date() {
    let ctx = IntegrationTestContext::new();
    let service = start(ctx.config());
    let expected = service.current_log_path().expect("file logging is on");
    service.begin_shutdown().expect("shutdown");

    assert_eq!(ctx.log_files(), [expected.clone()]);
    let name = expected.file_name().unwrap().to_str().unwrap().to_string();
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    assert_eq!(name, format!("{APP_NAME}_{today}.log"));
}

#[test]
fn lines_carry_timestamp_thread_and_crlf() {
    let ctx = IntegrationTestContext::new();
    let service = start(ctx.config());
    thread::Builder::new()
        .name("producer".into())
        .spawn({
            let service = Arc::clone(&service);
            move || service.log(Severity::Warning, "from a named thread")
        })
        .unwrap()
        .join()
        .unwrap();
    service.begin_shutdown().expect("shutdown");

    let text = ctx.read_log();
    assert!(text.ends_with("\r\n"));
    let line = text
        .split_terminator("\r\n")
        .find(|l| l.ends_with("from a named thread"))
        .expect("line written");
    let (timestamp, rest) = line.split_once(": ").unwrap();
    assert_eq!(timestamp.len(), "2024-03-09 07:05:02.042".len());
    assert_eq!(rest, "[producer] (WARNING) from a named thread");
}

#[test]
fn debug_records_are_skipped_when_disabled() {
    let ctx = IntegrationTestContext::new();
    let service = start(LogConfig {
        include_debug: false,
        ..ctx.config()
    });
    service.log(Severity::Debug, "hidden");
    service.log(Severity::Info, "visible");
    service.begin_shutdown().expect("shutdown");

    assert_eq!(entries(&ctx.read_log()), ["(INFO) visible"]);
}

#[test]
fn template_arguments_are_sanitized() {
    let ctx = IntegrationTestContext::new();
    let service = start(LogConfig {
        include_debug: false,
        ..ctx.config()
    });
    service.log_template(
        Severity::Info,
        "user {0} opened {1} with {2}",
        &[Some("ana"), None, Some("  ")],
    );
    service.begin_shutdown().expect("shutdown");

    assert_eq!(
        entries(&ctx.read_log()),
        ["(INFO) user ana opened <null> with <whitespace>"]
    );
}

// ---------------------------------------------------------------------------
// Ordering and loss
// ---------------------------------------------------------------------------

#[test]
fn nothing_logged_before_shutdown_is_lost() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;

    let ctx = IntegrationTestContext::new();
    let service = start(LogConfig {
        include_debug: false,
        ..ctx.config()
    });
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let service = Arc::clone(&service);
            thread::Builder::new()
                .name(format!("producer-{t}"))
                .spawn(move || {
                    for i in 0..PER_THREAD {
                        service.log(Severity::Info, format!("{t}:{i}"));
                    }
                })
                .unwrap()
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    service.begin_shutdown().expect("shutdown");

    let lines = entries(&ctx.read_log());
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    let mut next: HashMap<usize, usize> = HashMap::new();
    for line in &lines {
        let body = line.strip_prefix("(INFO) ").unwrap();
        let (t, i) = body.split_once(':').unwrap();
        let (t, i): (usize, usize) = (t.parse().unwrap(), i.parse().unwrap());
        let expected = next.entry(t).or_insert(0);
        assert_eq!(i, *expected, "thread {t} out of order");
        *expected += 1;
    }
}

#[test]
fn console_only_notifies_every_record() {
    let ctx = IntegrationTestContext::new();
    let service = start(LogConfig {
        file_logging: false,
        ..ctx.config()
    });
    let seen: Arc<Mutex<Vec<(String, chrono::DateTime<chrono::Local>)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    service.on_entry_added(move |record| {
        sink.lock().unwrap().push((
            record.thread_name().unwrap_or_default().to_string(),
            record.timestamp(),
        ));
        Ok(())
    });

    let handles: Vec<_> = (0..10)
        .map(|t| {
            let service = Arc::clone(&service);
            thread::Builder::new()
                .name(format!("worker-{t}"))
                .spawn(move || {
                    for _ in 0..10 {
                        service.log(Severity::Warning, "x");
                    }
                })
                .unwrap()
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    service.begin_shutdown().expect("shutdown");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 100);
    for t in 0..10 {
        let name = format!("worker-{t}");
        let stamps: Vec<_> = seen.iter().filter(|(n, _)| *n == name).map(|(_, ts)| *ts).collect();
        assert_eq!(stamps.len(), 10);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "{name} out of order");
    }
    assert!(ctx.log_files().is_empty(), "no file with file logging off");
}

// ---------------------------------------------------------------------------
// Degradation and reopening
// ---------------------------------------------------------------------------

#[test]
fn unusable_directory_degrades_to_console() {
    let ctx = IntegrationTestContext::new();
    let blocker = ctx.log_dir().join("blocker");
    std::fs::write(&blocker, "a file, not a directory").unwrap();
    let service = start(LogConfig::new(APP_NAME, blocker.join("logs")));
    assert!(service.snapshot().file_not_accessible);

    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    service.on_entry_added(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    for n in 0..5 {
        service.log(Severity::GenericError, format!("still logging {n}"));
    }
    service.begin_shutdown().expect("shutdown");

    assert_eq!(count.load(Ordering::SeqCst), 5);
    let snap = service.snapshot();
    assert!(snap.disposed);
    assert!(snap.file_not_accessible, "degradation is sticky");
    assert!(blocker.is_file());
}

#[test]
fn second_run_appends_and_logs_reopened() {
    let ctx = IntegrationTestContext::new();
    let first = start(ctx.config());
    first.log(Severity::Info, "first run");
    first.begin_shutdown().expect("shutdown");

    let second = start(ctx.config());
    second.log(Severity::Info, "second run");
    second.begin_shutdown().expect("shutdown");

    insta::assert_snapshot!(entries_text(&ctx.read_log()), @r"
    (DEBUG) Log created.
    (INFO) first run
    (DEBUG) Log reopened.
    (INFO) second run
    ");
}

#[test]
fn repeated_shutdown_writes_nothing_more() {
    let ctx = IntegrationTestContext::new();
    let service = start(ctx.config());
    service.log(Severity::Info, "only");
    service.begin_shutdown().expect("first shutdown");
    service.begin_shutdown().expect("second shutdown");
    service.log(Severity::Info, "after disposal");
    drop(service);

    assert_eq!(
        entries(&ctx.read_log()),
        ["(DEBUG) Log created.", "(INFO) only"]
    );
}

#[test]
fn toggling_file_logging_reopens_the_file() {
    let ctx = IntegrationTestContext::new();
    let service = start(ctx.config());
    let path = service.current_log_path().unwrap();

    service.log(Severity::Info, "one");
    wait_until("first record on disk", || read(&path).contains("one"));
    service.set_file_logging(false);
    wait_until("file closed", || !service.snapshot().file_open);
    service.log(Severity::Info, "dropped");
    wait_until("queue drained", || service.pending() == 0);
    service.set_file_logging(true);
    wait_until("file reopened", || service.snapshot().file_open);
    service.log(Severity::Info, "two");
    service.begin_shutdown().expect("shutdown");

    insta::assert_snapshot!(entries_text(&ctx.read_log()), @r"
    (DEBUG) Log created.
    (INFO) one
    (DEBUG) Log reopened.
    (INFO) two
    ");
}

/// Log `count` numbered records, apply `change` and shut down at once.
/// Returns every entry found across all files in the log directory.
fn entries_after_change_then_shutdown(
    count: usize,
    change: impl FnOnce(&LogService, &IntegrationTestContext),
) -> Vec<String> {
    let ctx = IntegrationTestContext::new();
    let service = start(LogConfig {
        include_debug: false,
        ..ctx.config()
    });
    for i in 0..count {
        service.log(Severity::Info, format!("record {i}"));
    }
    change(&service, &ctx);
    service.begin_shutdown().expect("shutdown");
    ctx.log_files().iter().flat_map(|path| entries(&read(path))).collect()
}

fn assert_each_once(lines: &[String], count: usize) {
    assert_eq!(lines.len(), count, "{lines:?}");
    for i in 0..count {
        let expected = format!("(INFO) record {i}");
        assert_eq!(lines.iter().filter(|l| **l == expected).count(), 1, "{expected}");
    }
}

#[test]
fn path_change_right_before_shutdown_loses_nothing() {
    for _ in 0..10 {
        let lines = entries_after_change_then_shutdown(100, |service, ctx| {
            assert!(service.set_alternate_path(Some(&ctx.log_dir().join("moved.log"))));
        });
        assert_each_once(&lines, 100);
    }
}

#[test]
fn file_logging_off_right_before_shutdown_loses_nothing() {
    for _ in 0..10 {
        let lines =
            entries_after_change_then_shutdown(100, |service, _| service.set_file_logging(false));
        assert_each_once(&lines, 100);
    }
}

// ---------------------------------------------------------------------------
// Alternate path
// ---------------------------------------------------------------------------

#[test]
fn alternate_path_is_used_verbatim() {
    let ctx = IntegrationTestContext::new();
    let custom = ctx.log_dir().join("custom.txt");
    let service = start(LogConfig {
        alternate_path: Some(custom.clone()),
        include_debug: false,
        ..ctx.config()
    });
    assert_eq!(service.current_log_path(), Some(custom.clone()));
    service.log(Severity::Info, "into the custom file");
    service.begin_shutdown().expect("shutdown");

    assert_eq!(ctx.log_files(), [custom.clone()]);
    assert_eq!(entries(&read(&custom)), ["(INFO) into the custom file"]);
}

#[test]
fn switching_alternate_path_moves_logging() {
    let ctx = IntegrationTestContext::new();
    let service = start(LogConfig {
        include_debug: false,
        ..ctx.config()
    });
    let dated = service.current_log_path().unwrap();
    service.log(Severity::Info, "in the dated file");
    wait_until("first record on disk", || read(&dated).contains("dated file"));

    let moved = ctx.log_dir().join("moved.log");
    assert!(service.set_alternate_path(Some(&moved)));
    wait_until("alternate file opened", || moved.exists());
    service.log(Severity::Info, "in the alternate file");
    service.begin_shutdown().expect("shutdown");

    assert_eq!(entries(&read(&dated)), ["(INFO) in the dated file"]);
    assert_eq!(entries(&read(&moved)), ["(INFO) in the alternate file"]);
}

#[test]
fn invalid_alternate_path_is_logged_and_refused() {
    let ctx = IntegrationTestContext::new();
    let service = start(LogConfig {
        include_debug: false,
        ..ctx.config()
    });
    assert!(!service.set_alternate_path(Some(std::path::Path::new("relative.log"))));
    service.begin_shutdown().expect("shutdown");

    let lines = entries(&ctx.read_log());
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("(ERROR) Invalid alternate log path 'relative.log'"));
}
