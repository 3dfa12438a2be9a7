//! Tracing subscriber setup: console formatter and initialisation.
use super::pipeline::{INTERNAL_TARGET, RECORD_TARGET};

/// Extracts the `message` and `thread` fields from a [`tracing::Event`].
#[derive(Default)]
struct FieldExtractor {
    message: String,
    thread: Option<String>,
}

impl tracing::field::Visit for FieldExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "thread" => self.thread = Some(format!("{value:?}")),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "thread" => self.thread = Some(value.to_string()),
            _ => {}
        }
    }
}

/// One console line for an event, without the trailing newline.
fn render_line(level: tracing::Level, target: &str, thread: Option<&str>, msg: &str) -> String {
    let tag = match level {
        tracing::Level::ERROR => "\x1b[31mERROR\x1b[0m",
        tracing::Level::WARN => "\x1b[33mWARN\x1b[0m ",
        tracing::Level::INFO => "\x1b[32mINFO\x1b[0m ",
        _ => "\x1b[2mDEBUG\x1b[0m",
    };
    if target == RECORD_TARGET {
        match thread {
            Some(thread) if thread != "-" => format!("{tag} [{thread}] {msg}"),
            _ => format!("{tag} {msg}"),
        }
    } else if target.starts_with(INTERNAL_TARGET) {
        format!("{tag} \x1b[2mfaultlog:\x1b[0m {msg}")
    } else {
        format!("{tag} {msg}")
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] for faultlog console output.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut extractor = FieldExtractor::default();
        event.record(&mut extractor);
        let line = render_line(
            *metadata.level(),
            metadata.target(),
            extractor.thread.as_deref(),
            &extractor.message,
        );
        writeln!(writer, "{line}")
    }
}

/// Initialise the global [`tracing`] subscriber for console output.
///
/// Warnings and errors go to stderr, everything else to stdout.  The
/// default level is `DEBUG` when `verbose` and `INFO` otherwise; `RUST_LOG`
/// overrides it.  Must be called once at program startup, before any
/// logging.  The library itself never installs a subscriber.
pub fn init_subscriber(verbose: bool) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        EnvFilter, Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(filter);

    tracing_subscriber::registry().with(console_layer).init();
}
