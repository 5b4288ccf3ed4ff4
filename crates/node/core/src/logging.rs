//! Logging configuration for the tally node.
//!
//! Events go to stdout (plain or JSON) and into a bounded in-memory
//! [`TraceBuffer`] that the HTTP `/trace` route renders.

use std::{collections::VecDeque, fmt::Write as _, sync::Arc};

use chrono::{SecondsFormat, Utc};
use eyre::Result;
use parking_lot::Mutex;
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{
    EnvFilter, Layer, layer::Context, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::args::LogArgs;

/// Most recent log lines, oldest first.
#[derive(Debug)]
pub struct TraceBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl TraceBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    /// A layer that copies every event it sees into `self`.
    pub fn layer(self: &Arc<Self>) -> TraceBufferLayer {
        TraceBufferLayer {
            buffer: Arc::clone(self),
        }
    }
}

/// Formats events as `time LEVEL target: message key=value ...`.
#[derive(Debug, Clone)]
pub struct TraceBufferLayer {
    buffer: Arc<TraceBuffer>,
}

impl<S: Subscriber> Layer<S> for TraceBufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut line = format!(
            "{} {:>5} {}: {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            meta.level(),
            meta.target(),
            visitor.message
        );
        if !visitor.fields.is_empty() {
            line.push(' ');
            line.push_str(&visitor.fields);
        }
        self.buffer.push(line);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.append(field, format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.append(field, format_args!("{value:?}"));
        }
    }
}

impl LineVisitor {
    fn append(&mut self, field: &Field, value: std::fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }
}

/// Build the level filter from the log arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` env var if set, or a level from the verbosity flags
/// 3. Apply any custom filter from `--log.filter`
pub fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',') {
            match directive.trim().parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(err) => eprintln!("ignoring log directive {directive:?}: {err}"),
            }
        }
    }
    filter
}

/// Install the global subscriber: stdout output plus the trace buffer.
pub fn init_logging(args: &LogArgs, trace: Arc<TraceBuffer>) -> Result<()> {
    let fmt_layer = if args.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(build_filter(args))
        .with(fmt_layer)
        .with(trace.layer())
        .try_init()?;

    if !args.quiet && !args.json {
        log_startup_banner();
    }

    Ok(())
}

fn log_startup_banner() {
    let banner = format!(
        r#"
  _        _ _
 | |_ __ _| | |_   _
 | __/ _` | | | | | |
 | || (_| | | | |_| |
  \__\__,_|_|_|\__, |
               |___/

 Ledger Node v{}
    "#,
        crate::version::VERSION
    );

    println!("{banner}");
}
