//! Log plumbing shared by the binaries.
//!
//! [`LogCollector`] is a `tracing` layer that keeps the most recent events in
//! a bounded ring buffer; the TUI Logs panel reads them through a
//! [`LogReader`]. [`env_filter`] builds the filter both binaries install.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Default number of entries kept by the TUI.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Filter for the process: `RUST_LOG` if set, otherwise `level` raised by
/// `verbosity` (`-v` → at least debug, `-vv` → trace). The flag never lowers
/// a more verbose configured level.
pub fn env_filter(level: &str, verbosity: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(effective_level(level, verbosity))
}

fn effective_level(level: &str, verbosity: u8) -> String {
    let configured = level.to_ascii_lowercase();
    let requested = match verbosity {
        0 => return configured,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    match configured.parse::<LevelFilter>() {
        // More verbose filters compare greater.
        Ok(current) if current >= requested => configured,
        _ => requested.to_string().to_ascii_lowercase(),
    }
}

/// A single captured log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Seconds since the collector was created.
    pub elapsed_secs: f64,
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Structured fields other than `message`, as `key=value` pairs.
    pub fields: String,
}

impl LogEntry {
    /// Message followed by the structured fields, if any.
    pub fn display_line(&self) -> String {
        if self.fields.is_empty() {
            self.message.clone()
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }
}

#[derive(Debug)]
struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    start_time: Instant,
}

impl LogBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            start_time: Instant::now(),
        }
    }

    fn push(&mut self, level: Level, target: String, visitor: EntryVisitor) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            level,
            target,
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

fn lock(buffer: &Mutex<LogBuffer>) -> MutexGuard<'_, LogBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A `tracing` layer that captures events into a shared ring buffer.
#[derive(Debug, Clone)]
pub struct LogCollector {
    buffer: Arc<Mutex<LogBuffer>>,
}

impl LogCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(LogBuffer::new(capacity))),
        }
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        lock(&self.buffer).push(*metadata.level(), metadata.target().to_string(), visitor);
    }
}

/// Read handle for the captured entries.
#[derive(Debug, Clone)]
pub struct LogReader {
    buffer: Arc<Mutex<LogBuffer>>,
}

impl LogReader {
    /// Snapshot of all captured entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.buffer).entries.iter().cloned().collect()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let buffer = lock(&self.buffer);
        let skip = buffer.entries.len().saturating_sub(n);
        buffer.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.buffer).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.buffer).entries.clear();
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: String,
}

impl EntryVisitor {
    fn push_field(&mut self, name: &str, value: std::fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for EntryVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn test_collector_captures_level_and_fields() {
        let collector = LogCollector::new(100);
        let reader = collector.reader();
        let _guard = tracing_subscriber::registry().with(collector).set_default();

        tracing::info!(kind = "instances", count = 2, "instances updated");
        tracing::warn!("socket missing");

        let entries = reader.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, Level::INFO);
        assert_eq!(entries[0].message, "instances updated");
        assert_eq!(entries[0].fields, "kind=instances count=2");
        assert_eq!(entries[0].display_line(), "instances updated kind=instances count=2");
        assert_eq!(entries[1].display_line(), "socket missing");
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let collector = LogCollector::new(3);
        let reader = collector.reader();
        let _guard = tracing_subscriber::registry().with(collector).set_default();

        for n in ["one", "two", "three", "four"] {
            tracing::info!("{n}");
        }

        let messages: Vec<String> = reader.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["two", "three", "four"]);
        assert_eq!(reader.tail(2).len(), 2);
        assert_eq!(reader.tail(2)[0].message, "three");
    }

    #[test]
    fn test_reader_clear() {
        let collector = LogCollector::new(10);
        let reader = collector.reader();
        assert!(reader.is_empty());

        let _guard = tracing_subscriber::registry().with(collector).set_default();
        tracing::error!("boom");
        assert_eq!(reader.len(), 1);

        reader.clear();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_env_filter_verbosity() {
        // Only meaningful without RUST_LOG in the environment.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(env_filter("WARN", 0).to_string(), "warn");
        assert_eq!(env_filter("warn", 1).to_string(), "debug");
        assert_eq!(env_filter("warn", 3).to_string(), "trace");
    }

    #[test]
    fn test_verbosity_never_lowers_configured_level() {
        assert_eq!(effective_level("trace", 1), "trace");
        assert_eq!(effective_level("debug", 1), "debug");
        assert_eq!(effective_level("Info", 1), "debug");
        assert_eq!(effective_level("error", 2), "trace");
        assert_eq!(effective_level("TRACE", 0), "trace");
    }
}
