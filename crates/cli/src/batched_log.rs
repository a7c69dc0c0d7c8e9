//! Batched logging: a tracing layer that buffers events and prints them in
//! batches on a fixed window.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use spool_queue::{AsyncQueue, FlushBuffer, FlushStats, Sink};
use spool_task::Runtime;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// One captured log event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

// ── Layer ────────────────────────────────────────────────────────────

/// Forwards every event into a flush buffer instead of writing it.
///
/// Events from the buffer's own machinery (`spool_queue`) are skipped so
/// that flushing never feeds back into the buffer.
pub struct BatchedLogLayer {
    queue: AsyncQueue<LogEntry>,
}

/// Owns the flush buffer behind a [`BatchedLogLayer`]. Call
/// [`finish`](Self::finish) to deliver whatever is still buffered.
pub struct BatchedLogGuard {
    buffer: FlushBuffer<LogEntry>,
}

impl BatchedLogLayer {
    pub fn new<S>(window: Duration, sink: S, runtime: &Runtime) -> (Self, BatchedLogGuard)
    where
        S: Sink<LogEntry>,
    {
        let queue = AsyncQueue::unbounded();
        let buffer = FlushBuffer::with_queue(queue.clone(), window, sink, runtime);
        (Self { queue }, BatchedLogGuard { buffer })
    }
}

impl BatchedLogGuard {
    pub async fn finish(self) -> FlushStats {
        self.buffer.close().await
    }
}

impl<S: Subscriber> Layer<S> for BatchedLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with("spool_queue") {
            return;
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        let entry = LogEntry {
            level: meta.level().to_string(),
            target: meta.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
            timestamp: Utc::now(),
        };
        // Closed after shutdown; late events are dropped.
        let _ = self.queue.try_offer(entry);
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

// ── Sink ─────────────────────────────────────────────────────────────

/// Prints each batch to stdout, one JSON object per entry.
pub struct StdoutSink;

#[async_trait]
impl Sink<LogEntry> for StdoutSink {
    async fn write(&self, batch: Vec<LogEntry>) {
        println!("── {} log entries ──", batch.len());
        for entry in &batch {
            match serde_json::to_string(entry) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("unprintable log entry: {e}"),
            }
        }
    }
}
