// ABOUTME: Scoped log capture persisting one quantum's log output as a dataset
// ABOUTME: Records tracing events inside the capture span and stores them on release

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Span, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use uuid::Uuid;

use crate::quantum::quantum::Quantum;
use crate::quantum::task::TaskNode;
use crate::store::client::DatasetStore;
use crate::store::error::Result;
use crate::store::reference::DatasetRef;

/// Span field marking the active capture session.
const CAPTURE_FIELD: &str = "log_capture_id";

/// One captured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

type Buffer = Arc<Mutex<Vec<LogRecord>>>;

/// Shared registry of active capture buffers, keyed by capture ID.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    buffers: Arc<RwLock<HashMap<String, Buffer>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer to compose into the embedding application's subscriber.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer { sink: self.clone() }
    }

    fn register(&self, id: &str) -> Buffer {
        let buffer: Buffer = Arc::new(Mutex::new(Vec::new()));
        if let Ok(mut buffers) = self.buffers.write() {
            buffers.insert(id.to_string(), buffer.clone());
        }
        buffer
    }

    fn unregister(&self, id: &str) {
        if let Ok(mut buffers) = self.buffers.write() {
            buffers.remove(id);
        }
    }

    fn buffer(&self, id: &str) -> Option<Buffer> {
        self.buffers.read().ok()?.get(id).cloned()
    }
}

struct CaptureId(String);

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

/// `tracing_subscriber` layer routing events inside a capture span into the
/// registered buffer for that capture session.
pub struct CaptureLayer {
    sink: CaptureSink,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        struct CaptureIdVisitor(Option<String>);
        impl Visit for CaptureIdVisitor {
            fn record_str(&mut self, field: &Field, value: &str) {
                if field.name() == CAPTURE_FIELD {
                    self.0 = Some(value.to_string());
                }
            }
            fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
                if field.name() == CAPTURE_FIELD {
                    self.0 = Some(format!("{:?}", value).trim_matches('"').to_string());
                }
            }
        }

        let mut visitor = CaptureIdVisitor(None);
        attrs.record(&mut visitor);
        if let (Some(capture_id), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(CaptureId(capture_id));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(scope) = ctx.event_scope(event) else {
            return;
        };
        // Nearest enclosing capture span wins.
        for span in scope {
            let extensions = span.extensions();
            if let Some(CaptureId(capture_id)) = extensions.get::<CaptureId>() {
                if let Some(buffer) = self.sink.buffer(capture_id) {
                    let mut visitor = MessageVisitor {
                        message: String::new(),
                    };
                    event.record(&mut visitor);
                    let record = LogRecord {
                        timestamp: Utc::now(),
                        level: event.metadata().level().to_string(),
                        target: event.metadata().target().to_string(),
                        message: visitor.message,
                    };
                    if let Ok(mut records) = buffer.lock() {
                        records.push(record);
                    }
                }
                return;
            }
        }
    }
}

/// Scoped acquisition of log output for one quantum's execution.
pub struct LogCapture {
    store: Arc<dyn DatasetStore>,
    sink: CaptureSink,
}

impl LogCapture {
    pub fn new(store: Arc<dyn DatasetStore>, sink: CaptureSink) -> Self {
        Self { store, sink }
    }

    /// Begin capturing for the given quantum. Execution must run inside the
    /// handle's span for events to be recorded.
    pub fn capture_logging(&self, task_node: &TaskNode, quantum: &Quantum) -> CaptureHandle {
        let id = Uuid::new_v4().to_string();
        let buffer = self.sink.register(&id);
        let log_ref = quantum
            .outputs_for(task_node.log_output())
            .and_then(|refs| refs.first())
            .cloned();
        let span = tracing::info_span!("quantum", log_capture_id = %id);
        CaptureHandle {
            id,
            sink: self.sink.clone(),
            buffer,
            store_flag: AtomicBool::new(true),
            log_ref,
            span,
            store: Arc::clone(&self.store),
            released: false,
        }
    }
}

/// Handle for one capture session. `release` must run on every exit path;
/// dropping without release still unregisters the buffer but persists
/// nothing.
pub struct CaptureHandle {
    id: String,
    sink: CaptureSink,
    buffer: Buffer,
    store_flag: AtomicBool,
    log_ref: Option<DatasetRef>,
    span: Span,
    store: Arc<dyn DatasetStore>,
    released: bool,
}

impl CaptureHandle {
    /// Span execution must run inside for events to be captured.
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    /// Control whether records are persisted on release. Suppressed for
    /// skipped quanta, whose logs may already be in the store.
    pub fn set_store(&self, store: bool) {
        self.store_flag.store(store, Ordering::SeqCst);
    }

    pub fn should_store(&self) -> bool {
        self.store_flag.load(Ordering::SeqCst)
    }

    /// Stop capturing and, when storage is enabled and the quantum declares
    /// a log output, persist the captured records under that reference.
    pub async fn release(mut self) -> Result<Option<DatasetRef>> {
        self.sink.unregister(&self.id);
        self.released = true;

        if !self.should_store() {
            return Ok(None);
        }
        let Some(log_ref) = self.log_ref.take() else {
            return Ok(None);
        };
        let records: Vec<LogRecord> = self
            .buffer
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default();
        let payload = serde_json::to_value(&records)?;
        let stored = self.store.put(&payload, &log_ref).await?;
        Ok(Some(stored))
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if !self.released {
            self.sink.unregister(&self.id);
        }
    }
}
