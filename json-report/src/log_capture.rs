// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped capture of `tracing` events into per-phase log buffers.
//!
//! [`LogCapture::layer`] produces a [`Layer`] which the host composes into its subscriber. Each
//! phase then calls [`LogCapture::attach`] to obtain a [`PhaseCapture`] guard. While the guard is
//! alive, every event seen by the layer is appended to the guard's buffer. Dropping the guard
//! detaches the buffer, whether the phase returned, failed, or unwound.
//!
//! Events emitted by this crate itself are never captured.

use json_report_metadata::LogRecord;
use serde_json::{Map, Value};
use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

const MESSAGE_FIELD: &str = "message";
const OWN_TARGET: &str = "json_report";

type LogBuffer = Arc<Mutex<Vec<LogRecord>>>;

#[derive(Debug, Default)]
struct SinkRegistry {
    next_id: AtomicU64,
    sinks: Mutex<Vec<(u64, LogBuffer)>>,
}

/// Shared state connecting a [`LogCaptureLayer`] to the phase guards attached to it.
#[derive(Clone, Debug, Default)]
pub struct LogCapture {
    registry: Arc<SinkRegistry>,
}

impl LogCapture {
    /// Creates a new `LogCapture` with no attached sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a layer feeding events into the sinks attached to this capture.
    pub fn layer(&self) -> LogCaptureLayer {
        LogCaptureLayer {
            registry: self.registry.clone(),
        }
    }

    /// Attaches a new, empty sink. It stays attached until the returned guard is dropped.
    pub fn attach(&self) -> PhaseCapture {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let buffer = LogBuffer::default();
        self.registry
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, buffer.clone()));
        PhaseCapture {
            attachment: Some((self.registry.clone(), id)),
            buffer,
        }
    }

    /// Returns the number of sinks currently attached.
    pub fn attached_count(&self) -> usize {
        self.registry
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A guard for a log sink attached for the duration of one phase.
///
/// The sink is detached when the guard is dropped.
#[must_use = "the sink is detached as soon as the guard is dropped"]
pub struct PhaseCapture {
    attachment: Option<(Arc<SinkRegistry>, u64)>,
    buffer: LogBuffer,
}

impl PhaseCapture {
    /// Returns a guard that captures nothing.
    pub fn inert() -> Self {
        Self {
            attachment: None,
            buffer: LogBuffer::default(),
        }
    }

    /// Returns true if this guard is attached to a layer.
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub(crate) fn buffer(&self) -> LogBuffer {
        self.buffer.clone()
    }

    /// Detaches the sink and returns the records captured so far.
    pub fn finish(mut self) -> Vec<LogRecord> {
        self.detach();
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buffer)
    }

    fn detach(&mut self) {
        if let Some((registry, id)) = self.attachment.take() {
            registry
                .sinks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(sink_id, _)| *sink_id != id);
        }
    }
}

impl fmt::Debug for PhaseCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseCapture")
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl Drop for PhaseCapture {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A [`Layer`] that copies events into attached phase sinks.
#[derive(Clone, Debug)]
pub struct LogCaptureLayer {
    registry: Arc<SinkRegistry>,
}

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) {
            return;
        }

        let sinks = self
            .registry
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sinks.is_empty() {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            metadata.level().as_str(),
            metadata.target(),
            visitor.message,
        );
        record.module = metadata.module_path().map(ToOwned::to_owned);
        record.filename = metadata.file().map(ToOwned::to_owned);
        record.lineno = metadata.line();
        record.fields = visitor.fields;

        for (_, buffer) in sinks.iter() {
            buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record.clone());
        }
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl Visit for RecordVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == MESSAGE_FIELD {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_owned(), Value::String(value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message = value.to_owned();
        } else {
            self.fields
                .insert(field.name().to_owned(), Value::String(value.to_owned()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_owned(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_owned(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_owned(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_owned(), value.into());
    }
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}
