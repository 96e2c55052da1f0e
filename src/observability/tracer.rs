//! Attribute-bearing spans for research runs
//!
//! Spans are opened with an explicit parent rather than an ambient context, so
//! concurrently running search tasks each get a child of the stage span that
//! launched them. A span is exported exactly once, when `end` is called or the
//! last handle is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

/// Attribute value attached to a span
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        AttributeValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Span status code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SpanStatus {
    Unset,
    Ok,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SpanId(Uuid);

impl SpanId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Handle to an open span
pub trait SpanHandle: Send + Sync {
    fn id(&self) -> SpanId;
    fn set_attribute(&self, key: &str, value: AttributeValue);
    fn record_error(&self, message: &str);
    fn set_status(&self, status: SpanStatus);
    /// Close the span; later calls are no-ops
    fn end(&self);
}

/// Opens spans
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str, parent: Option<SpanId>) -> Arc<dyn SpanHandle>;
}

/// A closed span as handed to an exporter
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSpan {
    pub id: SpanId,
    pub parent: Option<SpanId>,
    pub name: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub status: SpanStatus,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl FinishedSpan {
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, SpanStatus::Error(_))
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// Destination for finished spans
pub trait SpanExporter: Send + Sync {
    fn export(&self, span: FinishedSpan);
}

struct SpanState {
    attributes: BTreeMap<String, AttributeValue>,
    status: SpanStatus,
    errors: Vec<String>,
    ended: bool,
}

/// Span that buffers its data and exports it on end
struct RecordedSpan {
    id: SpanId,
    parent: Option<SpanId>,
    name: String,
    started_at: DateTime<Utc>,
    state: Mutex<SpanState>,
    exporter: Arc<dyn SpanExporter>,
}

impl RecordedSpan {
    fn start(name: &str, parent: Option<SpanId>, exporter: Arc<dyn SpanExporter>) -> Self {
        Self {
            id: SpanId::new(),
            parent,
            name: name.to_string(),
            started_at: Utc::now(),
            state: Mutex::new(SpanState {
                attributes: BTreeMap::new(),
                status: SpanStatus::Unset,
                errors: Vec::new(),
                ended: false,
            }),
            exporter,
        }
    }

    fn state(&self) -> MutexGuard<'_, SpanState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SpanHandle for RecordedSpan {
    fn id(&self) -> SpanId {
        self.id
    }

    fn set_attribute(&self, key: &str, value: AttributeValue) {
        let mut state = self.state();
        if !state.ended {
            state.attributes.insert(key.to_string(), value);
        }
    }

    fn record_error(&self, message: &str) {
        let mut state = self.state();
        if !state.ended {
            state.errors.push(message.to_string());
        }
    }

    fn set_status(&self, status: SpanStatus) {
        let mut state = self.state();
        if !state.ended {
            state.status = status;
        }
    }

    fn end(&self) {
        let finished = {
            let mut state = self.state();
            if state.ended {
                return;
            }
            state.ended = true;
            FinishedSpan {
                id: self.id,
                parent: self.parent,
                name: self.name.clone(),
                attributes: std::mem::take(&mut state.attributes),
                status: state.status.clone(),
                errors: std::mem::take(&mut state.errors),
                started_at: self.started_at,
                ended_at: Utc::now(),
            }
        };
        self.exporter.export(finished);
    }
}

impl Drop for RecordedSpan {
    fn drop(&mut self) {
        self.end();
    }
}

/// Emits every finished span as a structured `tracing` event
struct LogExporter;

impl SpanExporter for LogExporter {
    fn export(&self, span: FinishedSpan) {
        let attributes = serde_json::to_string(&span.attributes).unwrap_or_default();
        let parent = span.parent.map(|p| p.to_string()).unwrap_or_default();

        match &span.status {
            SpanStatus::Error(message) => warn!(
                span_name = %span.name,
                span_id = %span.id,
                parent_id = %parent,
                duration_ms = span.duration_ms(),
                attributes = %attributes,
                error = %message,
                "Span finished with error"
            ),
            _ => info!(
                span_name = %span.name,
                span_id = %span.id,
                parent_id = %parent,
                duration_ms = span.duration_ms(),
                attributes = %attributes,
                "Span finished"
            ),
        }
    }
}

/// Tracer that reports spans through the logging pipeline
#[derive(Clone)]
pub struct TracingTracer {
    exporter: Arc<dyn SpanExporter>,
}

impl TracingTracer {
    pub fn new() -> Self {
        Self {
            exporter: Arc::new(LogExporter),
        }
    }
}

impl Default for TracingTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str, parent: Option<SpanId>) -> Arc<dyn SpanHandle> {
        Arc::new(RecordedSpan::start(name, parent, self.exporter.clone()))
    }
}

#[derive(Default)]
struct SpanStore {
    spans: Mutex<Vec<FinishedSpan>>,
}

impl SpanExporter for SpanStore {
    fn export(&self, span: FinishedSpan) {
        self.spans
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(span);
    }
}

/// Tracer that keeps finished spans in memory for inspection
#[derive(Clone, Default)]
pub struct InMemoryTracer {
    store: Arc<SpanStore>,
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished spans in the order they ended
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        self.store
            .spans
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<FinishedSpan> {
        self.finished_spans()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(&self, name: &str, parent: Option<SpanId>) -> Arc<dyn SpanHandle> {
        Arc::new(RecordedSpan::start(name, parent, self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_exported_once_on_end() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("financial_research.run", None);
        span.set_attribute("query", "Apple".into());
        span.end();
        span.end();
        drop(span);

        let spans = tracer.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(
            spans[0].attribute("query").and_then(AttributeValue::as_str),
            Some("Apple")
        );
        assert_eq!(spans[0].status, SpanStatus::Unset);
    }

    #[test]
    fn test_drop_ends_span() {
        let tracer = InMemoryTracer::new();
        {
            let _span = tracer.start_span("financial_research.search", None);
        }
        assert_eq!(tracer.spans_named("financial_research.search").len(), 1);
    }

    #[test]
    fn test_child_span_records_parent() {
        let tracer = InMemoryTracer::new();
        let parent = tracer.start_span("parent", None);
        let child = tracer.start_span("child", Some(parent.id()));
        child.end();
        parent.end();

        let child = &tracer.spans_named("child")[0];
        let parent = &tracer.spans_named("parent")[0];
        assert_eq!(child.parent, Some(parent.id));
        assert_eq!(parent.parent, None);
    }

    #[test]
    fn test_error_status_and_recorded_errors() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("financial_research.search", None);
        span.set_attribute("search.success", false.into());
        span.record_error("rate limited");
        span.set_status(SpanStatus::Error("rate limited".to_string()));
        span.end();

        let finished = &tracer.finished_spans()[0];
        assert!(finished.is_error());
        assert_eq!(finished.errors, vec!["rate limited".to_string()]);
        assert_eq!(
            finished
                .attribute("search.success")
                .and_then(AttributeValue::as_bool),
            Some(false)
        );
    }

    #[test]
    fn test_updates_after_end_are_ignored() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("s", None);
        span.end();
        span.set_attribute("late", 1i64.into());

        assert!(tracer.finished_spans()[0].attribute("late").is_none());
    }

    #[test]
    fn test_usize_attribute_converts_to_int() {
        assert_eq!(AttributeValue::from(3usize).as_int(), Some(3));
        assert_eq!(AttributeValue::from("x").as_int(), None);
    }

    #[test]
    fn test_tracing_tracer_spans_have_distinct_ids() {
        let tracer = TracingTracer::new();
        let a = tracer.start_span("a", None);
        let b = tracer.start_span("b", Some(a.id()));
        assert_ne!(a.id(), b.id());
    }
}
