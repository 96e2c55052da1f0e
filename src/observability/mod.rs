//! Observability: structured logging, research spans and pipeline metrics

pub mod logging;
pub mod metrics;
pub mod tracer;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{metrics, MetricsSnapshot, PipelineMetrics};
pub use tracer::{
    AttributeValue, FinishedSpan, InMemoryTracer, SpanExporter, SpanHandle, SpanId, SpanStatus,
    Tracer, TracingTracer,
};

// Span macros for structured logging
pub use logging::{llm_span, run_span, stage_span, tool_span};
