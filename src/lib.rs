//! Conf-based root-span sampling and binary trace-context propagation on
//! top of OpenTelemetry.
//!
//! A span starts as a root candidate (`root = true`, no parent blob) or as a
//! child of a context carried in from elsewhere (`parent_blob` non-empty).
//! Root candidates are subject to [`sampling`]'s ratio/white-list/floor
//! decision; anything downstream of an already-sampled parent always
//! records, matching W3C/OTel's usual parent-based semantics. [`codec`] and
//! [`carrier`]/[`propagator`] carry that decision and the trace/span ids
//! across process boundaries as a compact binary blob; [`facade`] is the
//! single entry point embedding code calls to start/end spans and to
//! move blobs in and out of the ambient context.
//!
//! ```no_run
//! use tracing_ctrl::{start_span, end_span};
//! use opentelemetry::trace::SpanKind;
//!
//! let scope = start_span(&[], "svc", "Handle", SpanKind::Server, 42, 7, true);
//! // ... do work ...
//! end_span(scope, 0, "");
//! ```

pub mod carrier;
pub mod codec;
pub mod constants;
pub mod context;
pub mod error;
pub mod facade;
pub mod hex;
pub mod propagator;
pub mod sampling;
pub mod scope;

pub use carrier::Carrier;
pub use context::{PlainTextContext, SpanContext, SpanId, TraceFlags, TraceId, TraceState};
pub use error::TracingCtrlError;
pub use facade::{
    current_context_blob, end_isolated_span, end_span, facade, format_blob, parse_blob, start_isolated_span,
    start_span, Facade,
};
pub use propagator::BinaryContextPropagator;
pub use scope::{IsolatedScope, Scope};

pub use opentelemetry::trace::SpanKind;
