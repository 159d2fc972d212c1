//! RAII span handles returned by `facade::start_span`/`start_isolated_span`.

use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, ContextGuard, Value};

/// Holds an attached ambient span. `facade::end_span` records the caller's
/// error code and status before ending it; if a `Scope` is instead dropped
/// without going through `end_span`, no attribute or status is set but the
/// span is still ended here, via `Drop`.
pub struct Scope {
    cx: Option<Context>,
    _guard: Option<ContextGuard>,
    ended: bool,
}

impl Scope {
    pub(crate) fn new(cx: Context, guard: ContextGuard) -> Self {
        Self {
            cx: Some(cx),
            _guard: Some(guard),
            ended: false,
        }
    }

    /// An empty scope: no span was created (context extraction failed, or
    /// the tracer was never initialized).
    pub fn empty() -> Self {
        Self { cx: None, _guard: None, ended: true }
    }

    pub fn set_attr(&self, key: &'static str, value: impl Into<Value>) {
        if let Some(cx) = &self.cx {
            cx.span().set_attribute(opentelemetry::KeyValue::new(key, value.into()));
        }
    }

    /// Marks this scope as explicitly ended and hands back its context so
    /// the caller can set attributes/status before calling `span.end()`.
    /// After this, `Drop` is a no-op.
    pub(crate) fn finish(&mut self) -> Option<&Context> {
        self.ended = true;
        self.cx.as_ref()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.ended {
            if let Some(cx) = &self.cx {
                cx.span().end();
            }
        }
    }
}

/// Holds a detached span plus the wire context captured at creation time, so
/// the caller can ship it elsewhere without an ambient-context guard.
///
/// Same end-on-drop contract as [`Scope`]: `facade::end_isolated_span` sets
/// attributes/status before ending the span; a dropped, never-ended
/// `IsolatedScope` still ends it, bare.
pub struct IsolatedScope {
    cx: Option<Context>,
    blob: Vec<u8>,
    ended: bool,
}

impl IsolatedScope {
    pub(crate) fn new(cx: Context, blob: Vec<u8>) -> Self {
        Self { cx: Some(cx), blob, ended: false }
    }

    pub fn empty() -> Self {
        Self { cx: None, blob: Vec::new(), ended: true }
    }

    pub fn set_attr(&self, key: &'static str, value: impl Into<Value>) {
        if let Some(cx) = &self.cx {
            cx.span().set_attribute(opentelemetry::KeyValue::new(key, value.into()));
        }
    }

    /// The binary trace context captured when this span was started, ready
    /// to hand to another thread/process via a [`crate::carrier::Carrier`].
    pub fn context_blob(&self) -> &[u8] {
        &self.blob
    }

    /// The 32-char lowercase hex trace id of the captured context, or the
    /// all-zero id if this scope is empty.
    pub fn trace_id(&self) -> String {
        crate::codec::decode(&self.blob).trace_id().to_hex()
    }

    pub(crate) fn finish(&mut self) -> Option<&Context> {
        self.ended = true;
        self.cx.as_ref()
    }
}

impl Drop for IsolatedScope {
    fn drop(&mut self) {
        if !self.ended {
            if let Some(cx) = &self.cx {
                cx.span().end();
            }
        }
    }
}
