//! Trace-context data model: [`TraceId`], [`SpanId`], [`TraceFlags`],
//! [`TraceState`], [`SpanContext`], and the application-facing
//! [`PlainTextContext`] projection.
//!
//! These are deliberately this crate's own types rather than
//! `opentelemetry::trace::{TraceId, SpanId, TraceState, SpanContext}`: the
//! wire format (`codec`) treats trace-state entries as opaque byte strings,
//! while the OTel SDK's `TraceState` enforces the W3C `tracestate` grammar
//! (restricted charset, no empty keys, etc). Keeping our own type here lets
//! the codec round-trip arbitrary baggage losslessly; `propagator` is where
//! the bridge to the SDK's real `SpanContext` happens, at the point where a
//! span actually needs to be created.

use crate::hex;

/// 16 opaque bytes identifying a trace. All-zero is the invalid id.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TraceId(pub [u8; 16]);

impl TraceId {
    pub const INVALID: TraceId = TraceId([0u8; 16]);

    pub fn from_bytes(b: [u8; 16]) -> Self {
        Self(b)
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 16]
    }

    pub fn to_hex(self) -> String {
        hex::to_hex(&self.0)
    }
}

/// 8 opaque bytes identifying a span. All-zero is the invalid id.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SpanId(pub [u8; 8]);

impl SpanId {
    pub const INVALID: SpanId = SpanId([0u8; 8]);

    pub fn from_bytes(b: [u8; 8]) -> Self {
        Self(b)
    }

    pub fn to_bytes(self) -> [u8; 8] {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 8]
    }

    pub fn to_hex(self) -> String {
        hex::to_hex(&self.0)
    }
}

/// Single-byte flags; only bit 0 (sampled) is interpreted.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TraceFlags(pub u8);

impl TraceFlags {
    pub const SAMPLED: TraceFlags = TraceFlags(1);
    pub const NOT_SAMPLED: TraceFlags = TraceFlags(0);

    pub fn is_sampled(self) -> bool {
        self.0 & 1 == 1
    }
}

/// Ordered `key -> value` mapping, insertion order preserved, keys unique
/// (last write wins). Called "baggage" in the surrounding docs; same
/// collection.
///
/// Keys and values are opaque byte strings on the wire; in memory we keep
/// them as `String`/`Vec<u8>` for ergonomics. Malformed UTF-8 is not
/// expected in practice (the codec's own test fixtures are all text) but
/// isn't a codec-level concern either way since the wire format itself
/// never interprets the bytes.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TraceState {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl TraceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Insert or overwrite `key`. Last write wins; the entry keeps its
    /// original position on overwrite, matching an ordered-map's usual
    /// "first occurrence position" semantics.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}

/// `(TraceId, SpanId, TraceFlags, remote, TraceState)`. Constructed only by
/// the codec or by the facade when a span is created.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: SpanId,
    flags: TraceFlags,
    remote: bool,
    state: TraceState,
}

impl SpanContext {
    pub fn new(trace_id: TraceId, span_id: SpanId, flags: TraceFlags, remote: bool, state: TraceState) -> Self {
        Self {
            trace_id,
            span_id,
            flags,
            remote,
            state,
        }
    }

    /// The invalid context: all-zero ids, not sampled, not remote, no baggage.
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn state(&self) -> &TraceState {
        &self.state
    }

    /// A context is valid only if both ids are non-zero.
    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }
}

/// Application-facing projection of a [`SpanContext`]: hex ids plus a
/// baggage map, as produced by `parse_blob`/consumed by `format_blob`.
///
/// `parent_span_id` is always present but is never populated by the codec's
/// decoder (see the codec module docs); callers that want it must track it
/// themselves.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PlainTextContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub sampled: bool,
    pub baggage: TraceState,
}
