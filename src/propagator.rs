//! Bridges the binary wire context (`codec`) to this crate's own
//! [`Carrier`] and to the real `opentelemetry::propagation::
//! TextMapPropagator` trait.
//!
//! `Carrier` values are hex text (see its module docs), so
//! [`BinaryContextPropagator`]'s job is entirely hex-encode-then-store /
//! load-then-hex-decode around `codec::encode`/`codec::decode`. The same
//! hex framing is used for the `TextMapPropagator` impl, which operates
//! against any `dyn Injector`/`dyn Extractor` (not just our `Carrier`) so
//! this crate can register itself as the process's global text-map
//! propagator.

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{
    SpanContext as OtelSpanContext, SpanId as OtelSpanId, TraceContextExt, TraceFlags as OtelTraceFlags,
    TraceId as OtelTraceId, TraceState as OtelTraceState,
};
use opentelemetry::Context;

use crate::carrier::Carrier;
use crate::codec;
use crate::constants::TRACE_CTX_FIELD;
use crate::context::SpanContext;
use crate::hex;

/// Propagator for the binary wire format defined in `codec`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryContextPropagator;

impl BinaryContextPropagator {
    pub fn new() -> Self {
        Self
    }

    /// Hex-encode `ctx` and stash it under [`TRACE_CTX_FIELD`] in `carrier`.
    pub fn inject(&self, ctx: &SpanContext, carrier: &mut Carrier) {
        carrier.set(TRACE_CTX_FIELD, hex::to_hex(&codec::encode(ctx)));
    }

    /// Decode the context stashed at [`TRACE_CTX_FIELD`].
    ///
    /// Returns [`SpanContext::invalid`] if the field is absent or its value
    /// isn't valid hex — see `codec::decode` for the malformed-bytes case.
    pub fn extract(&self, carrier: &Carrier) -> SpanContext {
        let Some(hexed) = carrier.get(TRACE_CTX_FIELD) else {
            return SpanContext::invalid();
        };
        match hex::from_hex(hexed) {
            Some(bytes) => codec::decode(&bytes),
            None => SpanContext::invalid(),
        }
    }
}

impl Injector for Carrier {
    fn set(&mut self, key: &str, value: String) {
        Carrier::set(self, key, value);
    }
}

impl Extractor for Carrier {
    fn get(&self, key: &str) -> Option<&str> {
        Carrier::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        Carrier::keys(self).collect()
    }
}

impl TextMapPropagator for BinaryContextPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span_ctx = cx.span().span_context().clone();
        if !span_ctx.is_valid() {
            return;
        }
        let ctx = otel_to_crate_context(&span_ctx);
        injector.set(TRACE_CTX_FIELD, hex::to_hex(&codec::encode(&ctx)));
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        let Some(hexed) = extractor.get(TRACE_CTX_FIELD) else {
            return cx.clone();
        };
        let Some(bytes) = hex::from_hex(hexed) else {
            return cx.clone();
        };
        // Whatever decode() returns here — including an invalid
        // `SpanContext` — is wrapped and installed unconditionally; there's
        // no validity gate once the field is present and its value is
        // well-formed hex.
        let ctx = codec::decode(&bytes);
        cx.with_remote_span_context(crate_to_otel_context(&ctx))
    }

    fn fields(&self) -> opentelemetry::propagation::text_map_propagator::FieldIter<'_> {
        static FIELDS: [&str; 1] = [TRACE_CTX_FIELD];
        opentelemetry::propagation::text_map_propagator::FieldIter::new(&FIELDS)
    }
}

/// Narrow bridge to the SDK's real `SpanContext`: ids, sampled, remote.
/// Baggage does not cross this bridge — see the module docs on `context`.
pub fn crate_to_otel_context(ctx: &SpanContext) -> OtelSpanContext {
    OtelSpanContext::new(
        OtelTraceId::from_bytes(ctx.trace_id().to_bytes()),
        OtelSpanId::from_bytes(ctx.span_id().to_bytes()),
        if ctx.is_sampled() { OtelTraceFlags::SAMPLED } else { OtelTraceFlags::NOT_SAMPLED },
        true,
        OtelTraceState::default(),
    )
}

fn otel_to_crate_context(span_ctx: &OtelSpanContext) -> SpanContext {
    SpanContext::new(
        crate::context::TraceId::from_bytes(span_ctx.trace_id().to_bytes()),
        crate::context::SpanId::from_bytes(span_ctx.span_id().to_bytes()),
        if span_ctx.is_sampled() {
            crate::context::TraceFlags::SAMPLED
        } else {
            crate::context::TraceFlags::NOT_SAMPLED
        },
        span_ctx.is_remote(),
        crate::context::TraceState::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SpanId, TraceFlags, TraceId, TraceState};

    #[test]
    fn round_trip_through_carrier() {
        let mut state = TraceState::new();
        state.set(&b"k"[..], &b"v"[..]);
        let ctx = SpanContext::new(
            TraceId::from_bytes([7u8; 16]),
            SpanId::from_bytes([9u8; 8]),
            TraceFlags::SAMPLED,
            true,
            state,
        );

        let prop = BinaryContextPropagator::new();
        let mut carrier = Carrier::new();
        prop.inject(&ctx, &mut carrier);
        let decoded = prop.extract(&carrier);

        assert_eq!(decoded, ctx);
    }

    #[test]
    fn extract_from_empty_carrier_is_invalid() {
        let prop = BinaryContextPropagator::new();
        let carrier = Carrier::new();
        assert_eq!(prop.extract(&carrier), SpanContext::invalid());
    }

    #[test]
    fn extract_from_non_hex_field_is_invalid() {
        let prop = BinaryContextPropagator::new();
        let mut carrier = Carrier::new();
        carrier.set(TRACE_CTX_FIELD, "not-hex!!");
        assert_eq!(prop.extract(&carrier), SpanContext::invalid());
    }

    #[test]
    fn extract_with_context_installs_decoded_span_even_when_invalid() {
        let prop = BinaryContextPropagator::new();
        let mut carrier = Carrier::new();
        // An empty trace id decodes to an invalid `SpanContext`, but the
        // field is present and well-formed hex, so it's still installed.
        carrier.set(TRACE_CTX_FIELD, hex::to_hex(&codec::encode(&SpanContext::invalid())));

        let base = Context::current();
        let result = TextMapPropagator::extract_with_context(&prop, &base, &carrier);
        let installed = result.span().span_context().clone();
        assert!(!installed.is_valid());
        assert!(installed.is_remote());
    }

    #[test]
    fn otel_bridge_preserves_ids_and_sampled_not_baggage() {
        let mut state = TraceState::new();
        state.set(&b"k"[..], &b"v"[..]);
        let ctx = SpanContext::new(
            TraceId::from_bytes([3u8; 16]),
            SpanId::from_bytes([4u8; 8]),
            TraceFlags::SAMPLED,
            false,
            state,
        );

        let otel_ctx = crate_to_otel_context(&ctx);
        assert_eq!(otel_ctx.trace_id().to_bytes(), ctx.trace_id().to_bytes());
        assert_eq!(otel_ctx.span_id().to_bytes(), ctx.span_id().to_bytes());
        assert!(otel_ctx.is_sampled());
    }
}
