//! Process-wide tracing facade: the thing embedding code actually calls.
//!
//! [`facade()`] lazily builds the tracer provider, sampler, and config store
//! on first use and hands back a `&'static Facade`; `start_span`/`end_span`/
//! `start_isolated_span`/`end_isolated_span` are exposed both as inherent
//! methods and as free functions that delegate to it, so callers never have
//! to hold the singleton themselves.

use std::sync::{Arc, OnceLock};

use opentelemetry::trace::{
    SpanContext as OtelSpanContext, SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;

use crate::carrier::Carrier;
use crate::codec;
use crate::constants::{TAG_CMD, TAG_ERR, TAG_ROT, TAG_UID, TRACE_CTX_FIELD};
use crate::context::{PlainTextContext, SpanContext, SpanId, TraceFlags, TraceId, TraceState};
use crate::hex;
use crate::propagator::{crate_to_otel_context, BinaryContextPropagator};
use crate::sampling::config::SampleConfig;
use crate::sampling::sampler::ConfBasedSampler;
use crate::scope::{IsolatedScope, Scope};

static FACADE: OnceLock<Facade> = OnceLock::new();

/// Return the process-wide facade, building it on first call.
pub fn facade() -> &'static Facade {
    FACADE.get_or_init(Facade::new)
}

pub struct Facade {
    provider: SdkTracerProvider,
    propagator: BinaryContextPropagator,
    log_spans: bool,
}

impl Facade {
    fn new() -> Self {
        opentelemetry::global::set_error_handler(|err| {
            tracing::error!(error = %err, "opentelemetry internal error");
        })
        .ok();

        let conf = Arc::new(SampleConfig::load());
        let reporter = conf.reporter().unwrap_or_default();

        let sampler = ConfBasedSampler::new(conf.clone());
        let resource = Resource::builder().with_service_name(process_name()).build();

        let mut builder = SdkTracerProvider::builder()
            .with_sampler(sampler)
            .with_resource(resource);
        if let Some(exporter) = build_exporter(&reporter) {
            builder = builder.with_batch_exporter(exporter);
        }
        let provider = builder.build();

        opentelemetry::global::set_tracer_provider(provider.clone());
        let propagator = BinaryContextPropagator::new();
        opentelemetry::global::set_text_map_propagator(propagator);

        Self {
            provider,
            propagator,
            log_spans: reporter.log_spans,
        }
    }

    pub fn start_span(
        &self,
        parent_blob: &[u8],
        proc: &str,
        func: &str,
        kind: SpanKind,
        uid: u32,
        cmd: u32,
        root: bool,
    ) -> Scope {
        let (tracer_name, op_name) = span_names(proc, func);
        let tracer = self.provider.tracer(tracer_name);

        let parent_cx = extract_parent(parent_blob);
        let attrs = span_attributes(uid, cmd, root);

        let span = tracer
            .span_builder(op_name)
            .with_kind(kind)
            .with_attributes(attrs)
            .start_with_context(&tracer, &parent_cx);

        let cx = Context::current_with_span(span);
        let guard = cx.clone().attach();

        if self.log_spans {
            let sc = cx.span().span_context().clone();
            tracing::debug!(
                trace_id = %sc.trace_id(),
                span_id = %sc.span_id(),
                sampled = sc.is_sampled(),
                "span started"
            );
        }

        Scope::new(cx, guard)
    }

    pub fn end_span(&self, mut scope: Scope, err: i32, msg: impl Into<String>) {
        end(scope.finish(), err, msg);
    }

    pub fn start_isolated_span(
        &self,
        parent_blob: &[u8],
        proc: &str,
        func: &str,
        kind: SpanKind,
        uid: u32,
        cmd: u32,
        root: bool,
    ) -> IsolatedScope {
        let (tracer_name, op_name) = span_names(proc, func);
        let tracer = self.provider.tracer(tracer_name);

        let parent_cx = extract_parent(parent_blob);
        let attrs = span_attributes(uid, cmd, root);

        let span = tracer
            .span_builder(op_name)
            .with_kind(kind)
            .with_attributes(attrs)
            .start_with_context(&tracer, &parent_cx);

        let cx = Context::current_with_span(span);

        let mut carrier = Carrier::new();
        self.propagator.inject(&snapshot(&cx), &mut carrier);
        let blob = carrier
            .get(TRACE_CTX_FIELD)
            .and_then(hex::from_hex)
            .unwrap_or_default();

        if self.log_spans {
            let sc = cx.span().span_context().clone();
            tracing::debug!(
                trace_id = %sc.trace_id(),
                span_id = %sc.span_id(),
                sampled = sc.is_sampled(),
                "isolated span started"
            );
        }

        IsolatedScope::new(cx, blob)
    }

    pub fn end_isolated_span(&self, mut scope: IsolatedScope, err: i32, msg: impl Into<String>) {
        end(scope.finish(), err, msg);
    }

    /// The binary context of whatever span is currently attached to the
    /// ambient context, or an empty blob if none is.
    pub fn current_context_blob(&self) -> Vec<u8> {
        let cx = Context::current();
        let sc = snapshot(&cx);
        if !sc.is_valid() {
            return Vec::new();
        }
        codec::encode(&sc)
    }
}

fn end(cx: Option<&Context>, err: i32, msg: impl Into<String>) {
    let Some(cx) = cx else {
        return;
    };
    let span = cx.span();
    span.set_attribute(KeyValue::new(TAG_ERR, err as i64));
    if err == 0 {
        span.set_status(Status::Ok);
    } else {
        let msg: String = msg.into();
        span.set_status(Status::error(msg));
    }
    span.end();
}

fn span_names(proc: &str, func: &str) -> (String, String) {
    let proc = if proc.is_empty() { "proc" } else { proc };
    let func = if func.is_empty() { "func" } else { func };
    (proc.to_lowercase(), format!("{proc}.{func}"))
}

fn span_attributes(uid: u32, cmd: u32, root: bool) -> Vec<KeyValue> {
    let mut attrs = Vec::with_capacity(3);
    if uid > 0 {
        attrs.push(KeyValue::new(TAG_UID, uid as i64));
    }
    if cmd > 0 {
        attrs.push(KeyValue::new(TAG_CMD, cmd as i64));
    }
    if root {
        attrs.push(KeyValue::new(TAG_ROT, true));
    }
    attrs
}

/// Decode and install a remote parent. An empty blob is the only case that
/// leaves the current context untouched; any non-empty blob, even one that
/// decodes to an invalid `SpanContext`, is still installed as the remote
/// span.
fn extract_parent(parent_blob: &[u8]) -> Context {
    let base = Context::current();
    if parent_blob.is_empty() {
        return base;
    }
    let ctx = codec::decode(parent_blob);
    base.with_remote_span_context(crate_to_otel_context(&ctx))
}

fn snapshot(cx: &Context) -> SpanContext {
    otel_context_to_crate(&cx.span().span_context())
}

fn otel_context_to_crate(sc: &OtelSpanContext) -> SpanContext {
    SpanContext::new(
        TraceId::from_bytes(sc.trace_id().to_bytes()),
        SpanId::from_bytes(sc.span_id().to_bytes()),
        if sc.is_sampled() { TraceFlags::SAMPLED } else { TraceFlags::NOT_SAMPLED },
        sc.is_remote(),
        TraceState::new(),
    )
}

fn process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "proc".to_string())
}

fn build_exporter(reporter: &crate::sampling::config::RawReporter) -> Option<SpanExporter> {
    let endpoint = reporter
        .local_agent_host_port
        .as_ref()
        .map(|hp| format!("http://{hp}"))
        .or_else(|| reporter.zipkin_endpoint.clone())
        .or_else(|| reporter.jaeger_endpoint.clone())?;

    let build = || SpanExporter::builder().with_tonic().with_endpoint(&endpoint).build().ok();

    match tokio::runtime::Handle::try_current() {
        Ok(_) => build(),
        Err(_) => {
            // No runtime current (e.g. facade() invoked before any #[tokio::main]
            // started). Leak a dedicated one and stay entered in it for the rest
            // of the process so the batch exporter's background spawn keeps
            // working.
            let rt: &'static tokio::runtime::Runtime =
                Box::leak(Box::new(tokio::runtime::Runtime::new().ok()?));
            let guard = rt.enter();
            std::mem::forget(guard);
            build()
        }
    }
}

/// Decode a raw wire blob into the application-facing projection.
///
/// The `parent_span_id` field is always the all-zero hex id: the codec's
/// decoder never trusts the reserved wire bytes for it (see `context`
/// module docs).
pub fn parse_blob(bytes: &[u8]) -> PlainTextContext {
    let ctx = codec::decode(bytes);
    PlainTextContext {
        trace_id: ctx.trace_id().to_hex(),
        span_id: ctx.span_id().to_hex(),
        parent_span_id: SpanId::INVALID.to_hex(),
        sampled: ctx.is_sampled(),
        baggage: ctx.state().clone(),
    }
}

/// Encode a [`PlainTextContext`] back to its wire representation.
///
/// `parent_span_id` is accepted but never written (reserved, always zero on
/// the wire — mirrors `codec::encode`).
pub fn format_blob(ctx: &PlainTextContext) -> Vec<u8> {
    let trace_id = hex_to_fixed::<16>(&ctx.trace_id);
    let span_id = hex_to_fixed::<8>(&ctx.span_id);
    let sc = SpanContext::new(
        TraceId::from_bytes(trace_id),
        SpanId::from_bytes(span_id),
        if ctx.sampled { TraceFlags::SAMPLED } else { TraceFlags::NOT_SAMPLED },
        true,
        ctx.baggage.clone(),
    );
    codec::encode(&sc)
}

fn hex_to_fixed<const N: usize>(s: &str) -> [u8; N] {
    let bytes = hex::from_hex(s).unwrap_or_default();
    let mut out = [0u8; N];
    if bytes.len() >= N {
        out.copy_from_slice(&bytes[bytes.len() - N..]);
    } else {
        out[N - bytes.len()..].copy_from_slice(&bytes);
    }
    out
}

pub fn start_span(
    parent_blob: &[u8],
    proc: &str,
    func: &str,
    kind: SpanKind,
    uid: u32,
    cmd: u32,
    root: bool,
) -> Scope {
    facade().start_span(parent_blob, proc, func, kind, uid, cmd, root)
}

pub fn end_span(scope: Scope, err: i32, msg: impl Into<String>) {
    facade().end_span(scope, err, msg)
}

pub fn start_isolated_span(
    parent_blob: &[u8],
    proc: &str,
    func: &str,
    kind: SpanKind,
    uid: u32,
    cmd: u32,
    root: bool,
) -> IsolatedScope {
    facade().start_isolated_span(parent_blob, proc, func, kind, uid, cmd, root)
}

pub fn end_isolated_span(scope: IsolatedScope, err: i32, msg: impl Into<String>) {
    facade().end_isolated_span(scope, err, msg)
}

pub fn current_context_blob() -> Vec<u8> {
    facade().current_context_blob()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_names_default_when_empty() {
        assert_eq!(span_names("", ""), ("proc".to_string(), "proc.func".to_string()));
    }

    #[test]
    fn span_names_lowercase_tracer_original_case_operation() {
        let (tracer, op) = span_names("Svc", "Op");
        assert_eq!(tracer, "svc");
        assert_eq!(op, "Svc.Op");
    }

    #[test]
    fn span_attributes_only_include_positive_uid_cmd() {
        let attrs = span_attributes(0, 0, false);
        assert!(attrs.is_empty());

        let attrs = span_attributes(7, 0, true);
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn hex_to_fixed_pads_short_input() {
        let out: [u8; 8] = hex_to_fixed("ab");
        assert_eq!(out, [0, 0, 0, 0, 0, 0, 0, 0xab]);
    }

    #[test]
    fn parse_blob_of_empty_input_is_invalid_context() {
        let ctx = parse_blob(&[]);
        assert_eq!(ctx.trace_id, TraceId::INVALID.to_hex());
        assert!(!ctx.sampled);
    }

    #[test]
    fn format_blob_ignores_caller_supplied_parent_span_id() {
        let ctx = PlainTextContext {
            trace_id: TraceId::from_bytes([9u8; 16]).to_hex(),
            span_id: SpanId::from_bytes([8u8; 8]).to_hex(),
            parent_span_id: "ffffffffffffffff".to_string(),
            sampled: true,
            baggage: TraceState::new(),
        };
        let bytes = format_blob(&ctx);
        let roundtrip = parse_blob(&bytes);
        assert_eq!(roundtrip.parent_span_id, SpanId::INVALID.to_hex());
        assert_eq!(roundtrip.trace_id, ctx.trace_id);
    }

    // S3 — a span created against a non-empty parent blob inherits that
    // parent's trace id: `extract_parent` is the piece of `start_span`
    // responsible for that, so it's exercised directly here.
    #[test]
    fn extract_parent_of_encoded_context_carries_its_trace_id() {
        let parent = SpanContext::new(
            TraceId::from_bytes([5u8; 16]),
            SpanId::from_bytes([6u8; 8]),
            TraceFlags::SAMPLED,
            false,
            TraceState::new(),
        );
        let blob = codec::encode(&parent);

        let cx = extract_parent(&blob);
        let sc = cx.span().span_context().clone();
        assert_eq!(sc.trace_id().to_bytes(), parent.trace_id().to_bytes());
        assert_eq!(sc.span_id().to_bytes(), parent.span_id().to_bytes());
        assert!(sc.is_remote());
    }

    #[test]
    fn extract_parent_of_empty_blob_leaves_context_unchanged() {
        let cx = extract_parent(&[]);
        assert!(!cx.span().span_context().is_valid());
    }

    // A non-empty blob that decodes to an invalid context is still
    // installed as the remote span rather than silently falling back to
    // the ambient context.
    #[test]
    fn extract_parent_of_garbage_bytes_still_installs_a_remote_span() {
        let cx = extract_parent(&[0u8; 4]);
        let sc = cx.span().span_context().clone();
        assert!(sc.is_remote());
    }

    // S2 — `current_context_blob` is `snapshot` + `codec::encode`; verify
    // that composition preserves the trace id of whatever span is attached.
    #[test]
    fn snapshot_then_encode_preserves_trace_id() {
        let parent = SpanContext::new(
            TraceId::from_bytes([3u8; 16]),
            SpanId::from_bytes([4u8; 8]),
            TraceFlags::SAMPLED,
            false,
            TraceState::new(),
        );
        let cx = extract_parent(&codec::encode(&parent));
        let sc = snapshot(&cx);
        let blob = codec::encode(&sc);
        let decoded = codec::decode(&blob);
        assert_eq!(decoded.trace_id(), parent.trace_id());
    }
}
