//! [`ConfBasedSampler`] — the root sampler this crate installs in place of
//! the SDK's built-in ones.
//!
//! `opentelemetry_sdk::trace::Sampler::ParentBased` only wraps the `Sampler`
//! enum, not an arbitrary `ShouldSample`, so parent-based behavior is
//! implemented by hand here: a valid parent's sampling decision is always
//! propagated verbatim, sampled or not, bypassing the config check either
//! way. Only root spans, or spans with no valid parent, defer to
//! [`crate::sampling::config::SampleConfig::check_pass`].

use std::sync::Arc;

use opentelemetry::trace::{
    Link, SamplingDecision, SamplingResult, SpanKind, TraceContextExt, TraceId, TraceState,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::ShouldSample;

use crate::constants::{TAG_CMD, TAG_ROT, TAG_UID};

use super::config::SampleConfig;

#[derive(Clone)]
pub struct ConfBasedSampler {
    conf: Arc<SampleConfig>,
}

impl ConfBasedSampler {
    pub fn new(conf: Arc<SampleConfig>) -> Self {
        Self { conf }
    }
}

impl std::fmt::Debug for ConfBasedSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfBasedSampler").finish()
    }
}

impl ShouldSample for ConfBasedSampler {
    fn should_sample(
        &self,
        parent_context: Option<&Context>,
        _trace_id: TraceId,
        _name: &str,
        _span_kind: &SpanKind,
        attributes: &[KeyValue],
        _links: &[Link],
    ) -> SamplingResult {
        if let Some(cx) = parent_context {
            let parent_ctx = cx.span().span_context().clone();
            if parent_ctx.is_valid() {
                let decision = if parent_ctx.is_sampled() {
                    SamplingDecision::RecordAndSample
                } else {
                    SamplingDecision::Drop
                };
                return SamplingResult {
                    decision,
                    attributes: vec![],
                    trace_state: parent_ctx.trace_state().clone(),
                };
            }
        }

        self.conf.maybe_reload();

        let mut uid = 0u32;
        let mut cmd = 0u32;
        let mut root = false;
        for kv in attributes {
            match kv.key.as_str() {
                TAG_UID => {
                    if let opentelemetry::Value::I64(v) = kv.value {
                        uid = v.max(0) as u32;
                    }
                }
                TAG_CMD => {
                    if let opentelemetry::Value::I64(v) = kv.value {
                        cmd = v.max(0) as u32;
                    }
                }
                TAG_ROT => root = matches!(kv.value, opentelemetry::Value::Bool(true)),
                _ => {}
            }
        }

        let decision = if self.conf.check_pass(uid, cmd, root) {
            SamplingDecision::RecordAndSample
        } else {
            SamplingDecision::Drop
        };

        SamplingResult {
            decision,
            attributes: vec![],
            trace_state: TraceState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `SampleConfig::check_pass` carries the decision logic and its own
    // tests; this module only verifies the attribute-parsing glue, since a
    // string-typed `rot` attribute (as opposed to a real bool) must not be
    // mistaken for root.
    #[test]
    fn rot_attribute_must_be_exactly_bool_true() {
        let kv = KeyValue::new(TAG_ROT, "true");
        assert!(!matches!(kv.value, opentelemetry::Value::Bool(true)));

        let kv = KeyValue::new(TAG_ROT, true);
        assert!(matches!(kv.value, opentelemetry::Value::Bool(true)));
    }

    // A valid but unsampled parent must win outright, even against a
    // `SampleConfig` that would otherwise pass everything (the default,
    // unconfigured 100% ratio) — the decision is propagated verbatim, not
    // just the "sampled" half of it.
    #[test]
    fn valid_but_unsampled_parent_context_is_propagated_verbatim() {
        use opentelemetry::trace::{SpanContext, SpanId, TraceFlags};

        let conf = Arc::new(SampleConfig::load());
        let sampler = ConfBasedSampler::new(conf);

        let parent_sc = SpanContext::new(
            TraceId::from_bytes([7u8; 16]),
            SpanId::from_bytes([8u8; 8]),
            TraceFlags::default(),
            true,
            TraceState::default(),
        );
        let cx = Context::current().with_remote_span_context(parent_sc);

        let result = sampler.should_sample(
            Some(&cx),
            TraceId::from_bytes([7u8; 16]),
            "op",
            &SpanKind::Internal,
            &[],
            &[],
        );

        assert_eq!(result.decision, SamplingDecision::Drop);
    }
}
