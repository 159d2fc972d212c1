//! Binary trace-context wire format.
//!
//! ```text
//! offset  size  field
//!   0     16    trace_id
//!  16      8    span_id
//!  24      8    parent_span_id (reserved; zero on write, ignored on read)
//!  32      1    flags: b'1' if sampled else b'0'
//!  33      4    baggage_count (u32, big-endian)
//!  37    var    baggage entries: (u32 key_len, key, u32 val_len, val) each
//! ```
//!
//! All integers are big-endian. The fixed header is 37 bytes; anything
//! shorter decodes to [`SpanContext::invalid`]. Encode/decode never fail —
//! malformed input degrades to the invalid context, matching the rest of
//! this crate's error-handling policy (see `error` module docs).

use crate::context::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

const TRACE_ID_LEN: usize = 16;
const SPAN_ID_LEN: usize = 8;
const RESERVED_PARENT_LEN: usize = 8;
const FLAG_LEN: usize = 1;
const COUNT_LEN: usize = 4;
/// Fixed header length: trace id + span id + reserved parent + flag + count.
pub const HEADER_LEN: usize = TRACE_ID_LEN + SPAN_ID_LEN + RESERVED_PARENT_LEN + FLAG_LEN + COUNT_LEN;

/// Encode a [`SpanContext`] to its wire representation.
pub fn encode(ctx: &SpanContext) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&ctx.trace_id().to_bytes());
    out.extend_from_slice(&ctx.span_id().to_bytes());
    out.extend_from_slice(&[0u8; RESERVED_PARENT_LEN]);
    out.push(if ctx.is_sampled() { b'1' } else { b'0' });

    let count = ctx.state().len() as u32;
    out.extend_from_slice(&count.to_be_bytes());

    for (key, val) in ctx.state().iter() {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(&(val.len() as u32).to_be_bytes());
        out.extend_from_slice(val);
    }
    out
}

/// Decode a [`SpanContext`] from its wire representation.
///
/// Returns [`SpanContext::invalid`] if `bytes` is shorter than
/// [`HEADER_LEN`], or if any length-prefixed baggage entry would read past
/// the end of `bytes`.
pub fn decode(bytes: &[u8]) -> SpanContext {
    if bytes.len() < HEADER_LEN {
        return SpanContext::invalid();
    }

    let mut trace_id = [0u8; TRACE_ID_LEN];
    trace_id.copy_from_slice(&bytes[0..TRACE_ID_LEN]);
    let mut span_id = [0u8; SPAN_ID_LEN];
    span_id.copy_from_slice(&bytes[TRACE_ID_LEN..TRACE_ID_LEN + SPAN_ID_LEN]);
    // Reserved parent-span-id bytes at [24, 32) are accepted but ignored.

    let flag_offset = TRACE_ID_LEN + SPAN_ID_LEN + RESERVED_PARENT_LEN;
    let sampled = bytes[flag_offset] == b'1';

    let count_offset = flag_offset + FLAG_LEN;
    let count = u32::from_be_bytes(bytes[count_offset..count_offset + COUNT_LEN].try_into().unwrap());

    let mut state = TraceState::new();
    let mut offset = HEADER_LEN;
    for _ in 0..count {
        let Some(key) = read_lenval(bytes, &mut offset) else {
            return SpanContext::invalid();
        };
        let Some(val) = read_lenval(bytes, &mut offset) else {
            return SpanContext::invalid();
        };
        state.set(key, val);
    }

    SpanContext::new(
        TraceId::from_bytes(trace_id),
        SpanId::from_bytes(span_id),
        if sampled { TraceFlags::SAMPLED } else { TraceFlags::NOT_SAMPLED },
        true,
        state,
    )
}

/// Read a `(u32 len, len bytes)` field starting at `*offset`, advancing it.
/// Returns `None` (without mutating `*offset` further) if the field would
/// run past the end of `bytes`.
fn read_lenval<'a>(bytes: &'a [u8], offset: &mut usize) -> Option<&'a [u8]> {
    if *offset + COUNT_LEN > bytes.len() {
        return None;
    }
    let len = u32::from_be_bytes(bytes[*offset..*offset + COUNT_LEN].try_into().unwrap()) as usize;
    *offset += COUNT_LEN;
    if *offset + len > bytes.len() {
        return None;
    }
    let val = &bytes[*offset..*offset + len];
    *offset += len;
    Some(val)
}
