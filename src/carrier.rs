//! In-memory key/value carrier used to ferry a hex-encoded trace context
//! across an arbitrary transport (an RPC header map, a message envelope,
//! ...).
//!
//! Values are `String`, not raw bytes, because the wire format (`codec`) is
//! binary and Rust's `String` must be valid UTF-8 — `propagator` hex-encodes
//! the blob before it ever touches a `Carrier`.

use std::collections::HashMap;

/// A flat field map, values as hex-encoded text.
#[derive(Clone, Debug, Default)]
pub struct Carrier {
    fields: HashMap<String, String>,
}

impl Carrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|v| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut c = Carrier::new();
        c.set("trace-ctx", "deadbeef");
        assert_eq!(c.get("trace-ctx"), Some("deadbeef"));
    }

    #[test]
    fn missing_key_is_none() {
        let c = Carrier::new();
        assert_eq!(c.get("trace-ctx"), None);
    }

    #[test]
    fn remove_clears_the_field() {
        let mut c = Carrier::new();
        c.set("a", "1");
        assert_eq!(c.remove("a"), Some("1".to_string()));
        assert_eq!(c.get("a"), None);
    }
}
