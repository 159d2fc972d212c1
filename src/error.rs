//! Crate-wide error type.
//!
//! Nothing in this module reaches a caller of the public API: spec-level
//! failures (malformed wire bytes, bad hex, a missing or unparsable config
//! file) all degrade to a default value rather than bubbling up a `Result`
//! (see the module docs on `sampling::config` for why). `TracingCtrlError`
//! exists so the degrade-and-log sites have something precise to match on
//! and log, even though nearly every one of its own callers also recovers
//! rather than propagating it.

use std::path::PathBuf;

/// Errors surfaced internally while loading the sampling/reporter config file.
#[derive(Debug, thiserror::Error)]
pub enum TracingCtrlError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
