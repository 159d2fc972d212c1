//! Reserved field/attribute names shared across the carrier, sampler, and facade.

/// Carrier key under which the binary trace context is stashed. Jaeger's
/// own binary propagation format is the nearest well-known analogue of this
/// wire layout.
pub const TRACE_CTX_FIELD: &str = "trace-ctx";

/// Span attribute key carrying the caller-supplied user id.
pub const TAG_UID: &str = "uid";
/// Span attribute key carrying the caller-supplied command id.
pub const TAG_CMD: &str = "cmd";
/// Span attribute key marking a span as a sampling root.
pub const TAG_ROT: &str = "rot";
/// Span attribute key carrying the error code passed to `end_span`.
pub const TAG_ERR: &str = "err";

/// Environment variable naming the sampling/reporter config file.
pub const CONF_ENV: &str = "TRACING_CTRL_CONF";
/// Default config file path when `CONF_ENV` is unset or empty.
pub const CONF_DEFAULT_PATH: &str = "/etc/conf/tracing.yml";

/// Ratio is expressed in basis points of ten thousand; 10_000 == 100%.
pub const MAX_RATIO: u32 = 10_000;
/// Exclusive upper bound on command ids tracked by the floor guarantee.
pub const CMD_MAX: u32 = 131_072;
/// Minimum interval, in seconds, between forced reload attempts.
pub const RELOAD_INTERVAL_SECS: i64 = 60;
/// Floor guarantee window, in seconds: every command is sampled at least
/// once per this interval.
pub const FLOOR_INTERVAL_SECS: i64 = 300;
