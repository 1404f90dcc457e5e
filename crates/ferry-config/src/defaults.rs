//! Fallback values applied when a field is absent from every source.

/// Default base URL of a locally reachable endpoint.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
/// Default number of retries after the first transient failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff base; the delay grows with its square.
pub const DEFAULT_BACKOFF_BASE: u32 = 2;
/// Default backoff unit in milliseconds.
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1_000;
/// Default per-call deadline in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
/// Default delay between task polls in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Default cap on conflict resumptions per batch call.
pub const DEFAULT_MAX_RESUMPTIONS: u32 = 32;
/// Default log level directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";
