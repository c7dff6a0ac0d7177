use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("volley/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_REQUESTS: u64 = 100;
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs above this many requests ask for confirmation unless `--yes` is set.
pub const LARGE_RUN_THRESHOLD: u64 = 10_000;
