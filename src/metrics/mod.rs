//! Per-request results and the statistics they aggregate into.
mod collector;
mod histogram;
mod stats;
mod types;

#[cfg(test)]
mod tests;

pub use collector::{ResultSender, setup_stats_collector};
pub use histogram::LatencyHistogram;
pub use stats::{Statistics, StatsAggregator};
pub use types::{Failure, FailureKind, ProgressUpdate, RequestResult, Status};

/// A progress notification is emitted every this many recorded results.
pub const PROGRESS_EVERY: u64 = 10;
