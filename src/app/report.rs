use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::RunConfig;
use crate::metrics::{LatencyHistogram, ProgressUpdate, Statistics};

/// Requests/sec never divides by less than this.
const MIN_RATE_WINDOW_MS: u128 = 100;

/// Receives run lifecycle notifications. Called from the controller and the
/// collector task, so implementations must be cheap and non-blocking.
pub trait RunReporter: Send + Sync {
    fn started(&self, config: &RunConfig);
    fn warmup(&self, count: u64);
    fn progress(&self, update: ProgressUpdate);
    fn finished(&self, report: &RunReport);
}

/// Frozen statistics plus derived metrics. Rates are fixed-point x100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub statistics: Statistics,
    pub target: u64,
    pub started_at: DateTime<Local>,
    pub interrupted: bool,
    pub duration: Duration,
    pub success_rate_x100: u64,
    pub failure_rate_x100: u64,
    pub requests_per_sec_x100: u64,
    pub avg_response_time: Duration,
    pub min_response_time: Duration,
    pub max_response_time: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
    /// Sorted by label.
    pub status_counts: Vec<(String, u64)>,
    /// Sorted by descending count, then key.
    pub error_counts: Vec<(String, u64)>,
}

impl RunReport {
    #[must_use]
    pub fn build(
        statistics: Statistics,
        histogram: Option<&LatencyHistogram>,
        target: u64,
        started_at: DateTime<Local>,
        interrupted: bool,
    ) -> Self {
        let duration = statistics.duration();
        let total = statistics.total;

        let (p50, p90, p99) = match histogram {
            Some(histogram) if histogram.count() > 0 => histogram.percentiles(),
            Some(_) | None => sample_percentiles(&statistics.response_times),
        };

        let status_counts = statistics
            .status_histogram
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect();
        let mut error_counts: Vec<(String, u64)> = statistics
            .error_histogram
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        error_counts.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));

        Self {
            target,
            started_at,
            interrupted,
            duration,
            success_rate_x100: percent_x100(statistics.successful, total),
            failure_rate_x100: percent_x100(statistics.failed, total),
            requests_per_sec_x100: rate_x100(total, duration),
            avg_response_time: average(&statistics.response_times),
            min_response_time: statistics
                .response_times
                .iter()
                .min()
                .copied()
                .unwrap_or_default(),
            max_response_time: statistics
                .response_times
                .iter()
                .max()
                .copied()
                .unwrap_or_default(),
            p50,
            p90,
            p99,
            status_counts,
            error_counts,
            statistics,
        }
    }
}

fn percent_x100(part: u64, total: u64) -> u64 {
    let scaled = u128::from(part)
        .saturating_mul(10_000)
        .checked_div(u128::from(total))
        .unwrap_or(0);
    u64::try_from(scaled).map_or(u64::MAX, |value| value)
}

fn rate_x100(total: u64, duration: Duration) -> u64 {
    if total == 0 {
        return 0;
    }
    let window_ms = duration.as_millis().max(MIN_RATE_WINDOW_MS);
    let scaled = u128::from(total)
        .saturating_mul(100_000)
        .checked_div(window_ms)
        .unwrap_or(0);
    u64::try_from(scaled).map_or(u64::MAX, |value| value)
}

fn average(samples: &[Duration]) -> Duration {
    let total_nanos = samples
        .iter()
        .fold(0u128, |acc, sample| acc.saturating_add(sample.as_nanos()));
    let count = u128::try_from(samples.len()).unwrap_or(u128::MAX);
    let avg_nanos = total_nanos.checked_div(count).unwrap_or(0);
    Duration::from_nanos(u64::try_from(avg_nanos).unwrap_or(u64::MAX))
}

fn sample_percentiles(samples: &[Duration]) -> (Duration, Duration, Duration) {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    (
        nearest_rank(&sorted, 50),
        nearest_rank(&sorted, 90),
        nearest_rank(&sorted, 99),
    )
}

fn nearest_rank(sorted: &[Duration], percentile: usize) -> Duration {
    let rank = sorted
        .len()
        .saturating_mul(percentile)
        .saturating_add(99)
        .checked_div(100)
        .unwrap_or(0);
    sorted
        .get(rank.saturating_sub(1))
        .copied()
        .unwrap_or_default()
}
