use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use super::histogram::LatencyHistogram;
use super::types::{ProgressUpdate, RequestResult};
use super::PROGRESS_EVERY;

/// Aggregate of every terminal result recorded during the measured phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Status label to occurrence count.
    pub status_histogram: BTreeMap<String, u64>,
    /// `"<kind>: <detail>"` to occurrence count.
    pub error_histogram: BTreeMap<String, u64>,
    pub response_times: Vec<Duration>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl Statistics {
    /// Measured-phase duration; zero until both timestamps are set.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if let (Some(start), Some(end)) = (self.started_at, self.finished_at) {
            end.saturating_duration_since(start)
        } else {
            Duration::ZERO
        }
    }
}

/// Single-owner statistics state. Only the collector task mutates it.
#[derive(Debug)]
pub struct StatsAggregator {
    stats: Statistics,
    histogram: Option<LatencyHistogram>,
    target: u64,
}

impl StatsAggregator {
    #[must_use]
    pub fn new(target: u64) -> Self {
        let histogram = LatencyHistogram::new()
            .inspect_err(|err| tracing::warn!("Failed to initialize latency histogram: {}", err))
            .ok();
        Self {
            stats: Statistics::default(),
            histogram,
            target,
        }
    }

    /// Folds one terminal result into the statistics.
    ///
    /// Returns a progress update on every tenth result since the last reset.
    pub fn record(&mut self, result: &RequestResult) -> Option<ProgressUpdate> {
        let stats = &mut self.stats;
        stats.total = stats.total.saturating_add(1);
        if result.success {
            stats.successful = stats.successful.saturating_add(1);
        } else {
            stats.failed = stats.failed.saturating_add(1);
            if let Some(failure) = result.failure.as_ref() {
                let count = stats
                    .error_histogram
                    .entry(failure.histogram_key())
                    .or_insert(0);
                *count = count.saturating_add(1);
            }
        }

        let count = stats
            .status_histogram
            .entry(result.status.label())
            .or_insert(0);
        *count = count.saturating_add(1);
        stats.response_times.push(result.response_time);

        if let Some(histogram) = self.histogram.as_mut()
            && let Err(err) = histogram.record(result.response_time)
        {
            tracing::debug!("Failed to record latency: {}", err);
        }

        if stats.total.checked_rem(PROGRESS_EVERY) == Some(0) {
            Some(self.progress())
        } else {
            None
        }
    }

    /// Drops everything recorded so far.
    pub fn reset(&mut self) {
        self.stats = Statistics::default();
        if let Some(histogram) = self.histogram.as_mut() {
            histogram.reset();
        }
    }

    #[must_use]
    pub const fn progress(&self) -> ProgressUpdate {
        ProgressUpdate {
            total: self.stats.total,
            successful: self.stats.successful,
            failed: self.stats.failed,
            target: self.target,
        }
    }

    #[must_use]
    pub const fn statistics(&self) -> &Statistics {
        &self.stats
    }

    #[must_use]
    pub const fn histogram(&self) -> Option<&LatencyHistogram> {
        self.histogram.as_ref()
    }

    #[must_use]
    pub fn into_parts(self) -> (Statistics, Option<LatencyHistogram>) {
        (self.stats, self.histogram)
    }
}
