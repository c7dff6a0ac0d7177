use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::*;
use crate::app::{RunReport, RunReporter};
use crate::config::RunConfig;
use crate::error::{AppError, AppResult};

fn ok_result(request_id: u64, status: u16, millis: u64) -> RequestResult {
    RequestResult::from_status(request_id, status, Duration::from_millis(millis), 1)
}

fn failed_result(request_id: u64, kind: FailureKind, detail: &str) -> RequestResult {
    RequestResult::from_failure(
        request_id,
        kind.sentinel_status(),
        Failure::new(kind, detail),
        Duration::from_millis(5),
        4,
    )
}

#[test]
fn status_success_range() -> AppResult<()> {
    let cases = [
        (Status::Code(199), false),
        (Status::Code(200), true),
        (Status::Code(302), true),
        (Status::Code(399), true),
        (Status::Code(400), false),
        (Status::Code(404), false),
        (Status::Code(500), false),
        (Status::Timeout, false),
        (Status::Error, false),
    ];
    for (status, expected) in cases {
        if status.is_success() != expected {
            return Err(AppError::validation(format!(
                "Unexpected success for {}",
                status
            )));
        }
    }
    Ok(())
}

#[test]
fn sentinel_labels() -> AppResult<()> {
    let labels = [
        (FailureKind::Timeout, "TIMEOUT", "Timeout"),
        (
            FailureKind::Connection,
            "CONNECTION_ERROR",
            "ConnectionError",
        ),
        (
            FailureKind::ProxyConnection,
            "PROXY_ERROR",
            "ProxyConnectionError",
        ),
        (FailureKind::Protocol, "ERROR", "ProtocolError"),
        (FailureKind::Unclassified, "ERROR", "Error"),
    ];
    for (kind, status_label, kind_label) in labels {
        if kind.sentinel_status().label() != status_label || kind.label() != kind_label {
            return Err(AppError::validation(format!(
                "Unexpected labels for {:?}",
                kind
            )));
        }
    }
    Ok(())
}

#[test]
fn only_transient_failures_are_retryable() -> AppResult<()> {
    let retryable: Vec<FailureKind> = [
        FailureKind::Timeout,
        FailureKind::Connection,
        FailureKind::ProxyConnection,
        FailureKind::Protocol,
        FailureKind::Unclassified,
    ]
    .into_iter()
    .filter(|kind| kind.is_retryable())
    .collect();
    if retryable
        != vec![
            FailureKind::Timeout,
            FailureKind::Connection,
            FailureKind::ProxyConnection,
        ]
    {
        return Err(AppError::validation(format!(
            "Unexpected retryable kinds: {:?}",
            retryable
        )));
    }
    Ok(())
}

#[test]
fn aggregator_counts_results() -> AppResult<()> {
    let mut aggregator = StatsAggregator::new(10);
    aggregator.record(&ok_result(1, 200, 10));
    aggregator.record(&ok_result(2, 404, 20));
    aggregator.record(&failed_result(3, FailureKind::Connection, "refused"));
    aggregator.record(&failed_result(4, FailureKind::Connection, "refused"));

    let stats = aggregator.statistics();
    if stats.total != 4 || stats.successful != 1 || stats.failed != 3 {
        return Err(AppError::validation(format!(
            "Unexpected totals: {}/{}/{}",
            stats.total, stats.successful, stats.failed
        )));
    }
    if stats.total != stats.successful.saturating_add(stats.failed) {
        return Err(AppError::validation("total != successful + failed"));
    }
    if stats.status_histogram.get("404") != Some(&1)
        || stats.status_histogram.get("CONNECTION_ERROR") != Some(&2)
    {
        return Err(AppError::validation(format!(
            "Unexpected statuses: {:?}",
            stats.status_histogram
        )));
    }
    if stats.error_histogram.len() != 1
        || stats.error_histogram.get("ConnectionError: refused") != Some(&2)
    {
        return Err(AppError::validation(format!(
            "Unexpected errors: {:?}",
            stats.error_histogram
        )));
    }
    if stats.response_times.len() != 4 {
        return Err(AppError::validation("Expected four samples"));
    }
    Ok(())
}

#[test]
fn aggregator_reports_progress_every_ten() -> AppResult<()> {
    let mut aggregator = StatsAggregator::new(25);
    let mut updates = Vec::new();
    for request_id in 1..=25 {
        if let Some(update) = aggregator.record(&ok_result(request_id, 200, 1)) {
            updates.push(update);
        }
    }
    let totals: Vec<u64> = updates.iter().map(|update| update.total).collect();
    if totals != vec![10, 20] {
        return Err(AppError::validation(format!("Unexpected progress: {:?}", totals)));
    }
    if updates.iter().any(|update| update.target != 25) {
        return Err(AppError::validation("Progress must carry the target"));
    }
    Ok(())
}

#[test]
fn aggregator_reset_starts_fresh() -> AppResult<()> {
    let mut aggregator = StatsAggregator::new(100);
    for request_id in 0..7 {
        aggregator.record(&failed_result(request_id, FailureKind::Timeout, "slow"));
    }
    aggregator.reset();
    if *aggregator.statistics() != Statistics::default() {
        return Err(AppError::validation("Reset left data behind"));
    }
    if aggregator.histogram().map(LatencyHistogram::count) != Some(0) {
        return Err(AppError::validation("Reset left histogram samples"));
    }

    let mut first_update = None;
    for request_id in 1..=10 {
        if let Some(update) = aggregator.record(&ok_result(request_id, 200, 1)) {
            first_update = Some(update);
        }
    }
    if first_update.map(|update| update.total) != Some(10) {
        return Err(AppError::validation(
            "Progress count must restart after reset",
        ));
    }
    Ok(())
}

#[test]
fn histogram_percentiles_track_samples() -> AppResult<()> {
    let mut histogram = LatencyHistogram::new()?;
    for millis in 1..=100 {
        histogram.record(Duration::from_millis(millis))?;
    }
    let (p50, p90, p99) = histogram.percentiles();
    let close = |actual: Duration, expected_ms: u64| {
        let expected = Duration::from_millis(expected_ms);
        actual >= expected && actual <= expected.saturating_add(Duration::from_millis(1))
    };
    if !close(p50, 50) || !close(p90, 90) || !close(p99, 99) {
        return Err(AppError::validation(format!(
            "Unexpected percentiles: {:?} {:?} {:?}",
            p50, p90, p99
        )));
    }
    if histogram.count() != 100 {
        return Err(AppError::validation("Unexpected sample count"));
    }
    histogram.reset();
    if histogram.percentiles() != (Duration::ZERO, Duration::ZERO, Duration::ZERO) {
        return Err(AppError::validation("Empty histogram should report zeros"));
    }
    Ok(())
}

#[test]
fn statistics_duration_needs_both_timestamps() -> AppResult<()> {
    let mut stats = Statistics::default();
    if stats.duration() != Duration::ZERO {
        return Err(AppError::validation("Expected zero duration"));
    }
    let start = tokio::time::Instant::now();
    stats.started_at = Some(start);
    stats.finished_at = start.checked_add(Duration::from_millis(1500));
    if stats.duration() != Duration::from_millis(1500) {
        return Err(AppError::validation("Unexpected duration"));
    }
    Ok(())
}

#[derive(Default)]
struct ProgressLog {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RunReporter for ProgressLog {
    fn started(&self, _config: &RunConfig) {}

    fn warmup(&self, _count: u64) {}

    fn progress(&self, update: ProgressUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update);
    }

    fn finished(&self, _report: &RunReport) {}
}

#[test]
fn collector_applies_records_and_resets_in_order() -> AppResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(async {
        let log = Arc::new(ProgressLog::default());
        let reporter = Arc::clone(&log) as Arc<dyn RunReporter>;
        let (sender, handle) = setup_stats_collector(20, reporter);

        for request_id in 0..10 {
            sender.record(ok_result(request_id, 500, 1)).await?;
        }
        sender.reset().await?;

        let mut workers = Vec::new();
        for worker in 0..4u64 {
            let sender = sender.clone();
            workers.push(tokio::spawn(async move {
                for offset in 0..5u64 {
                    let request_id = worker.saturating_mul(5).saturating_add(offset).saturating_add(1);
                    sender.record(ok_result(request_id, 200, 2)).await?;
                }
                Ok::<(), AppError>(())
            }));
        }
        for worker in workers {
            worker.await??;
        }
        drop(sender);

        let aggregator = handle.await?;
        let stats = aggregator.statistics();
        if stats.total != 20 || stats.successful != 20 || stats.status_histogram.contains_key("500")
        {
            return Err(AppError::validation(format!(
                "Unexpected statistics after reset: {:?}",
                stats.status_histogram
            )));
        }
        let totals: Vec<u64> = log
            .updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|update| update.total)
            .collect();
        if totals != vec![10, 10, 20] {
            return Err(AppError::validation(format!(
                "Unexpected progress totals: {:?}",
                totals
            )));
        }
        Ok(())
    })
}

#[test]
fn warmup_records_never_reach_the_reporter() -> AppResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(async {
        let log = Arc::new(ProgressLog::default());
        let reporter = Arc::clone(&log) as Arc<dyn RunReporter>;
        let (sender, handle) = setup_stats_collector(10, reporter);

        sender.begin_warmup().await?;
        for request_id in 0..10 {
            sender.record(ok_result(request_id, 200, 1)).await?;
        }
        sender.reset().await?;
        for request_id in 1..=10 {
            sender.record(ok_result(request_id, 200, 1)).await?;
        }
        drop(sender);

        let aggregator = handle.await?;
        if aggregator.statistics().total != 10 {
            return Err(AppError::validation("Expected ten measured results"));
        }
        let totals: Vec<u64> = log
            .updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|update| update.total)
            .collect();
        if totals != vec![10] {
            return Err(AppError::validation(format!(
                "Unexpected progress totals: {:?}",
                totals
            )));
        }
        Ok(())
    })
}
