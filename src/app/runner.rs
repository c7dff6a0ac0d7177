use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::AppResult;
use crate::http::{ReqwestTransport, RequestExecutor, Transport};
use crate::metrics::{ResultSender, setup_stats_collector};
use crate::shutdown::RunFlag;

use super::pool::WorkerPool;
use super::queue::TaskQueue;
use super::report::{RunReport, RunReporter};

const MAX_WARMUP_REQUESTS: u64 = 10;
const WARMUP_CAP: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Warmup,
    Draining,
    ShuttingDown,
    Done,
}

impl RunPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Warmup => "warmup",
            RunPhase::Draining => "draining",
            RunPhase::ShuttingDown => "shutting-down",
            RunPhase::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of unmeasured warmup requests for a given concurrency.
#[must_use]
pub fn warmup_count(concurrency: usize) -> u64 {
    let per_ten = u64::try_from(concurrency)
        .unwrap_or(u64::MAX)
        .checked_div(10)
        .unwrap_or(0);
    MAX_WARMUP_REQUESTS.min(per_ten).min(WARMUP_CAP)
}

/// Drives one load test from warmup to the final report.
pub struct RunController {
    config: RunConfig,
    executor: RequestExecutor,
    run_flag: RunFlag,
    reporter: Arc<dyn RunReporter>,
    phase: RunPhase,
}

impl RunController {
    /// Builds a controller backed by the shared `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client or request template cannot be
    /// built.
    pub fn new(
        config: RunConfig,
        run_flag: RunFlag,
        reporter: Arc<dyn RunReporter>,
    ) -> AppResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, transport, run_flag, reporter))
    }

    #[must_use]
    pub fn with_transport(
        config: RunConfig,
        transport: Arc<dyn Transport>,
        run_flag: RunFlag,
        reporter: Arc<dyn RunReporter>,
    ) -> Self {
        let executor = RequestExecutor::new(transport, config.retry, run_flag.clone());
        Self {
            config,
            executor,
            run_flag,
            reporter,
            phase: RunPhase::Idle,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Runs to completion, or until the run flag is cleared, and returns the
    /// report that was handed to the reporter.
    ///
    /// # Errors
    ///
    /// Returns an error only when the collector task fails; per-request
    /// failures end up in the report.
    pub async fn run(mut self) -> AppResult<RunReport> {
        let started_wall = chrono::Local::now();
        let target = self.config.num_requests.get();
        let concurrency = self.config.concurrency.get();
        self.reporter.started(&self.config);
        info!(
            "Starting load test: {} {} requests against {} with concurrency {}",
            target, self.config.method, self.config.url, concurrency
        );

        let (results, collector) = setup_stats_collector(target, Arc::clone(&self.reporter));

        let warmup = warmup_count(concurrency);
        if warmup > 0 {
            self.transition(RunPhase::Warmup);
            self.reporter.warmup(warmup);
            self.run_warmup(warmup, &results).await?;
        }

        self.transition(RunPhase::Draining);
        let started_at = Instant::now();
        let queue = Arc::new(TaskQueue::new(concurrency.saturating_mul(2)));
        let pool = WorkerPool::start(
            concurrency,
            &queue,
            &self.executor,
            &results,
            &self.run_flag,
        );

        let produced = self.produce(&queue, target).await?;
        debug!("Queued {} of {} requests", produced, target);

        let drained = tokio::select! {
            biased;
            () = queue.join() => true,
            () = self.run_flag.stopped() => false,
        };

        self.transition(RunPhase::ShuttingDown);
        if drained {
            pool.shutdown().await;
        } else {
            warn!(
                "Run stopped with {} queued requests unfinished",
                queue.unfinished()
            );
            pool.wait().await;
        }
        let finished_at = Instant::now();

        drop(results);
        let aggregator = collector.await?;
        let (mut statistics, histogram) = aggregator.into_parts();
        statistics.started_at = Some(started_at);
        statistics.finished_at = Some(finished_at);
        self.transition(RunPhase::Done);

        // Complete once every id has a result, even if a stop arrived after.
        let interrupted = statistics.total < target;
        let report = RunReport::build(
            statistics,
            histogram.as_ref(),
            target,
            started_wall,
            interrupted,
        );
        self.reporter.finished(&report);
        Ok(report)
    }

    fn transition(&mut self, next: RunPhase) {
        debug!("Run phase: {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Fires the warmup burst outside the queue, then discards its results.
    async fn run_warmup(&self, count: u64, results: &ResultSender) -> AppResult<()> {
        results.begin_warmup().await?;
        let outcomes = join_all((0..count).map(|request_id| self.executor.execute(request_id))).await;
        let mut completed: u64 = 0;
        for result in outcomes.into_iter().flatten() {
            completed = completed.saturating_add(1);
            results.record(result).await?;
        }
        results.reset().await?;
        debug!("Warmup finished: {} of {} requests completed", completed, count);
        Ok(())
    }

    /// Pushes ids `1..=target`, stopping early once the run flag clears.
    async fn produce(&self, queue: &TaskQueue, target: u64) -> AppResult<u64> {
        let mut produced: u64 = 0;
        for request_id in 1..=target {
            if !self.run_flag.is_running() {
                break;
            }
            tokio::select! {
                biased;
                () = self.run_flag.stopped() => break,
                pushed = queue.put(request_id) => pushed?,
            }
            produced = request_id;
        }
        Ok(produced)
    }
}
