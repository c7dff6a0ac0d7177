use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult, MetricsError};
use crate::app::RunReporter;

use super::stats::StatsAggregator;
use super::types::RequestResult;

const RESULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
enum CollectorMessage {
    Record(RequestResult),
    /// Results up to the next `Reset` are warmup: recorded, never reported.
    BeginWarmup,
    Reset,
}

/// Cloneable handle workers use to hand results to the collector task.
#[derive(Debug, Clone)]
pub struct ResultSender {
    tx: mpsc::Sender<CollectorMessage>,
}

impl ResultSender {
    /// Queues one result for aggregation.
    ///
    /// # Errors
    ///
    /// Returns an error when the collector task is gone.
    pub async fn record(&self, result: RequestResult) -> AppResult<()> {
        self.tx
            .send(CollectorMessage::Record(result))
            .await
            .map_err(|_closed| AppError::metrics(MetricsError::CollectorClosed))
    }

    /// Marks the following results as warmup until the next [`reset`].
    ///
    /// [`reset`]: ResultSender::reset
    ///
    /// # Errors
    ///
    /// Returns an error when the collector task is gone.
    pub async fn begin_warmup(&self) -> AppResult<()> {
        self.tx
            .send(CollectorMessage::BeginWarmup)
            .await
            .map_err(|_closed| AppError::metrics(MetricsError::CollectorClosed))
    }

    /// Asks the collector to discard everything recorded before this call.
    ///
    /// # Errors
    ///
    /// Returns an error when the collector task is gone.
    pub async fn reset(&self) -> AppResult<()> {
        self.tx
            .send(CollectorMessage::Reset)
            .await
            .map_err(|_closed| AppError::metrics(MetricsError::CollectorClosed))
    }
}

/// Spawns the task that owns the statistics.
///
/// The task runs until every [`ResultSender`] clone is dropped and then
/// yields the final aggregator.
pub fn setup_stats_collector(
    target: u64,
    reporter: Arc<dyn RunReporter>,
) -> (ResultSender, JoinHandle<StatsAggregator>) {
    let (tx, mut rx) = mpsc::channel::<CollectorMessage>(RESULT_CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut aggregator = StatsAggregator::new(target);
        let mut warming_up = false;
        while let Some(message) = rx.recv().await {
            match message {
                CollectorMessage::Record(result) => {
                    if let Some(update) = aggregator.record(&result)
                        && !warming_up
                    {
                        reporter.progress(update);
                    }
                }
                CollectorMessage::BeginWarmup => warming_up = true,
                CollectorMessage::Reset => {
                    warming_up = false;
                    tracing::debug!(
                        discarded = aggregator.statistics().total,
                        "Resetting statistics"
                    );
                    aggregator.reset();
                }
            }
        }
        aggregator
    });

    (ResultSender { tx }, handle)
}
