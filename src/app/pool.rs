use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::http::RequestExecutor;
use crate::metrics::ResultSender;
use crate::shutdown::RunFlag;

use super::queue::TaskQueue;

/// Delay between consecutive worker start-ups.
pub const WORKER_STAGGER: Duration = Duration::from_millis(10);
/// How long a worker waits on an empty queue before re-checking the run flag.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of workers pulling ids from a shared [`TaskQueue`].
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers; worker `i` starts after `i * 10ms`.
    #[must_use]
    pub fn start(
        size: usize,
        queue: &Arc<TaskQueue>,
        executor: &RequestExecutor,
        results: &ResultSender,
        run_flag: &RunFlag,
    ) -> Self {
        let handles = (0..size)
            .map(|worker_index| {
                tokio::spawn(worker_loop(
                    worker_index,
                    Arc::clone(queue),
                    executor.clone(),
                    results.clone(),
                    run_flag.clone(),
                ))
            })
            .collect();
        Self { handles }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Cancels every worker and waits for them. Cancellations and panics are
    /// logged, never returned.
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        self.join_workers().await;
    }

    /// Waits for workers to leave their loops after the run flag was cleared.
    pub async fn wait(self) {
        self.join_workers().await;
    }

    async fn join_workers(self) {
        for (worker_index, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {
                    debug!("Worker {} cancelled", worker_index);
                }
                Err(err) => {
                    warn!("Worker {} terminated abnormally: {}", worker_index, err);
                }
            }
        }
    }
}

async fn worker_loop(
    worker_index: usize,
    queue: Arc<TaskQueue>,
    executor: RequestExecutor,
    results: ResultSender,
    run_flag: RunFlag,
) {
    let stagger = WORKER_STAGGER.saturating_mul(u32::try_from(worker_index).unwrap_or(u32::MAX));
    tokio::select! {
        () = sleep(stagger) => {}
        () = run_flag.stopped() => {
            debug!("Worker {} stopped before starting", worker_index);
            return;
        }
    }
    debug!("Worker {} started", worker_index);

    let mut handled: u64 = 0;
    while run_flag.is_running() {
        let Some(request_id) = queue.get(QUEUE_POLL_INTERVAL).await else {
            continue;
        };
        if let Some(result) = executor.execute(request_id).await {
            handled = handled.saturating_add(1);
            if let Err(err) = results.record(result).await {
                warn!("Worker {} failed to record result: {}", worker_index, err);
            }
        }
        queue.task_done();
    }

    debug!("Worker {} stopped after {} requests", worker_index, handled);
}
