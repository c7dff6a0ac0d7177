use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::timeout;

use crate::error::{AppError, AppResult};

/// Bounded FIFO of request ids with drain tracking.
///
/// Every `put` increments an unfinished counter that `task_done` decrements;
/// `join` resolves once the counter is back at zero.
#[derive(Debug)]
pub struct TaskQueue {
    tx: mpsc::Sender<u64>,
    rx: Mutex<mpsc::Receiver<u64>>,
    unfinished: watch::Sender<usize>,
}

impl TaskQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (unfinished, _) = watch::channel(0usize);
        Self {
            tx,
            rx: Mutex::new(rx),
            unfinished,
        }
    }

    /// Enqueues `request_id`, waiting while the queue is full.
    ///
    /// Cancel-safe: an id is counted as unfinished only once it is in the
    /// queue.
    ///
    /// # Errors
    ///
    /// Returns an error when the receiving half is gone.
    pub async fn put(&self, request_id: u64) -> AppResult<()> {
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_closed| AppError::QueueClosed)?;
        self.unfinished
            .send_modify(|count| *count = count.saturating_add(1));
        permit.send(request_id);
        Ok(())
    }

    /// Dequeues the next id, giving up after `wait`.
    pub async fn get(&self, wait: Duration) -> Option<u64> {
        timeout(wait, async { self.rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Marks one dequeued id as finished.
    pub fn task_done(&self) {
        self.unfinished
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Resolves once every enqueued id has been marked done.
    pub async fn join(&self) {
        let mut unfinished = self.unfinished.subscribe();
        if unfinished.wait_for(|count| *count == 0).await.is_err() {
            tracing::debug!("Task queue counter dropped while joining");
        }
    }

    /// Ids currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.max_capacity().saturating_sub(self.tx.capacity())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Ids put but not yet marked done.
    #[must_use]
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }
}
