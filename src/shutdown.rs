use std::sync::Arc;

use tokio::sync::watch;

/// Cooperative run flag shared by the controller, the workers and the executor.
///
/// The flag starts raised. Clearing it never interrupts in-flight requests:
/// loops observe it at their next poll and stop taking new work.
#[derive(Debug, Clone)]
pub struct RunFlag {
    running: Arc<watch::Sender<bool>>,
}

impl RunFlag {
    #[must_use]
    pub fn new() -> Self {
        let (running, _) = watch::channel(true);
        Self {
            running: Arc::new(running),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Clears the flag. Idempotent.
    pub fn stop(&self) {
        self.running.send_if_modified(|running| {
            let was_running = *running;
            *running = false;
            was_running
        });
    }

    /// Resolves once the flag has been cleared.
    pub async fn stopped(&self) {
        let mut rx = self.running.subscribe();
        if rx.wait_for(|running| !*running).await.is_err() {
            tracing::debug!("Run flag sender dropped while waiting for stop");
        }
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}
