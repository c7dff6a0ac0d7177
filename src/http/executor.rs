use std::sync::Arc;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::metrics::RequestResult;
use crate::shutdown::RunFlag;

use super::retry::RetryPolicy;
use super::transport::Transport;

/// Runs one logical request: the first attempt plus bounded retries.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    run_flag: RunFlag,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy, run_flag: RunFlag) -> Self {
        Self {
            transport,
            retry,
            run_flag,
        }
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Executes `request_id` and returns its single terminal result.
    ///
    /// Returns `None` only when the run was stopped before the first attempt.
    /// Once started, a request finishes its retry sequence even if the run is
    /// stopped meanwhile.
    pub async fn execute(&self, request_id: u64) -> Option<RequestResult> {
        if !self.run_flag.is_running() {
            return None;
        }

        let max_attempts = self.retry.max_attempts();
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let attempt_start = Instant::now();
            match self.transport.attempt(request_id).await {
                Ok(response) => {
                    let response_time = response
                        .head_received
                        .saturating_duration_since(attempt_start);
                    return Some(RequestResult::from_status(
                        request_id,
                        response.status,
                        response_time,
                        attempts,
                    ));
                }
                Err(error) => {
                    if error.kind().is_retryable() && attempts < max_attempts {
                        let delay = self.retry.delay_for(attempts);
                        debug!(
                            "Request {} attempt {} failed ({}), retrying in {:?}",
                            request_id,
                            attempts,
                            error.failure.histogram_key(),
                            delay
                        );
                        sleep(delay).await;
                        continue;
                    }
                    let status = error.result_status();
                    return Some(RequestResult::from_failure(
                        request_id,
                        status,
                        error.failure,
                        attempt_start.elapsed(),
                        attempts,
                    ));
                }
            }
        }
    }
}
