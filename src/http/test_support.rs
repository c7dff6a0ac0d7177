use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use crate::metrics::FailureKind;

use super::transport::{AttemptError, AttemptResponse, Transport};

pub(crate) enum Step {
    Respond { latency: Duration, status: u16 },
    Fail { latency: Duration, error: AttemptError },
}

impl Step {
    pub(crate) const fn ok(status: u16, latency: Duration) -> Self {
        Step::Respond { latency, status }
    }

    pub(crate) fn fail(kind: FailureKind, detail: &str, latency: Duration) -> Self {
        Step::Fail {
            latency,
            error: AttemptError::new(kind, detail),
        }
    }
}

type Script = Box<dyn Fn(u64, u32) -> Step + Send + Sync>;

/// Transport whose outcome is a function of `(request_id, attempt)`.
pub(crate) struct ScriptedTransport {
    script: Script,
    attempts: Mutex<HashMap<u64, u32>>,
    calls: Mutex<Vec<(u64, Instant)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: impl Fn(u64, u32) -> Step + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            attempts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always(status: u16, latency: Duration) -> Self {
        Self::new(move |_, _| Step::ok(status, latency))
    }

    /// Every attempt start, in call order.
    pub(crate) fn calls(&self) -> Vec<(u64, Instant)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn attempts_for(&self, request_id: u64) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn attempt(&self, request_id: u64) -> Result<AttemptResponse, AttemptError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = attempts.entry(request_id).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((request_id, Instant::now()));

        match (self.script)(request_id, attempt) {
            Step::Respond { latency, status } => {
                sleep(latency).await;
                Ok(AttemptResponse {
                    status,
                    head_received: Instant::now(),
                })
            }
            Step::Fail { latency, error } => {
                sleep(latency).await;
                Err(error)
            }
        }
    }
}
