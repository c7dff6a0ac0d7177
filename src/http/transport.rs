use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Request};
use tokio::time::Instant;

use crate::config::RunConfig;
use crate::error::{AppResult, HttpError};
use crate::metrics::{Failure, FailureKind, Status};

use super::classify::{classify_body_error, classify_error};
use super::client::{build_client, build_request_template};

/// A response whose head arrived and whose body was read to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptResponse {
    pub status: u16,
    /// When the response head arrived; latency is measured up to here.
    pub head_received: Instant,
}

/// A classified failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    pub failure: Failure,
    /// Offending status, when the response got far enough to carry one.
    pub status: Option<u16>,
}

impl AttemptError {
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            failure: Failure::new(kind, detail),
            status: None,
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.failure.kind
    }

    /// Status recorded for this failure once it becomes terminal.
    #[must_use]
    pub fn result_status(&self) -> Status {
        self.status
            .map_or_else(|| self.failure.kind.sentinel_status(), Status::Code)
    }
}

/// One HTTP attempt against the target. The seam between the executor and the
/// network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn attempt(&self, request_id: u64) -> Result<AttemptResponse, AttemptError>;
}

/// Production transport: a shared `reqwest` client plus a prebuilt request.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    template: Request,
    proxied: bool,
    request_timeout: Duration,
}

impl ReqwestTransport {
    /// Builds the shared client and the request template.
    ///
    /// # Errors
    ///
    /// Returns an error when the proxy, a header, or the client itself is invalid.
    pub fn new(config: &RunConfig) -> AppResult<Self> {
        let client = build_client(config)?;
        let template = build_request_template(&client, config)?;
        Ok(Self {
            client,
            template,
            proxied: config.proxy.is_some(),
            request_timeout: config.request_timeout,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn attempt(&self, _request_id: u64) -> Result<AttemptResponse, AttemptError> {
        let Some(request) = self.template.try_clone() else {
            return Err(AttemptError::new(
                FailureKind::Unclassified,
                HttpError::CloneRequestFailed.to_string(),
            ));
        };

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|err| classify_error(&err, self.proxied, self.request_timeout))?;
        let head_received = Instant::now();
        let status = response.status().as_u16();

        drain_response_body(response)
            .await
            .map_err(|err| classify_body_error(&err, status, self.request_timeout))?;

        Ok(AttemptResponse {
            status,
            head_received,
        })
    }
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}
