//! HTTP client construction, request attempts and the retry policy.
mod classify;
mod client;
mod executor;
mod retry;
mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use executor::RequestExecutor;
pub use retry::RetryPolicy;
pub use transport::{AttemptError, AttemptResponse, ReqwestTransport, Transport};
