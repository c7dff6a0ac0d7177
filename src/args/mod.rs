//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod tests;

pub use cli::TesterArgs;
pub use parsers::parse_header;
pub use types::{HttpMethod, PositiveU64, PositiveUsize};

pub use defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_REQUESTS,
    DEFAULT_USER_AGENT, LARGE_RUN_THRESHOLD,
};
pub(crate) use parsers::parse_duration_arg;
