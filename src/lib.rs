//! Core library for the `volley` CLI.
//!
//! `volley` fires a fixed number of HTTP requests at one target through a
//! bounded pool of workers, retries transient network failures with
//! exponential backoff and aggregates status, error and latency statistics.
//! [`app::RunController`] is the entry point; the binary wires it to the
//! command line, a config file and the console reporter.
pub mod app;
pub mod args;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod shutdown;
pub mod shutdown_handlers;
