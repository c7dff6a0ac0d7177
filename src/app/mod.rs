//! Run orchestration: task queue, worker pool, controller and reporting.
mod console;
mod pool;
mod queue;
mod report;
mod runner;


pub use console::ConsoleReporter;
pub use pool::{QUEUE_POLL_INTERVAL, WORKER_STAGGER, WorkerPool};
pub use queue::TaskQueue;
pub use report::{RunReport, RunReporter};
pub use runner::{RunController, RunPhase, warmup_count};
