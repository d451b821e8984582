//! Error types for the execution layer.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Submission was refused because shutdown has started.
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// Graceful shutdown exceeded its grace period and remaining tasks
    /// were force-cancelled. Logged, not fatal to the process.
    #[error("worker pool shutdown exceeded the {0:?} grace period")]
    ShutdownTimeout(Duration),
}
