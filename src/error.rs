//! Error types shared across the pool.

use thiserror::Error;

/// Error returned by pool construction and resource hand-off operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool was constructed with a capacity of zero
    #[error("pool capacity must be at least 1")]
    InvalidCapacity,

    /// The owner's construction hook failed
    #[error("failed to create resource: {0}")]
    CreationFailed(String),

    /// The owner's teardown hook failed
    #[error("failed to close resource: {0}")]
    TeardownFailed(String),

    /// A timeout occurred while waiting for a resource
    #[error("timeout waiting for resource")]
    Timeout,

    /// No resource was immediately available
    #[error("resource pool exhausted")]
    Exhausted,

    /// The pool is shut down
    #[error("resource pool is shut down")]
    PoolShutdown,

    /// The availability queue disconnected while waiting.
    ///
    /// This cannot happen while the owning pool is alive; it is surfaced as
    /// a fatal, non-retriable failure for the affected call.
    #[error("availability queue disconnected")]
    Disconnected,
}
