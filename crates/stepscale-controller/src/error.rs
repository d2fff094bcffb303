//! Errors raised by collaborators and the reconciler.

use thiserror::Error;

use stepscale_state::StateError;

/// A metrics query that produced no usable observation.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The source had no data for the selector. Never the same as zero usage.
    #[error("no metrics available for selector {0:?}")]
    Unavailable(String),

    #[error("metrics query failed: {0}")]
    Query(String),
}

/// Failure reading or writing the workload's replica count.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workload {0} not found")]
    NotFound(String),

    /// The workload changed underneath the write.
    #[error("update conflict on workload {0}")]
    Conflict(String),

    #[error("workload store error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Workload(#[from] StoreError),

    #[error("timed out applying replicas to {0}")]
    UpdateTimeout(String),

    #[error(transparent)]
    State(#[from] StateError),
}
