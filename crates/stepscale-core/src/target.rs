//! The resolved target of one reconcile stream.

use std::time::Duration;

use crate::policy::PolicyConfig;
use crate::types::WorkloadKey;

/// Everything a reconcile loop needs to size one workload.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTarget {
    pub key: WorkloadKey,
    /// Selects the workload's pods; opaque to everything but the metrics provider.
    pub selector: String,
    /// Trailing window the metrics provider aggregates over.
    pub metrics_window: Duration,
    pub policy: PolicyConfig,
}
