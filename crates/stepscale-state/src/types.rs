//! Persisted record types.

use serde::{Deserialize, Serialize};

use stepscale_core::{EngineState, EpochMillis, WorkloadKey};

/// Last applied scaling decision for one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleRecord {
    pub workload: WorkloadKey,
    /// When the last change was applied.
    pub last_decision_at: Option<EpochMillis>,
    /// Replica count written by the last applied change.
    pub current_replicas: Option<u32>,
    /// Clamped demand at the last applied change.
    pub desired_replicas: Option<u32>,
    /// Bumped on every successful write; `0` for a record never stored.
    pub version: u64,
    /// Unix timestamp (milliseconds) of the last write.
    pub updated_at: EpochMillis,
}

impl ScaleRecord {
    /// An unsaved record for a workload that has never scaled.
    pub fn new(workload: WorkloadKey) -> Self {
        Self {
            workload,
            last_decision_at: None,
            current_replicas: None,
            desired_replicas: None,
            version: 0,
            updated_at: 0,
        }
    }

    pub fn table_key(&self) -> String {
        self.workload.table_key()
    }

    pub fn engine_state(&self) -> EngineState {
        EngineState {
            last_decision_at: self.last_decision_at,
        }
    }

    /// Version a writer must present to replace this record.
    pub fn expected_version(&self) -> Option<u64> {
        (self.version > 0).then_some(self.version)
    }
}
