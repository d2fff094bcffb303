//! Keeps engine state in a custom resource's status block.
//!
//! The resource variant of the controller has no database: the last scale
//! time lives in `status.lastScaleTime`. This adapter exposes that block as
//! a `StateRepository` so the same reconciler drives both variants.

use std::sync::Mutex;

use tracing::debug;

use stepscale_core::resource::format_timestamp;
use stepscale_core::{AutoscalerResource, WorkloadKey};
use stepscale_state::{ScaleRecord, StateError};

use crate::collaborators::StateRepository;

struct Slot {
    resource: AutoscalerResource,
    /// Bumped on every status write; `0` until the first one.
    generation: u64,
}

/// A `StateRepository` over one `AutoscalerResource`.
pub struct ResourceStatusRepository {
    slot: Mutex<Slot>,
}

impl ResourceStatusRepository {
    pub fn new(resource: AutoscalerResource) -> Self {
        // A resource that already carries a status was written before.
        let generation = u64::from(resource.status.last_scale_time.is_some());
        Self {
            slot: Mutex::new(Slot {
                resource,
                generation,
            }),
        }
    }

    /// Snapshot of the resource, status included.
    pub fn resource(&self) -> Result<AutoscalerResource, StateError> {
        Ok(self.lock()?.resource.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Slot>, StateError> {
        self.slot
            .lock()
            .map_err(|e| StateError::Storage(e.to_string()))
    }
}

impl StateRepository for ResourceStatusRepository {
    fn load(&self, key: &WorkloadKey) -> Result<ScaleRecord, StateError> {
        let slot = self.lock()?;
        let status = &slot.resource.status;
        Ok(ScaleRecord {
            last_decision_at: slot.resource.engine_state().last_decision_at,
            current_replicas: status.current_replicas,
            desired_replicas: status.desired_replicas,
            version: slot.generation,
            ..ScaleRecord::new(key.clone())
        })
    }

    fn commit(
        &self,
        record: &ScaleRecord,
        expected: Option<u64>,
    ) -> Result<ScaleRecord, StateError> {
        let mut slot = self.lock()?;
        let found = (slot.generation > 0).then_some(slot.generation);
        if found != expected {
            return Err(StateError::Conflict {
                key: slot.resource.resource_key().table_key(),
                expected,
                found,
            });
        }

        let status = &mut slot.resource.status;
        status.last_scale_time = record.last_decision_at.and_then(format_timestamp);
        status.current_replicas = record.current_replicas;
        status.desired_replicas = record.desired_replicas;
        slot.generation = expected.unwrap_or(0) + 1;

        debug!(
            resource = %slot.resource.resource_key(),
            last_scale_time = ?slot.resource.status.last_scale_time,
            "status updated"
        );
        Ok(ScaleRecord {
            version: slot.generation,
            ..record.clone()
        })
    }
}
