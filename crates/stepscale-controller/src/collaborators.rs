//! Contracts for everything the reconciler does not own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use stepscale_core::{EpochMillis, ResourceUsage, WorkloadKey};
use stepscale_state::{ScaleRecord, StateError, StateStore};

use crate::error::{MetricsError, StoreError};

/// Source of aggregated usage for a workload's pods.
pub trait MetricsProvider: Send + Sync {
    /// Usage summed across every pod matching `selector` over the trailing
    /// `window`.
    fn aggregate(
        &self,
        selector: &str,
        window: Duration,
    ) -> impl Future<Output = Result<ResourceUsage, MetricsError>> + Send;
}

/// The orchestrator's view of the workload's replica count.
pub trait WorkloadStore: Send + Sync {
    fn get_replicas(
        &self,
        key: &WorkloadKey,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;

    fn set_replicas(
        &self,
        key: &WorkloadKey,
        replicas: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Injected wall clock.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> EpochMillis;
}

/// Durable home of a workload's `ScaleRecord`.
pub trait StateRepository: Send + Sync {
    /// The stored record, or a fresh `version == 0` record if none exists.
    fn load(&self, key: &WorkloadKey) -> Result<ScaleRecord, StateError>;

    /// Replace the record if its stored version is still `expected`.
    fn commit(&self, record: &ScaleRecord, expected: Option<u64>)
        -> Result<ScaleRecord, StateError>;
}

impl StateRepository for StateStore {
    fn load(&self, key: &WorkloadKey) -> Result<ScaleRecord, StateError> {
        Ok(self
            .get_record(&key.table_key())?
            .unwrap_or_else(|| ScaleRecord::new(key.clone())))
    }

    fn commit(
        &self,
        record: &ScaleRecord,
        expected: Option<u64>,
    ) -> Result<ScaleRecord, StateError> {
        self.compare_and_swap(record, expected)
    }
}

// Shared handles, so callers can keep a reference to collaborators they
// hand to a reconciler.

impl<T: MetricsProvider> MetricsProvider for Arc<T> {
    fn aggregate(
        &self,
        selector: &str,
        window: Duration,
    ) -> impl Future<Output = Result<ResourceUsage, MetricsError>> + Send {
        (**self).aggregate(selector, window)
    }
}

impl<T: WorkloadStore> WorkloadStore for Arc<T> {
    fn get_replicas(
        &self,
        key: &WorkloadKey,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send {
        (**self).get_replicas(key)
    }

    fn set_replicas(
        &self,
        key: &WorkloadKey,
        replicas: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).set_replicas(key, replicas)
    }
}

impl<T: ClockSource + ?Sized> ClockSource for Arc<T> {
    fn now(&self) -> EpochMillis {
        (**self).now()
    }
}

impl<T: StateRepository + ?Sized> StateRepository for Arc<T> {
    fn load(&self, key: &WorkloadKey) -> Result<ScaleRecord, StateError> {
        (**self).load(key)
    }

    fn commit(
        &self,
        record: &ScaleRecord,
        expected: Option<u64>,
    ) -> Result<ScaleRecord, StateError> {
        (**self).commit(record, expected)
    }
}
