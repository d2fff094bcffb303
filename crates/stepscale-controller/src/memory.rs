//! In-memory collaborators.
//!
//! Used by the trace replay and by tests. `MemoryMetrics` keeps the latest
//! usage per selector the way a scrape cache would; `MemoryWorkloads`
//! stands in for the orchestrator's object store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use stepscale_core::{ResourceUsage, WorkloadKey};
use stepscale_engine::{ObservationAggregator, PodUsage};
use stepscale_state::{ScaleRecord, StateError};

use crate::collaborators::{MetricsProvider, StateRepository, WorkloadStore};
use crate::error::{MetricsError, StoreError};

// ── Metrics ───────────────────────────────────────────────────────

/// Latest usage per selector. A selector with no entry is unavailable.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    usage: RwLock<HashMap<String, ResourceUsage>>,
    /// Artificial query latency, for exercising timeouts.
    latency: Mutex<Option<Duration>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish pre-summed usage for a selector.
    pub async fn set(&self, selector: &str, usage: ResourceUsage) {
        self.usage.write().await.insert(selector.to_string(), usage);
    }

    /// Publish per-pod usage; it is summed before being stored.
    pub async fn set_pods(&self, selector: &str, pods: &[PodUsage]) {
        let agg: ObservationAggregator = pods.iter().collect();
        debug!(selector, pods = agg.pod_count(), "pod usage aggregated");
        self.set(selector, agg.totals()).await;
    }

    /// Drop the selector's data so queries report `Unavailable`.
    pub async fn clear(&self, selector: &str) {
        self.usage.write().await.remove(selector);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut slot) = self.latency.lock() {
            *slot = latency;
        }
    }

    fn latency(&self) -> Option<Duration> {
        self.latency.lock().ok().and_then(|slot| *slot)
    }
}

impl MetricsProvider for MemoryMetrics {
    async fn aggregate(
        &self,
        selector: &str,
        _window: Duration,
    ) -> Result<ResourceUsage, MetricsError> {
        if let Some(latency) = self.latency() {
            tokio::time::sleep(latency).await;
        }
        self.usage
            .read()
            .await
            .get(selector)
            .copied()
            .ok_or_else(|| MetricsError::Unavailable(selector.to_string()))
    }
}

// ── Workloads ─────────────────────────────────────────────────────

/// Replica counts keyed by workload.
#[derive(Debug, Default)]
pub struct MemoryWorkloads {
    replicas: RwLock<HashMap<WorkloadKey, u32>>,
    /// Reject the next `set_replicas` with a conflict.
    conflict_next: AtomicBool,
    writes: AtomicU64,
}

impl MemoryWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: WorkloadKey, replicas: u32) {
        self.replicas.write().await.insert(key, replicas);
    }

    pub async fn get(&self, key: &WorkloadKey) -> Option<u32> {
        self.replicas.read().await.get(key).copied()
    }

    pub fn fail_next_update(&self) {
        self.conflict_next.store(true, Ordering::SeqCst);
    }

    /// Successful `set_replicas` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl WorkloadStore for MemoryWorkloads {
    async fn get_replicas(&self, key: &WorkloadKey) -> Result<u32, StoreError> {
        self.get(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn set_replicas(&self, key: &WorkloadKey, replicas: u32) -> Result<(), StoreError> {
        if self.conflict_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Conflict(key.to_string()));
        }
        let mut map = self.replicas.write().await;
        match map.get_mut(key) {
            Some(slot) => {
                *slot = replicas;
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}

// ── State ─────────────────────────────────────────────────────────

/// Scale records held in process memory; lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStateRepository {
    records: Mutex<HashMap<String, ScaleRecord>>,
}

impl MemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateRepository for MemoryStateRepository {
    fn load(&self, key: &WorkloadKey) -> Result<ScaleRecord, StateError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StateError::Storage(e.to_string()))?;
        Ok(records
            .get(&key.table_key())
            .cloned()
            .unwrap_or_else(|| ScaleRecord::new(key.clone())))
    }

    fn commit(
        &self,
        record: &ScaleRecord,
        expected: Option<u64>,
    ) -> Result<ScaleRecord, StateError> {
        let key = record.table_key();
        let mut records = self
            .records
            .lock()
            .map_err(|e| StateError::Storage(e.to_string()))?;
        let found = records.get(&key).map(|r| r.version);
        if found != expected {
            return Err(StateError::Conflict {
                key,
                expected,
                found,
            });
        }
        let stored = ScaleRecord {
            version: expected.unwrap_or(0) + 1,
            ..record.clone()
        };
        records.insert(key, stored.clone());
        Ok(stored)
    }
}
