//! Reconciler: one workload, one sequential evaluation stream.
//!
//! Each cycle reads the current replica count and aggregated usage, runs
//! the engine, and on a change claims the decision in the state repository
//! before writing replicas. If the write fails the claim is released so the
//! next cycle re-derives and re-applies.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use stepscale_core::{
    DecisionOutcome, DecisionReason, EpochMillis, ObservationSample, ResourceUsage, ScaleTarget,
    WorkloadKey,
};
use stepscale_engine::evaluate;
use stepscale_state::ScaleRecord;

use crate::collaborators::{ClockSource, MetricsProvider, StateRepository, WorkloadStore};
use crate::error::{ReconcileError, StoreError};

/// Upper bound on any single collaborator call.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a cycle ended without evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    WorkloadNotFound,
    WorkloadTimeout,
    MetricsUnavailable,
    MetricsTimeout,
    /// Another writer committed state for this workload first.
    StateConflict,
}

/// Result of one reconcile cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CycleReport {
    Skipped { reason: SkipReason },
    Decided(DecisionOutcome),
}

impl CycleReport {
    pub fn outcome(&self) -> Option<&DecisionOutcome> {
        match self {
            CycleReport::Decided(outcome) => Some(outcome),
            CycleReport::Skipped { .. } => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            CycleReport::Skipped { reason } => Some(*reason),
            CycleReport::Decided(_) => None,
        }
    }
}

/// The latest evaluated cycle, kept for exposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub workload: WorkloadKey,
    pub outcome: DecisionOutcome,
    pub usage: ResourceUsage,
    pub evaluated_at: EpochMillis,
}

pub struct Reconciler<M, W, C, S> {
    target: ScaleTarget,
    metrics: M,
    workloads: W,
    clock: C,
    state: S,
    io_timeout: Duration,
    last: Option<DecisionRecord>,
}

impl<M, W, C, S> Reconciler<M, W, C, S>
where
    M: MetricsProvider,
    W: WorkloadStore,
    C: ClockSource,
    S: StateRepository,
{
    pub fn new(target: ScaleTarget, metrics: M, workloads: W, clock: C, state: S) -> Self {
        Self {
            target,
            metrics,
            workloads,
            clock,
            state,
            io_timeout: DEFAULT_IO_TIMEOUT,
            last: None,
        }
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn target(&self) -> &ScaleTarget {
        &self.target
    }

    /// The most recent cycle that reached the engine.
    pub fn last_decision(&self) -> Option<&DecisionRecord> {
        self.last.as_ref()
    }

    /// Run a single cycle.
    ///
    /// Missing workloads and missing metrics are skips, not errors. Errors
    /// are reserved for failed replica writes and state storage faults.
    pub async fn reconcile_once(&mut self) -> Result<CycleReport, ReconcileError> {
        let key = self.target.key.clone();

        let current = match timeout(self.io_timeout, self.workloads.get_replicas(&key)).await {
            Ok(Ok(current)) => current,
            Ok(Err(StoreError::NotFound(_))) => {
                warn!(workload = %key, "target deployment not found; skipping");
                return Ok(skipped(SkipReason::WorkloadNotFound));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(workload = %key, timeout = ?self.io_timeout, "replica read timed out; skipping");
                return Ok(skipped(SkipReason::WorkloadTimeout));
            }
        };

        let query = self
            .metrics
            .aggregate(&self.target.selector, self.target.metrics_window);
        let usage = match timeout(self.io_timeout, query).await {
            Ok(Ok(usage)) => usage,
            Ok(Err(e)) => {
                warn!(workload = %key, error = %e, "metrics unavailable; skipping");
                return Ok(skipped(SkipReason::MetricsUnavailable));
            }
            Err(_) => {
                warn!(workload = %key, timeout = ?self.io_timeout, "metrics query timed out; skipping");
                return Ok(skipped(SkipReason::MetricsTimeout));
            }
        };

        let now = self.clock.now();
        let record = self.state.load(&key)?;
        let sample = ObservationSample { usage, observed_at: now };
        let (outcome, next) = evaluate(
            current,
            &sample,
            &self.target.policy,
            &record.engine_state(),
            now,
        );

        match outcome.reason {
            DecisionReason::NoOp => {
                debug!(workload = %key, current, "at target; no scale");
            }
            DecisionReason::WithinHysteresis => {
                info!(
                    workload = %key,
                    current,
                    desired = outcome.target_replicas,
                    "within hysteresis; no scale"
                );
            }
            DecisionReason::CooldownActive => {
                info!(
                    workload = %key,
                    current,
                    desired = outcome.target_replicas,
                    "cooldown active; skipping"
                );
            }
            DecisionReason::Applied | DecisionReason::BoundsCorrection => {}
        }

        if outcome.changed {
            let claim = ScaleRecord {
                last_decision_at: next.last_decision_at,
                current_replicas: Some(outcome.final_replicas),
                desired_replicas: Some(outcome.target_replicas),
                updated_at: now,
                ..record.clone()
            };
            let claimed = match self.state.commit(&claim, record.expected_version()) {
                Ok(claimed) => claimed,
                Err(e) if e.is_conflict() => {
                    warn!(workload = %key, error = %e, "scale state changed concurrently; skipping");
                    return Ok(skipped(SkipReason::StateConflict));
                }
                Err(e) => return Err(e.into()),
            };

            let write = self.workloads.set_replicas(&key, outcome.final_replicas);
            let applied = match timeout(self.io_timeout, write).await {
                Ok(result) => result.map_err(ReconcileError::from),
                Err(_) => Err(ReconcileError::UpdateTimeout(key.to_string())),
            };
            if let Err(e) = applied {
                self.release(&record, &claimed, now);
                return Err(e);
            }

            info!(
                workload = %key,
                from = current,
                to = outcome.final_replicas,
                desired_raw = outcome.desired_replicas,
                reason = %outcome.reason,
                cpu_cores = format!("{:.3}", usage.cpu_cores),
                mem_mib = format!("{:.1}", usage.mem_mib()),
                "scaled"
            );
        }

        self.last = Some(DecisionRecord {
            workload: key,
            outcome,
            usage,
            evaluated_at: now,
        });
        Ok(CycleReport::Decided(outcome))
    }

    /// Put back the state read before a claim whose replica write failed.
    fn release(&self, previous: &ScaleRecord, claimed: &ScaleRecord, now: EpochMillis) {
        let restore = ScaleRecord {
            updated_at: now,
            ..previous.clone()
        };
        if let Err(e) = self.state.commit(&restore, claimed.expected_version()) {
            warn!(
                workload = %previous.workload,
                error = %e,
                "failed to release scale claim; cooldown may delay the retry"
            );
        }
    }

    /// Reconcile every `poll_interval` until `shutdown` fires.
    ///
    /// The first cycle runs immediately. A failed cycle is logged and the
    /// loop carries on.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.target.policy.poll_interval();
        info!(
            workload = %self.target.key,
            selector = %self.target.selector,
            poll_interval = ?interval,
            "reconciler started"
        );

        loop {
            if let Err(e) = self.reconcile_once().await {
                error!(workload = %self.target.key, error = %e, "reconcile cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!(workload = %self.target.key, "reconciler shutting down");
                    break;
                }
            }
        }
    }
}

fn skipped(reason: SkipReason) -> CycleReport {
    CycleReport::Skipped { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stepscale_core::PolicySettings;
    use stepscale_state::StateError;

    use crate::clock::ManualClock;
    use crate::memory::{MemoryMetrics, MemoryStateRepository, MemoryWorkloads};

    const START: EpochMillis = 1_767_225_600_000;
    const SELECTOR: &str = "web-";

    type TestReconciler = Reconciler<
        Arc<MemoryMetrics>,
        Arc<MemoryWorkloads>,
        Arc<ManualClock>,
        Arc<MemoryStateRepository>,
    >;

    struct Harness {
        metrics: Arc<MemoryMetrics>,
        workloads: Arc<MemoryWorkloads>,
        clock: Arc<ManualClock>,
        state: Arc<MemoryStateRepository>,
    }

    fn key() -> WorkloadKey {
        WorkloadKey::new("default", "web")
    }

    fn target() -> ScaleTarget {
        ScaleTarget {
            key: key(),
            selector: SELECTOR.to_string(),
            metrics_window: Duration::from_secs(120),
            policy: PolicySettings::default().validate().unwrap(),
        }
    }

    async fn harness(replicas: u32) -> (Harness, TestReconciler) {
        let h = Harness {
            metrics: Arc::new(MemoryMetrics::new()),
            workloads: Arc::new(MemoryWorkloads::new()),
            clock: Arc::new(ManualClock::new(START)),
            state: Arc::new(MemoryStateRepository::new()),
        };
        h.workloads.insert(key(), replicas).await;
        let reconciler = Reconciler::new(
            target(),
            h.metrics.clone(),
            h.workloads.clone(),
            h.clock.clone(),
            h.state.clone(),
        );
        (h, reconciler)
    }

    #[tokio::test]
    async fn ramps_up_in_steps_with_cooldown() {
        let (h, mut rec) = harness(2).await;
        // 1.99 cores at 0.2 per replica demands 10.
        h.metrics.set(SELECTOR, ResourceUsage::new(1.99, 0.0)).await;

        let report = rec.reconcile_once().await.unwrap();
        let outcome = report.outcome().unwrap();
        assert_eq!(outcome.desired_replicas, 10);
        assert_eq!(outcome.final_replicas, 7);
        assert_eq!(outcome.reason, DecisionReason::Applied);
        assert_eq!(h.workloads.get(&key()).await, Some(7));

        let stored = h.state.load(&key()).unwrap();
        assert_eq!(stored.last_decision_at, Some(START));
        assert_eq!(stored.current_replicas, Some(7));
        assert_eq!(stored.desired_replicas, Some(10));

        h.clock.advance(Duration::from_secs(15));
        let report = rec.reconcile_once().await.unwrap();
        assert_eq!(
            report.outcome().unwrap().reason,
            DecisionReason::CooldownActive
        );
        assert_eq!(h.workloads.get(&key()).await, Some(7));

        h.clock.advance(Duration::from_secs(60));
        let report = rec.reconcile_once().await.unwrap();
        assert_eq!(report.outcome().unwrap().final_replicas, 10);
        assert_eq!(h.workloads.write_count(), 2);
        assert_eq!(rec.last_decision().unwrap().outcome.final_replicas, 10);
    }

    #[tokio::test]
    async fn missing_metrics_skip_without_touching_state() {
        let (h, mut rec) = harness(4).await;

        let report = rec.reconcile_once().await.unwrap();
        assert_eq!(report.skip_reason(), Some(SkipReason::MetricsUnavailable));
        assert_eq!(h.workloads.get(&key()).await, Some(4));
        assert_eq!(h.state.load(&key()).unwrap().version, 0);
        assert!(rec.last_decision().is_none());
    }

    #[tokio::test]
    async fn zero_usage_is_evaluated() {
        let (h, mut rec) = harness(4).await;
        h.metrics.set(SELECTOR, ResourceUsage::default()).await;

        let report = rec.reconcile_once().await.unwrap();
        let outcome = report.outcome().unwrap();
        assert_eq!(outcome.target_replicas, 2);
        assert_eq!(outcome.final_replicas, 2);
    }

    #[tokio::test]
    async fn missing_workload_skips() {
        let (h, _) = harness(1).await;
        let mut rec = Reconciler::new(
            ScaleTarget {
                key: WorkloadKey::new("default", "gone"),
                ..target()
            },
            h.metrics.clone(),
            h.workloads.clone(),
            h.clock.clone(),
            h.state.clone(),
        );
        let report = rec.reconcile_once().await.unwrap();
        assert_eq!(report.skip_reason(), Some(SkipReason::WorkloadNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_metrics_time_out() {
        let (h, rec) = harness(4).await;
        let mut rec = rec.with_io_timeout(Duration::from_secs(2));
        h.metrics.set(SELECTOR, ResourceUsage::new(5.0, 0.0)).await;
        h.metrics.set_latency(Some(Duration::from_secs(30)));

        let report = rec.reconcile_once().await.unwrap();
        assert_eq!(report.skip_reason(), Some(SkipReason::MetricsTimeout));
        assert_eq!(h.workloads.write_count(), 0);
    }

    #[tokio::test]
    async fn failed_write_releases_claim() {
        let (h, mut rec) = harness(2).await;
        h.metrics.set(SELECTOR, ResourceUsage::new(1.99, 0.0)).await;
        h.workloads.fail_next_update();

        let err = rec.reconcile_once().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Workload(StoreError::Conflict(_))));
        assert_eq!(h.workloads.get(&key()).await, Some(2));
        assert_eq!(h.state.load(&key()).unwrap().last_decision_at, None);

        // Cooldown was not armed, so the retry applies straight away.
        h.clock.advance(Duration::from_secs(15));
        let report = rec.reconcile_once().await.unwrap();
        assert_eq!(report.outcome().unwrap().final_replicas, 7);
        assert_eq!(h.workloads.get(&key()).await, Some(7));
    }

    /// A repository whose every write loses a race.
    struct AlwaysStale;

    impl StateRepository for AlwaysStale {
        fn load(&self, key: &WorkloadKey) -> Result<ScaleRecord, StateError> {
            Ok(ScaleRecord::new(key.clone()))
        }

        fn commit(
            &self,
            record: &ScaleRecord,
            expected: Option<u64>,
        ) -> Result<ScaleRecord, StateError> {
            Err(StateError::Conflict {
                key: record.table_key(),
                expected,
                found: Some(9),
            })
        }
    }

    #[tokio::test]
    async fn state_conflict_skips_without_scaling() {
        let (h, _) = harness(2).await;
        h.metrics.set(SELECTOR, ResourceUsage::new(1.99, 0.0)).await;
        let mut rec = Reconciler::new(
            target(),
            h.metrics.clone(),
            h.workloads.clone(),
            h.clock.clone(),
            AlwaysStale,
        );

        let report = rec.reconcile_once().await.unwrap();
        assert_eq!(report.skip_reason(), Some(SkipReason::StateConflict));
        assert_eq!(h.workloads.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let (h, mut rec) = harness(2).await;
        h.metrics.set(SELECTOR, ResourceUsage::new(1.99, 0.0)).await;
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            rec.run(rx).await;
            rec
        });
        // Three ticks at 0s, 15s and 30s; the manual clock never moves, so
        // only the first one scales.
        tokio::time::sleep(Duration::from_secs(31)).await;
        tx.send(true).unwrap();
        let rec = task.await.unwrap();

        assert_eq!(h.workloads.write_count(), 1);
        assert_eq!(
            rec.last_decision().unwrap().outcome.reason,
            DecisionReason::CooldownActive
        );
    }

    #[test]
    fn report_serializes_with_status_tag() {
        let json = serde_json::to_value(skipped(SkipReason::MetricsTimeout)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "skipped", "reason": "metrics-timeout" })
        );
    }
}
