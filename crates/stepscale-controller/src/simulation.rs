//! Trace replay.
//!
//! A trace is a JSON array of timed observations:
//!
//! ```json
//! [
//!   { "at": "0s",  "cpu_cores": 1.99, "mem_bytes": 0 },
//!   { "at": "15s", "unavailable": true },
//!   { "at": "90s", "cpu_cores": 0.1, "set_replicas": 12 }
//! ]
//! ```
//!
//! Each step moves a manual clock to `start + at`, publishes the usage (or
//! withdraws it), optionally overrides the replica count as an outside
//! actor would, and runs one reconcile cycle.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stepscale_core::{parse_duration, EpochMillis, ResourceUsage, ScaleTarget};

use crate::clock::ManualClock;
use crate::collaborators::StateRepository;
use crate::error::ReconcileError;
use crate::memory::{MemoryMetrics, MemoryWorkloads};
use crate::reconciler::{CycleReport, DecisionRecord, Reconciler};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("step {index}: invalid offset {value:?}")]
    InvalidOffset { index: usize, value: String },

    #[error("step {index}: offset {value:?} is earlier than the previous step")]
    NonMonotonic { index: usize, value: String },

    #[error("invalid trace: {0}")]
    Json(#[from] serde_json::Error),

    #[error("step {index}: {source}")]
    Reconcile {
        index: usize,
        #[source]
        source: ReconcileError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceStep {
    /// Offset from the start of the replay, e.g. `"90s"` or `"1m30s"`.
    pub at: String,
    #[serde(default)]
    pub cpu_cores: f64,
    #[serde(default)]
    pub mem_bytes: f64,
    /// No metrics this step.
    #[serde(default)]
    pub unavailable: bool,
    /// Replica count forced onto the workload before the cycle runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_replicas: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn from_json(content: &str) -> Result<Self, SimulationError> {
        Ok(serde_json::from_str(content)?)
    }
}

/// One replayed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedCycle {
    pub at_ms: EpochMillis,
    /// Replica count after the cycle.
    pub replicas: u32,
    pub report: CycleReport,
}

/// Result of a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub cycles: Vec<SimulatedCycle>,
    /// Decision of the last cycle that reached the engine.
    pub last_decision: Option<DecisionRecord>,
}

/// Replay `trace` for `target`, starting at `initial_replicas`.
///
/// Engine state goes through `state`, so a persistent repository carries
/// cooldowns across replays.
pub async fn replay<S: StateRepository>(
    target: ScaleTarget,
    trace: &Trace,
    initial_replicas: u32,
    state: S,
    start: EpochMillis,
) -> Result<Replay, SimulationError> {
    let offsets = step_offsets(trace)?;

    let key = target.key.clone();
    let selector = target.selector.clone();
    let metrics = Arc::new(MemoryMetrics::new());
    let workloads = Arc::new(MemoryWorkloads::new());
    let clock = Arc::new(ManualClock::new(start));
    workloads.insert(key.clone(), initial_replicas).await;

    let mut reconciler = Reconciler::new(
        target,
        metrics.clone(),
        workloads.clone(),
        clock.clone(),
        state,
    );

    let mut cycles = Vec::with_capacity(trace.steps.len());
    for (index, (step, offset)) in trace.steps.iter().zip(offsets).enumerate() {
        let at_ms = start.saturating_add(millis(offset));
        clock.set(at_ms);

        if let Some(replicas) = step.set_replicas {
            workloads.insert(key.clone(), replicas).await;
        }
        if step.unavailable {
            metrics.clear(&selector).await;
        } else {
            let usage = ResourceUsage::new(step.cpu_cores, step.mem_bytes);
            metrics.set(&selector, usage).await;
        }

        let report = reconciler
            .reconcile_once()
            .await
            .map_err(|source| SimulationError::Reconcile { index, source })?;
        cycles.push(SimulatedCycle {
            at_ms,
            replicas: workloads.get(&key).await.unwrap_or(initial_replicas),
            report,
        });
    }
    Ok(Replay {
        cycles,
        last_decision: reconciler.last_decision().cloned(),
    })
}

fn step_offsets(trace: &Trace) -> Result<Vec<Duration>, SimulationError> {
    let mut offsets: Vec<Duration> = Vec::with_capacity(trace.steps.len());
    for (index, step) in trace.steps.iter().enumerate() {
        let offset = parse_duration(&step.at).ok_or_else(|| SimulationError::InvalidOffset {
            index,
            value: step.at.clone(),
        })?;
        if offsets.last().is_some_and(|prev| offset < *prev) {
            return Err(SimulationError::NonMonotonic {
                index,
                value: step.at.clone(),
            });
        }
        offsets.push(offset);
    }
    Ok(offsets)
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepscale_core::{DecisionReason, PolicySettings, WorkloadKey};

    use crate::memory::MemoryStateRepository;
    use crate::reconciler::SkipReason;

    const START: EpochMillis = 1_767_225_600_000;

    fn target() -> ScaleTarget {
        ScaleTarget {
            key: WorkloadKey::new("default", "web"),
            selector: "web-".to_string(),
            metrics_window: Duration::from_secs(120),
            policy: PolicySettings::default().validate().unwrap(),
        }
    }

    #[tokio::test]
    async fn replays_ramp_with_gap() {
        let trace = Trace::from_json(
            r#"[
                { "at": "0s", "cpu_cores": 1.99 },
                { "at": "15s", "unavailable": true },
                { "at": "30s", "cpu_cores": 1.99 },
                { "at": "60s", "cpu_cores": 1.99 }
            ]"#,
        )
        .unwrap();

        let cycles = replay(target(), &trace, 2, MemoryStateRepository::new(), START)
            .await
            .unwrap()
            .cycles;

        let replicas: Vec<u32> = cycles.iter().map(|c| c.replicas).collect();
        assert_eq!(replicas, vec![7, 7, 7, 10]);
        assert_eq!(
            cycles[1].report.skip_reason(),
            Some(SkipReason::MetricsUnavailable)
        );
        assert_eq!(
            cycles[2].report.outcome().unwrap().reason,
            DecisionReason::CooldownActive
        );
        assert_eq!(cycles[3].at_ms, START + 60_000);
    }

    #[tokio::test]
    async fn outside_change_is_corrected() {
        let trace = Trace::from_json(
            r#"[
                { "at": "0s", "cpu_cores": 0.5, "set_replicas": 80 }
            ]"#,
        )
        .unwrap();
        let cycles = replay(target(), &trace, 3, MemoryStateRepository::new(), START)
            .await
            .unwrap()
            .cycles;
        // 80 is above max; the bound wins over the step limit.
        assert_eq!(cycles[0].replicas, 50);
        assert_eq!(
            cycles[0].report.outcome().unwrap().reason,
            DecisionReason::Applied
        );
    }

    #[tokio::test]
    async fn last_decision_feeds_exposition() {
        let trace = Trace::from_json(
            r#"[
                { "at": "0s", "cpu_cores": 1.99 },
                { "at": "15s", "unavailable": true }
            ]"#,
        )
        .unwrap();
        let replayed = replay(target(), &trace, 2, MemoryStateRepository::new(), START)
            .await
            .unwrap();

        // The skipped second step leaves the first decision in place.
        let last = replayed.last_decision.expect("a decision was made");
        assert_eq!(last.outcome.final_replicas, 7);
        assert_eq!(last.evaluated_at, START);

        let output = crate::exposition::render_prometheus(&[last]);
        assert!(output.contains("stepscale_final_replicas{workload=\"default/web\"} 7\n"));
        assert!(output.contains(
            "stepscale_decision{workload=\"default/web\",reason=\"applied\"} 1\n"
        ));
    }

    #[tokio::test]
    async fn all_skipped_has_no_decision() {
        let trace = Trace::from_json(r#"[{ "at": "0s", "unavailable": true }]"#).unwrap();
        let replayed = replay(target(), &trace, 2, MemoryStateRepository::new(), START)
            .await
            .unwrap();
        assert_eq!(replayed.cycles.len(), 1);
        assert!(replayed.last_decision.is_none());
    }

    #[test]
    fn rejects_bad_offsets() {
        let trace = Trace::from_json(r#"[{ "at": "soon" }]"#).unwrap();
        assert!(matches!(
            step_offsets(&trace),
            Err(SimulationError::InvalidOffset { index: 0, .. })
        ));

        let trace = Trace::from_json(r#"[{ "at": "30s" }, { "at": "10s" }]"#).unwrap();
        assert!(matches!(
            step_offsets(&trace),
            Err(SimulationError::NonMonotonic { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(Trace::from_json(r#"[{ "at": "0s", "cpu": 1 }]"#).is_err());
    }
}
