//! Value types shared across stepscale crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unix timestamp in milliseconds.
pub type EpochMillis = u64;

const MIB: f64 = 1024.0 * 1024.0;

// ── Workload ──────────────────────────────────────────────────────

/// Identifies the workload being sized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `{namespace}/{name}` key. Both halves must be non-empty.
    pub fn parse(key: &str) -> Option<Self> {
        let (namespace, name) = key.split_once('/')?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(namespace, name))
    }

    /// Composite key used by the state store.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── Observation ───────────────────────────────────────────────────

/// Usage summed across every pod of a workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Total CPU in cores (rate of CPU seconds per second).
    pub cpu_cores: f64,
    /// Total resident (working set) memory in bytes.
    pub mem_bytes: f64,
}

impl ResourceUsage {
    pub fn new(cpu_cores: f64, mem_bytes: f64) -> Self {
        Self {
            cpu_cores,
            mem_bytes,
        }
    }

    pub fn mem_mib(&self) -> f64 {
        self.mem_bytes / MIB
    }
}

/// One cycle's aggregated sample, stamped when it was captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationSample {
    pub usage: ResourceUsage,
    pub observed_at: EpochMillis,
}

impl ObservationSample {
    pub fn new(cpu_cores: f64, mem_bytes: f64, observed_at: EpochMillis) -> Self {
        Self {
            usage: ResourceUsage::new(cpu_cores, mem_bytes),
            observed_at,
        }
    }

    pub fn cpu_cores(&self) -> f64 {
        self.usage.cpu_cores
    }

    pub fn mem_bytes(&self) -> f64 {
        self.usage.mem_bytes
    }
}

// ── Engine state ──────────────────────────────────────────────────

/// State carried between evaluations of one workload.
///
/// Owned by exactly one evaluation stream. `last_decision_at` only moves
/// when a change is applied and never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// When the last applied change happened; `None` if never scaled.
    pub last_decision_at: Option<EpochMillis>,
}

impl EngineState {
    pub fn never_scaled() -> Self {
        Self::default()
    }

    pub fn scaled_at(at: EpochMillis) -> Self {
        Self {
            last_decision_at: Some(at),
        }
    }

    /// State after a change applied at `now`.
    pub fn record_change(self, now: EpochMillis) -> Self {
        let at = match self.last_decision_at {
            Some(prev) => prev.max(now),
            None => now,
        };
        Self::scaled_at(at)
    }
}

// ── Decision ──────────────────────────────────────────────────────

/// Why an evaluation produced its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    /// Clamped demand equals the current count.
    NoOp,
    /// Demand differs, but not by more than the hysteresis band.
    WithinHysteresis,
    /// A change is warranted but the last one was too recent.
    CooldownActive,
    /// A change was emitted.
    Applied,
    /// The current count sat outside `[min, max]` and was pulled back in.
    BoundsCorrection,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::NoOp => "no-op",
            DecisionReason::WithinHysteresis => "within-hysteresis",
            DecisionReason::CooldownActive => "cooldown-active",
            DecisionReason::Applied => "applied",
            DecisionReason::BoundsCorrection => "bounds-correction",
        }
    }

    pub const ALL: [DecisionReason; 5] = [
        DecisionReason::NoOp,
        DecisionReason::WithinHysteresis,
        DecisionReason::CooldownActive,
        DecisionReason::Applied,
        DecisionReason::BoundsCorrection,
    ];
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    /// Replica count the workload had when evaluated.
    pub current_replicas: u32,
    /// Raw demand, before clamping to the policy bounds.
    pub desired_replicas: u32,
    /// Demand after clamping; the value the engine is converging toward.
    pub target_replicas: u32,
    /// Replica count the caller should apply.
    pub final_replicas: u32,
    /// Whether `final_replicas` differs from `current_replicas`.
    pub changed: bool,
    pub reason: DecisionReason,
}
