//! stepscale-engine: replica-count decisions for one workload.
//!
//! Pure computation: no I/O, no clock reads, no shared state. The caller
//! supplies the current replica count, one observation, the policy, the
//! prior `EngineState` and the evaluation time, and gets back an outcome
//! plus the next state.
//!
//! # Decision Algorithm
//!
//! ```text
//! cpu_replicas = ceil(total_cpu_cores / target_cpu_per_replica)
//! mem_replicas = ceil(total_mem_bytes / target_mem_per_replica_bytes)
//! desired      = max(cpu_replicas, mem_replicas)
//! target       = clamp(desired, min, max)
//!
//! if target == current:                       no-op
//! if target within current * (1 ± h%):        within-hysteresis
//! if now - last_decision_at < cooldown:       cooldown-active
//! final = clamp(current ± min(|target - current|, step_limit), min, max)
//!                                             applied
//! ```
//!
//! A current count outside `[min, max]` (manual edits) is always pulled
//! back into range and reported as `bounds-correction`.

pub mod aggregate;
pub mod engine;
pub mod estimate;
pub mod gates;

pub use aggregate::{ObservationAggregator, PodUsage};
pub use engine::evaluate;
pub use estimate::{estimate_demand, DemandDimension, DemandEstimate};
pub use gates::{clamp, cooldown_active, outside_hysteresis, step_toward};
