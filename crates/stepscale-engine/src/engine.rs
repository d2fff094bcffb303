//! Decision engine: one evaluation from observation to outcome.
//!
//! Runs Estimate → ClampRaw → CheckHysteresis → CheckCooldown → Step →
//! ClampFinal → Emit, stopping at the first gate that holds. Only an
//! emitted change produces a new `EngineState`.

use tracing::{debug, info};

use stepscale_core::{
    DecisionOutcome, DecisionReason, EngineState, EpochMillis, ObservationSample, PolicyConfig,
};

use crate::estimate::estimate_demand;
use crate::gates::{clamp, cooldown_active, outside_hysteresis, step_toward};

/// Evaluate one observation for a workload currently at `current` replicas.
///
/// Deterministic: the same inputs always produce the same outcome and state.
pub fn evaluate(
    current: u32,
    observation: &ObservationSample,
    policy: &PolicyConfig,
    state: &EngineState,
    now: EpochMillis,
) -> (DecisionOutcome, EngineState) {
    let (min, max) = (policy.min_replicas(), policy.max_replicas());

    let estimate = estimate_demand(&observation.usage, policy);
    let desired = estimate.replicas;
    let target = clamp(desired, min, max);

    let held = if target == current {
        Some(DecisionReason::NoOp)
    } else if !outside_hysteresis(current, target, policy.hysteresis_percent()) {
        Some(DecisionReason::WithinHysteresis)
    } else if cooldown_active(now, state.last_decision_at, policy.cooldown()) {
        Some(DecisionReason::CooldownActive)
    } else {
        None
    };

    let (final_replicas, reason) = match held {
        // A held decision keeps the current count, unless that count is
        // itself outside the policy bounds.
        Some(reason) => {
            let corrected = clamp(current, min, max);
            if corrected == current {
                (current, reason)
            } else {
                (corrected, DecisionReason::BoundsCorrection)
            }
        }
        None => {
            let stepped = step_toward(current, target, policy.step_limit());
            (clamp(stepped, min, max), DecisionReason::Applied)
        }
    };

    let changed = final_replicas != current;
    let next_state = if changed {
        state.record_change(now)
    } else {
        *state
    };

    let outcome = DecisionOutcome {
        current_replicas: current,
        desired_replicas: desired,
        target_replicas: target,
        final_replicas,
        changed,
        reason,
    };

    if reason == DecisionReason::BoundsCorrection {
        info!(
            current,
            final_replicas,
            min,
            max,
            held_by = ?held,
            "current replicas outside policy bounds; correcting"
        );
    }
    debug!(
        current,
        desired,
        target,
        final_replicas,
        reason = %reason,
        bound_by = ?estimate.bound_by,
        cpu_cores = format!("{:.3}", observation.cpu_cores()),
        mem_mib = format!("{:.1}", observation.usage.mem_mib()),
        "evaluated"
    );

    (outcome, next_state)
}
