//! The gates a demand estimate passes through before it becomes a change.

use std::time::Duration;

use stepscale_core::EpochMillis;

/// Bound `v` to `[min, max]`. Callers guarantee `min <= max`.
pub fn clamp(v: u32, min: u32, max: u32) -> u32 {
    v.max(min).min(max)
}

/// Whether `desired` lies strictly outside `current * (1 ± pct/100)`.
///
/// Values exactly on the band edge are inside. Equal counts never open the
/// gate; a zero percentage opens it for any difference.
pub fn outside_hysteresis(current: u32, desired: u32, hysteresis_pct: f64) -> bool {
    if current == desired {
        return false;
    }
    let h = hysteresis_pct / 100.0;
    let low = f64::from(current) * (1.0 - h);
    let high = f64::from(current) * (1.0 + h);
    let desired = f64::from(desired);
    desired < low || desired > high
}

/// Whether a change at `now` would come too soon after the last one.
///
/// A clock reading before `last_decision_at` counts as zero elapsed.
pub fn cooldown_active(
    now: EpochMillis,
    last_decision_at: Option<EpochMillis>,
    cooldown: Duration,
) -> bool {
    match last_decision_at {
        None => false,
        Some(last) => u128::from(now.saturating_sub(last)) < cooldown.as_millis(),
    }
}

/// Move from `current` toward `desired` by at most `step_limit`.
pub fn step_toward(current: u32, desired: u32, step_limit: u32) -> u32 {
    if desired > current {
        current + (desired - current).min(step_limit)
    } else {
        current - (current - desired).min(step_limit)
    }
}
