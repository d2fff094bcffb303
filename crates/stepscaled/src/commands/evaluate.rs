use serde_json::json;

use stepscale_controller::{ClockSource, SystemClock};
use stepscale_core::{EngineState, EpochMillis, ObservationSample, ScaleTarget};

use super::load_target;
use crate::TargetArgs;

pub fn evaluate(
    args: &TargetArgs,
    current: u32,
    cpu_cores: f64,
    mem_bytes: f64,
    last_change_ms: Option<u64>,
    now_ms: Option<u64>,
) -> anyhow::Result<()> {
    let loaded = load_target(args)?;
    // A resource's own status supplies the cooldown unless overridden.
    let state = match (last_change_ms, &loaded.resource) {
        (Some(at), _) => EngineState::scaled_at(at),
        (None, Some(resource)) => resource.engine_state(),
        (None, None) => EngineState::never_scaled(),
    };
    let now = now_ms.unwrap_or_else(|| SystemClock.now());
    let sample = ObservationSample::new(cpu_cores, mem_bytes, now);

    let result = evaluate_once(&loaded.target, current, &sample, &state, now);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn evaluate_once(
    target: &ScaleTarget,
    current: u32,
    sample: &ObservationSample,
    state: &EngineState,
    now: EpochMillis,
) -> serde_json::Value {
    let (outcome, next) = stepscale_engine::evaluate(current, sample, &target.policy, state, now);
    let estimate = stepscale_engine::estimate_demand(&sample.usage, &target.policy);
    json!({
        "workload": target.key.to_string(),
        "outcome": outcome,
        "estimate": estimate,
        "state": next,
    })
}
