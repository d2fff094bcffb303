use std::path::Path;

use anyhow::Context;
use tracing::info;

use stepscale_controller::{
    render_prometheus, replay, ClockSource, MemoryStateRepository, Replay,
    ResourceStatusRepository, SimulatedCycle, SystemClock, Trace,
};
use stepscale_state::StateStore;

use super::load_target;
use crate::TargetArgs;

/// Output switches for `simulate`.
pub struct SimulateOutput<'a> {
    /// Append Prometheus text for the last decision after the cycle lines.
    pub prometheus: bool,
    /// Write the resource with its updated status here.
    pub resource_out: Option<&'a Path>,
}

pub async fn simulate(
    args: &TargetArgs,
    trace_path: &Path,
    initial_replicas: u32,
    state_db: Option<&Path>,
    start_ms: Option<u64>,
    output: SimulateOutput<'_>,
) -> anyhow::Result<()> {
    let loaded = load_target(args)?;
    let content = std::fs::read_to_string(trace_path)
        .with_context(|| format!("failed to read {}", trace_path.display()))?;
    let trace = Trace::from_json(&content)?;
    let start = start_ms.unwrap_or_else(|| SystemClock.now());
    let target = loaded.target;

    if output.resource_out.is_some() && (loaded.resource.is_none() || state_db.is_some()) {
        anyhow::bail!("--resource-out needs --resource and no --state-db");
    }

    info!(
        workload = %target.key,
        steps = trace.steps.len(),
        initial_replicas,
        "replaying trace"
    );

    // State precedence: an explicit database, then the resource's own
    // status, then process memory.
    let replayed = match (state_db, loaded.resource) {
        (Some(path), _) => {
            let store = StateStore::open(path)?;
            replay(target, &trace, initial_replicas, store, start).await?
        }
        (None, Some(resource)) => {
            let repo = std::sync::Arc::new(ResourceStatusRepository::new(resource));
            let replayed = replay(target, &trace, initial_replicas, repo.clone(), start).await?;
            let resource = repo.resource()?;
            info!(
                last_scale_time = ?resource.status.last_scale_time,
                current_replicas = ?resource.status.current_replicas,
                desired_replicas = ?resource.status.desired_replicas,
                "final resource status"
            );
            if let Some(path) = output.resource_out {
                std::fs::write(path, resource.to_json_pretty()? + "\n")
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            replayed
        }
        (None, None) => {
            replay(target, &trace, initial_replicas, MemoryStateRepository::new(), start).await?
        }
    };

    print_cycles(&replayed.cycles)?;
    if output.prometheus {
        print!("{}", exposition_text(&replayed));
    }
    Ok(())
}

fn print_cycles(cycles: &[SimulatedCycle]) -> anyhow::Result<()> {
    for cycle in cycles {
        println!("{}", serde_json::to_string(cycle)?);
    }
    Ok(())
}

fn exposition_text(replayed: &Replay) -> String {
    let records: Vec<_> = replayed.last_decision.iter().cloned().collect();
    render_prometheus(&records)
}
