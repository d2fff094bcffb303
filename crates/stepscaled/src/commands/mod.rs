pub mod check;
pub mod evaluate;
pub mod simulate;
pub mod state;

use anyhow::Context;

use stepscale_core::{AutoscalerResource, ScaleTarget, StaticConfig};

use crate::TargetArgs;

/// A resolved target, plus the resource it came from if any.
pub struct LoadedTarget {
    pub target: ScaleTarget,
    pub resource: Option<AutoscalerResource>,
}

pub fn load_target(args: &TargetArgs) -> anyhow::Result<LoadedTarget> {
    if let Some(path) = &args.resource {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let resource = AutoscalerResource::from_json(&content)
            .with_context(|| format!("invalid resource {}", path.display()))?;
        let target = resource.to_target()?;
        return Ok(LoadedTarget {
            target,
            resource: Some(resource),
        });
    }

    let config = match &args.config {
        Some(path) => StaticConfig::from_file(path)?,
        None => StaticConfig::from_env()?,
    };
    Ok(LoadedTarget {
        target: config.resolve()?,
        resource: None,
    })
}
