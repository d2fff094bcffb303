use stepscale_core::config::TargetSection;
use stepscale_core::{format_duration, ScaleTarget, StaticConfig};

use super::load_target;
use crate::TargetArgs;

pub fn check(args: &TargetArgs) -> anyhow::Result<()> {
    let loaded = load_target(args)?;
    if let Some(resource) = &loaded.resource {
        eprintln!("✓ {} is valid", resource.resource_key());
    }
    print!("{}", effective_config(&loaded.target)?);
    Ok(())
}

/// The validated target rendered back as a `policy.toml`.
pub fn effective_config(target: &ScaleTarget) -> anyhow::Result<String> {
    let config = StaticConfig {
        target: TargetSection {
            namespace: target.key.namespace.clone(),
            deployment: target.key.name.clone(),
            selector: target.selector.clone(),
            metrics_window: format_duration(target.metrics_window),
        },
        policy: target.policy.to_settings(),
    };
    Ok(config.to_toml_string()?)
}
