//! Static target configuration: `policy.toml` and environment variables.
//!
//! ```toml
//! [target]
//! namespace = "default"
//! deployment = "nginx-sample-deployment"
//! selector = "app=nginx"
//! metrics_window = "2m"
//!
//! [policy]
//! min_replicas = 2
//! max_replicas = 50
//! target_cpu_cores = 0.2
//! target_mem_mib = 300.0
//! hysteresis_pct = 10.0
//! step_limit = 5
//! cooldown = "60s"
//! poll_interval = "15s"
//! ```
//!
//! Every key is optional and falls back to the default shown. Unknown keys
//! are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::policy::{duration_field, PolicySettings};
use crate::target::ScaleTarget;
use crate::types::WorkloadKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct StaticConfig {
    pub target: TargetSection,
    pub policy: PolicySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    pub namespace: String,
    pub deployment: String,
    pub selector: String,
    pub metrics_window: String,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            deployment: "nginx-sample-deployment".to_string(),
            selector: "app=nginx".to_string(),
            metrics_window: "2m".to_string(),
        }
    }
}

impl StaticConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `TARGET_*`/policy variables from `lookup` on top of `self`.
    ///
    /// Empty values are treated as unset. Values that fail to parse are errors.
    pub fn with_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TARGET_NAMESPACE") {
            self.target.namespace = v;
        }
        if let Some(v) = get("TARGET_DEPLOYMENT") {
            self.target.deployment = v;
        }
        if let Some(v) = get("POD_SELECTOR") {
            self.target.selector = v;
        }
        if let Some(v) = get("METRICS_WINDOW") {
            self.target.metrics_window = v;
        }
        if let Some(v) = get("POLL_INTERVAL") {
            self.policy.poll_interval = v;
        }
        if let Some(v) = get("COOLDOWN") {
            self.policy.cooldown = v;
        }
        if let Some(v) = get("MIN_REPLICAS") {
            self.policy.min_replicas = parse_env("MIN_REPLICAS", &v)?;
        }
        if let Some(v) = get("MAX_REPLICAS") {
            self.policy.max_replicas = parse_env("MAX_REPLICAS", &v)?;
        }
        if let Some(v) = get("TARGET_CPU_CORES") {
            self.policy.target_cpu_cores = parse_env("TARGET_CPU_CORES", &v)?;
        }
        if let Some(v) = get("TARGET_MEM_MIB") {
            self.policy.target_mem_mib = parse_env("TARGET_MEM_MIB", &v)?;
        }
        if let Some(v) = get("HYSTERESIS_PCT") {
            self.policy.hysteresis_pct = parse_env("HYSTERESIS_PCT", &v)?;
        }
        if let Some(v) = get("SCALE_STEP_LIMIT") {
            self.policy.step_limit = parse_env("SCALE_STEP_LIMIT", &v)?;
        }
        Ok(self)
    }

    /// Validate and resolve into a reconcile target.
    pub fn resolve(&self) -> ConfigResult<ScaleTarget> {
        if self.target.deployment.trim().is_empty() {
            return Err(ConfigError::MissingTarget);
        }
        Ok(ScaleTarget {
            key: WorkloadKey::new(&self.target.namespace, &self.target.deployment),
            selector: self.target.selector.clone(),
            metrics_window: duration_field("metrics_window", &self.target.metrics_window)?,
            policy: self.policy.validate()?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
