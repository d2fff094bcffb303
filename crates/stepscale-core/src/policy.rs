//! Scaling policy: raw settings and their validated form.
//!
//! `PolicySettings` is what config documents deserialize into. The only way
//! to obtain a `PolicyConfig` is `PolicySettings::validate`, so the decision
//! engine can rely on positive targets, ordered bounds and a non-zero step.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::{format_duration, parse_duration};
use crate::error::{ConfigError, ConfigResult};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Unvalidated policy values, with the documented defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicySettings {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// CPU cores one replica is sized to sustain (0.2 = 200m).
    pub target_cpu_cores: f64,
    /// Memory budget per replica in MiB.
    pub target_mem_mib: f64,
    /// Hysteresis band as a percentage of the current count.
    pub hysteresis_pct: f64,
    /// Maximum replicas added or removed per decision.
    pub step_limit: u32,
    pub cooldown: String,
    pub poll_interval: String,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            min_replicas: 2,
            max_replicas: 50,
            target_cpu_cores: 0.2,
            target_mem_mib: 300.0,
            hysteresis_pct: 10.0,
            step_limit: 5,
            cooldown: "60s".to_string(),
            poll_interval: "15s".to_string(),
        }
    }
}

impl PolicySettings {
    /// Check every field and produce the engine's policy.
    pub fn validate(&self) -> ConfigResult<PolicyConfig> {
        if self.min_replicas > self.max_replicas {
            return Err(ConfigError::ReplicaBounds {
                min: self.min_replicas,
                max: self.max_replicas,
            });
        }
        if !is_positive(self.target_cpu_cores) {
            return Err(ConfigError::NonPositiveTarget {
                field: "target_cpu_cores",
                value: self.target_cpu_cores,
            });
        }
        // Checked after conversion: a finite MiB value can overflow to inf bytes.
        let target_mem_bytes = self.target_mem_mib * BYTES_PER_MIB;
        if !is_positive(target_mem_bytes) {
            return Err(ConfigError::NonPositiveTarget {
                field: "target_mem_mib",
                value: self.target_mem_mib,
            });
        }
        if !self.hysteresis_pct.is_finite() || self.hysteresis_pct < 0.0 {
            return Err(ConfigError::Hysteresis(self.hysteresis_pct));
        }
        if self.step_limit == 0 {
            return Err(ConfigError::StepLimit);
        }

        let cooldown = duration_field("cooldown", &self.cooldown)?;
        let poll_interval = duration_field("poll_interval", &self.poll_interval)?;
        if poll_interval.is_zero() {
            return Err(ConfigError::Duration {
                field: "poll_interval",
                value: self.poll_interval.clone(),
            });
        }

        Ok(PolicyConfig {
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            target_cpu_per_replica: self.target_cpu_cores,
            target_mem_per_replica_bytes: target_mem_bytes,
            hysteresis_percent: self.hysteresis_pct,
            cooldown,
            step_limit: self.step_limit,
            poll_interval,
        })
    }
}

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

pub(crate) fn duration_field(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::Duration {
        field,
        value: value.to_string(),
    })
}

/// A validated scaling policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    min_replicas: u32,
    max_replicas: u32,
    target_cpu_per_replica: f64,
    target_mem_per_replica_bytes: f64,
    hysteresis_percent: f64,
    cooldown: Duration,
    step_limit: u32,
    poll_interval: Duration,
}

impl PolicyConfig {
    pub fn min_replicas(&self) -> u32 {
        self.min_replicas
    }

    pub fn max_replicas(&self) -> u32 {
        self.max_replicas
    }

    pub fn target_cpu_per_replica(&self) -> f64 {
        self.target_cpu_per_replica
    }

    pub fn target_mem_per_replica_bytes(&self) -> f64 {
        self.target_mem_per_replica_bytes
    }

    pub fn hysteresis_percent(&self) -> f64 {
        self.hysteresis_percent
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn step_limit(&self) -> u32 {
        self.step_limit
    }

    /// Interval between reconcile cycles. Not read by the engine.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The settings that reproduce this policy.
    pub fn to_settings(&self) -> PolicySettings {
        PolicySettings {
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            target_cpu_cores: self.target_cpu_per_replica,
            target_mem_mib: self.target_mem_per_replica_bytes / BYTES_PER_MIB,
            hysteresis_pct: self.hysteresis_percent,
            step_limit: self.step_limit,
            cooldown: format_duration(self.cooldown),
            poll_interval: format_duration(self.poll_interval),
        }
    }
}

impl TryFrom<PolicySettings> for PolicyConfig {
    type Error = ConfigError;

    fn try_from(settings: PolicySettings) -> ConfigResult<Self> {
        settings.validate()
    }
}
