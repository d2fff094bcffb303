//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A policy or target that cannot be turned into a decision.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min_replicas ({min}) exceeds max_replicas ({max})")]
    ReplicaBounds { min: u32, max: u32 },

    #[error("{field} must be a finite number greater than zero, got {value}")]
    NonPositiveTarget { field: &'static str, value: f64 },

    #[error("hysteresis_pct must be a finite, non-negative percentage, got {0}")]
    Hysteresis(f64),

    #[error("step_limit must be at least 1")]
    StepLimit,

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("target deployment name must not be empty")]
    MissingTarget,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse policy file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to render policy file: {0}")]
    TomlRender(#[from] toml::ser::Error),

    #[error("failed to parse autoscaler resource: {0}")]
    Json(#[from] serde_json::Error),
}
