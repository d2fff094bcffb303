//! stepscale-core: shared types for the stepscale replica controller.
//!
//! Holds the value types that flow through a decision cycle
//! (`ObservationSample`, `EngineState`, `DecisionOutcome`), the validated
//! `PolicyConfig`, and the two configuration adapters that produce a
//! `ScaleTarget`:
//!
//! ```text
//! policy.toml / env vars ──► StaticConfig ─────────┐
//!                                                   ├──► ScaleTarget { key, selector, policy }
//! autoscaler resource (JSON) ──► AutoscalerResource ┘
//! ```
//!
//! Nothing downstream of this crate ever sees unvalidated policy input.

pub mod config;
pub mod duration;
pub mod error;
pub mod policy;
pub mod resource;
pub mod target;
pub mod types;

pub use config::StaticConfig;
pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use policy::{PolicyConfig, PolicySettings};
pub use resource::{AutoscalerResource, AutoscalerSpec, AutoscalerStatus};
pub use target::ScaleTarget;
pub use types::*;
