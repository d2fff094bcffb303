//! Autoscaler custom resource: a typed view of the resource document.
//!
//! ```json
//! {
//!   "apiVersion": "autoscaler.stepscale.dev/v1alpha1",
//!   "kind": "ReplicaAutoscaler",
//!   "metadata": { "name": "web", "namespace": "shop" },
//!   "spec": { "targetDeployment": "web", "maxReplicas": 20, "cooldown": "60s" },
//!   "status": { "lastScaleTime": "2026-01-01T00:00:00Z", "currentReplicas": 4 }
//! }
//! ```
//!
//! The spec is parsed once into typed fields with documented defaults;
//! unknown spec keys are rejected. The status block carries the cooldown
//! timestamp across controller restarts.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::policy::{duration_field, PolicySettings};
use crate::target::ScaleTarget;
use crate::types::{EngineState, EpochMillis, WorkloadKey};

pub const API_VERSION: &str = "autoscaler.stepscale.dev/v1alpha1";
pub const KIND: &str = "ReplicaAutoscaler";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub spec: AutoscalerSpec,
    #[serde(default)]
    pub status: AutoscalerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoscalerSpec {
    #[serde(rename = "targetDeployment")]
    pub target_deployment: String,
    /// Pod selector; defaults to the `{targetDeployment}-` pod-name prefix.
    pub selector: Option<String>,
    #[serde(rename = "pollInterval")]
    pub poll_interval: String,
    pub cooldown: String,
    #[serde(rename = "metricsWindow")]
    pub metrics_window: String,
    #[serde(rename = "minReplicas")]
    pub min_replicas: u32,
    #[serde(rename = "maxReplicas")]
    pub max_replicas: u32,
    /// CPU cores per replica.
    #[serde(rename = "targetCPU")]
    pub target_cpu: f64,
    /// MiB per replica.
    #[serde(rename = "targetMem")]
    pub target_mem: f64,
    #[serde(rename = "hysteresisPct")]
    pub hysteresis_pct: f64,
    #[serde(rename = "stepLimit")]
    pub step_limit: u32,
    /// Metrics endpoint of the deployment's Prometheus. Accepted and kept
    /// on round-trip; metrics come from whichever provider the caller wires in.
    #[serde(rename = "promURL", skip_serializing_if = "Option::is_none")]
    pub prom_url: Option<String>,
}

impl Default for AutoscalerSpec {
    fn default() -> Self {
        Self {
            target_deployment: "nginx-sample-deployment-2".to_string(),
            selector: None,
            poll_interval: "15s".to_string(),
            cooldown: "60s".to_string(),
            metrics_window: "2m".to_string(),
            min_replicas: 2,
            max_replicas: 20,
            target_cpu: 0.2,
            target_mem: 300.0,
            hysteresis_pct: 10.0,
            step_limit: 5,
            prom_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scale_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_replicas: Option<u32>,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

impl AutoscalerSpec {
    fn policy_settings(&self) -> PolicySettings {
        PolicySettings {
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            target_cpu_cores: self.target_cpu,
            target_mem_mib: self.target_mem,
            hysteresis_pct: self.hysteresis_pct,
            step_limit: self.step_limit,
            cooldown: self.cooldown.clone(),
            poll_interval: self.poll_interval.clone(),
        }
    }
}

impl AutoscalerResource {
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_pretty(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Key of the resource itself (not of the deployment it scales).
    pub fn resource_key(&self) -> WorkloadKey {
        WorkloadKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Validate the spec and resolve the deployment it scales.
    ///
    /// The target lives in the resource's own namespace.
    pub fn to_target(&self) -> ConfigResult<ScaleTarget> {
        let spec = &self.spec;
        if spec.target_deployment.trim().is_empty() {
            return Err(ConfigError::MissingTarget);
        }
        let selector = spec
            .selector
            .clone()
            .unwrap_or_else(|| format!("{}-", spec.target_deployment));

        Ok(ScaleTarget {
            key: WorkloadKey::new(&self.metadata.namespace, &spec.target_deployment),
            selector,
            metrics_window: duration_field("metricsWindow", &spec.metrics_window)?,
            policy: spec.policy_settings().validate()?,
        })
    }

    /// Engine state recovered from `status.lastScaleTime`.
    ///
    /// A missing or unparsable timestamp means "never scaled".
    pub fn engine_state(&self) -> EngineState {
        let Some(raw) = self.status.last_scale_time.as_deref() else {
            return EngineState::never_scaled();
        };
        match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => match u64::try_from(at.timestamp_millis()) {
                Ok(ms) => EngineState::scaled_at(ms),
                Err(_) => EngineState::never_scaled(),
            },
            Err(e) => {
                warn!(
                    resource = %self.resource_key(),
                    value = raw,
                    error = %e,
                    "ignoring unparsable lastScaleTime"
                );
                EngineState::never_scaled()
            }
        }
    }

    /// Write the outcome of an applied change into the status block.
    pub fn record_scale(&mut self, at: EpochMillis, current: u32, desired: u32) {
        self.status.last_scale_time = format_timestamp(at);
        self.status.current_replicas = Some(current);
        self.status.desired_replicas = Some(desired);
    }
}

/// RFC 3339 rendering (second precision, `Z` suffix) of an epoch timestamp.
pub fn format_timestamp(at: EpochMillis) -> Option<String> {
    let millis = i64::try_from(at).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SAMPLE: &str = r#"{
        "apiVersion": "autoscaler.stepscale.dev/v1alpha1",
        "kind": "ReplicaAutoscaler",
        "metadata": { "name": "web-autoscaler", "namespace": "shop" },
        "spec": {
            "targetDeployment": "web",
            "maxReplicas": 8,
            "targetCPU": 0.5,
            "targetMem": 512,
            "cooldown": "30s"
        },
        "status": { "lastScaleTime": "2026-01-01T00:00:10Z" }
    }"#;

    #[test]
    fn parse_and_resolve_target() {
        let res = AutoscalerResource::from_json(SAMPLE).unwrap();
        let target = res.to_target().unwrap();

        assert_eq!(target.key, WorkloadKey::new("shop", "web"));
        assert_eq!(target.selector, "web-");
        assert_eq!(target.metrics_window, Duration::from_secs(120));
        assert_eq!(target.policy.max_replicas(), 8);
        assert_eq!(target.policy.min_replicas(), 2);
        assert_eq!(target.policy.target_cpu_per_replica(), 0.5);
        assert_eq!(
            target.policy.target_mem_per_replica_bytes(),
            512.0 * 1024.0 * 1024.0
        );
        assert_eq!(target.policy.cooldown(), Duration::from_secs(30));
    }

    #[test]
    fn missing_spec_uses_resource_defaults() {
        let res = AutoscalerResource::from_json(
            r#"{ "metadata": { "name": "a" } }"#,
        )
        .unwrap();
        assert_eq!(res.kind, KIND);

        let target = res.to_target().unwrap();
        assert_eq!(target.key.to_string(), "default/nginx-sample-deployment-2");
        assert_eq!(target.policy.max_replicas(), 20);
    }

    #[test]
    fn unknown_spec_keys_are_rejected() {
        let doc = r#"{ "metadata": { "name": "a" }, "spec": { "maxReplica": 3 } }"#;
        assert!(matches!(
            AutoscalerResource::from_json(doc),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn prom_url_is_accepted_and_kept() {
        let doc = r#"{
            "metadata": { "name": "a" },
            "spec": { "targetDeployment": "web", "promURL": "http://prom:9090" }
        }"#;
        let res = AutoscalerResource::from_json(doc).unwrap();
        assert_eq!(res.spec.prom_url.as_deref(), Some("http://prom:9090"));
        assert_eq!(res.to_target().unwrap().key.name, "web");

        let json = res.to_json_pretty().unwrap();
        assert!(json.contains("\"promURL\": \"http://prom:9090\""));
    }

    #[test]
    fn invalid_spec_fails_validation() {
        let doc = r#"{ "metadata": { "name": "a" }, "spec": { "stepLimit": 0 } }"#;
        let res = AutoscalerResource::from_json(doc).unwrap();
        assert!(matches!(res.to_target(), Err(ConfigError::StepLimit)));
    }

    #[test]
    fn engine_state_from_status() {
        let res = AutoscalerResource::from_json(SAMPLE).unwrap();
        let expected = 1_767_225_610_000; // 2026-01-01T00:00:10Z
        assert_eq!(res.engine_state(), EngineState::scaled_at(expected));
    }

    #[test]
    fn garbage_status_means_never_scaled() {
        let mut res = AutoscalerResource::from_json(SAMPLE).unwrap();
        res.status.last_scale_time = Some("yesterday".to_string());
        assert_eq!(res.engine_state(), EngineState::never_scaled());

        res.status.last_scale_time = None;
        assert_eq!(res.engine_state(), EngineState::never_scaled());
    }

    #[test]
    fn record_scale_round_trips_through_status() {
        let mut res = AutoscalerResource::from_json(SAMPLE).unwrap();
        res.record_scale(1_767_225_700_000, 6, 9);

        assert_eq!(
            res.status.last_scale_time.as_deref(),
            Some("2026-01-01T00:01:40Z")
        );
        assert_eq!(res.status.current_replicas, Some(6));
        assert_eq!(res.status.desired_replicas, Some(9));
        assert_eq!(res.engine_state(), EngineState::scaled_at(1_767_225_700_000));

        let rendered = res.to_json_pretty().unwrap();
        assert!(rendered.contains("\"lastScaleTime\""));
        assert!(rendered.contains("\"targetCPU\""));
    }
}
