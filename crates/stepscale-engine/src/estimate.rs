//! Demand estimation: replicas implied by each resource dimension.

use serde::{Deserialize, Serialize};

use stepscale_core::{PolicyConfig, ResourceUsage};

/// The dimension that set the demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandDimension {
    Cpu,
    Memory,
}

/// Replica requirement per dimension and the binding maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandEstimate {
    pub cpu_replicas: u32,
    pub mem_replicas: u32,
    pub replicas: u32,
    pub bound_by: DemandDimension,
}

/// Size the workload for its more constrained dimension.
///
/// Ties go to CPU. Results saturate at `u32::MAX`.
pub fn estimate_demand(usage: &ResourceUsage, policy: &PolicyConfig) -> DemandEstimate {
    let cpu_replicas = replicas_for(usage.cpu_cores, policy.target_cpu_per_replica());
    let mem_replicas = replicas_for(usage.mem_bytes, policy.target_mem_per_replica_bytes());

    let (replicas, bound_by) = if mem_replicas > cpu_replicas {
        (mem_replicas, DemandDimension::Memory)
    } else {
        (cpu_replicas, DemandDimension::Cpu)
    };

    DemandEstimate {
        cpu_replicas,
        mem_replicas,
        replicas,
        bound_by,
    }
}

/// `ceil(total / per_replica)`, with negative or non-finite totals as zero.
fn replicas_for(total: f64, per_replica: f64) -> u32 {
    if !total.is_finite() || total <= 0.0 {
        return 0;
    }
    // Float-to-int `as` saturates.
    (total / per_replica).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepscale_core::PolicySettings;

    const MIB: f64 = 1024.0 * 1024.0;

    fn policy(cpu: f64, mem_mib: f64) -> PolicyConfig {
        PolicySettings {
            target_cpu_cores: cpu,
            target_mem_mib: mem_mib,
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn cpu_bound_demand() {
        // 1.0 core at 0.2 per replica, no memory.
        let est = estimate_demand(&ResourceUsage::new(1.0, 0.0), &policy(0.2, 300.0));
        assert_eq!(est.cpu_replicas, 5);
        assert_eq!(est.mem_replicas, 0);
        assert_eq!(est.replicas, 5);
        assert_eq!(est.bound_by, DemandDimension::Cpu);
    }

    #[test]
    fn memory_bound_demand_wins() {
        // CPU asks for 2 replicas, memory 3.5 → 4.
        let usage = ResourceUsage::new(0.4, 3.5 * 100.0 * MIB);
        let est = estimate_demand(&usage, &policy(0.2, 100.0));
        assert_eq!(est.cpu_replicas, 2);
        assert_eq!(est.mem_replicas, 4);
        assert_eq!(est.replicas, 4);
        assert_eq!(est.bound_by, DemandDimension::Memory);
    }

    #[test]
    fn partial_replica_rounds_up() {
        let est = estimate_demand(&ResourceUsage::new(0.21, 0.0), &policy(0.2, 300.0));
        assert_eq!(est.replicas, 2);
    }

    #[test]
    fn zero_usage_is_zero_demand() {
        let est = estimate_demand(&ResourceUsage::default(), &policy(0.2, 300.0));
        assert_eq!(est.replicas, 0);
    }

    #[test]
    fn invalid_usage_is_zero_demand() {
        let est = estimate_demand(&ResourceUsage::new(f64::NAN, -5.0), &policy(0.2, 300.0));
        assert_eq!(est.replicas, 0);
    }

    #[test]
    fn huge_usage_saturates() {
        let est = estimate_demand(&ResourceUsage::new(1e300, 0.0), &policy(0.2, 300.0));
        assert_eq!(est.replicas, u32::MAX);
    }
}
