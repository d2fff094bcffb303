//! Observation aggregation: per-pod usage summed into workload totals.
//!
//! The metrics source decides which pods belong to the workload; this
//! only sums what it is given. Zero pods is a valid observation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use stepscale_core::{EpochMillis, ObservationSample, ResourceUsage};

/// Usage reported for a single pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodUsage {
    pub pod: String,
    pub cpu_cores: f64,
    pub mem_bytes: f64,
}

/// Running totals for one workload's pod set.
#[derive(Debug, Clone, Default)]
pub struct ObservationAggregator {
    totals: ResourceUsage,
    pods: usize,
}

impl ObservationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pod's usage. Negative or non-finite readings count as zero.
    pub fn add(&mut self, usage: &PodUsage) {
        self.totals.cpu_cores += sanitize(&usage.pod, "cpu_cores", usage.cpu_cores);
        self.totals.mem_bytes += sanitize(&usage.pod, "mem_bytes", usage.mem_bytes);
        self.pods += 1;
    }

    /// Add usage already summed by the metrics source.
    pub fn add_totals(&mut self, usage: ResourceUsage) {
        self.totals.cpu_cores += sanitize("<aggregate>", "cpu_cores", usage.cpu_cores);
        self.totals.mem_bytes += sanitize("<aggregate>", "mem_bytes", usage.mem_bytes);
    }

    pub fn pod_count(&self) -> usize {
        self.pods
    }

    pub fn totals(&self) -> ResourceUsage {
        self.totals
    }

    /// Freeze the totals into an observation captured at `observed_at`.
    pub fn finish(self, observed_at: EpochMillis) -> ObservationSample {
        ObservationSample {
            usage: self.totals,
            observed_at,
        }
    }
}

impl<'a> Extend<&'a PodUsage> for ObservationAggregator {
    fn extend<I: IntoIterator<Item = &'a PodUsage>>(&mut self, iter: I) {
        for usage in iter {
            self.add(usage);
        }
    }
}

impl<'a> FromIterator<&'a PodUsage> for ObservationAggregator {
    fn from_iter<I: IntoIterator<Item = &'a PodUsage>>(iter: I) -> Self {
        let mut agg = Self::new();
        agg.extend(iter);
        agg
    }
}

fn sanitize(pod: &str, field: &str, value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        debug!(pod, field, value, "discarding invalid usage reading");
        0.0
    }
}
