//! Prometheus text exposition of the latest decision per workload.

use std::fmt::Write;

use stepscale_core::DecisionReason;

use crate::reconciler::DecisionRecord;

/// Render decision records as Prometheus gauges labelled by `workload`.
///
/// HELP/TYPE headers are emitted even when `records` is empty.
pub fn render_prometheus(records: &[DecisionRecord]) -> String {
    let mut out = String::new();

    gauge(
        &mut out,
        "stepscale_current_replicas",
        "Replica count observed at evaluation.",
        records,
        |r| r.outcome.current_replicas.to_string(),
    );
    gauge(
        &mut out,
        "stepscale_desired_replicas",
        "Raw replica demand before clamping.",
        records,
        |r| r.outcome.desired_replicas.to_string(),
    );
    gauge(
        &mut out,
        "stepscale_target_replicas",
        "Replica demand clamped to policy bounds.",
        records,
        |r| r.outcome.target_replicas.to_string(),
    );
    gauge(
        &mut out,
        "stepscale_final_replicas",
        "Replica count chosen by the last evaluation.",
        records,
        |r| r.outcome.final_replicas.to_string(),
    );
    gauge(
        &mut out,
        "stepscale_cpu_cores",
        "Aggregate CPU usage in cores.",
        records,
        |r| format!("{:.3}", r.usage.cpu_cores),
    );
    gauge(
        &mut out,
        "stepscale_memory_bytes",
        "Aggregate working-set memory in bytes.",
        records,
        |r| format!("{:.0}", r.usage.mem_bytes),
    );
    gauge(
        &mut out,
        "stepscale_last_evaluation_timestamp_seconds",
        "Unix time of the last evaluation.",
        records,
        |r| format!("{:.3}", r.evaluated_at as f64 / 1000.0),
    );

    // One series per reason; 1 marks the reason of the last evaluation.
    header(&mut out, "stepscale_decision", "Reason of the last evaluation.");
    for r in records {
        for reason in DecisionReason::ALL {
            let _ = writeln!(
                out,
                "stepscale_decision{{workload=\"{}\",reason=\"{}\"}} {}",
                r.workload,
                reason,
                u8::from(r.outcome.reason == reason)
            );
        }
    }

    out
}

fn header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

fn gauge<F>(out: &mut String, name: &str, help: &str, records: &[DecisionRecord], value: F)
where
    F: Fn(&DecisionRecord) -> String,
{
    header(out, name, help);
    for r in records {
        let _ = writeln!(out, "{name}{{workload=\"{}\"}} {}", r.workload, value(r));
    }
}
