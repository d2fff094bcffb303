//! stepscaled: offline front end to the stepscale engine.
//!
//! # Usage
//!
//! ```text
//! stepscaled check --config policy.toml
//! stepscaled evaluate --config policy.toml --current 2 --cpu-cores 1.0 --mem-bytes 0
//! stepscaled simulate --config policy.toml --trace trace.json --initial-replicas 2 --prometheus
//! stepscaled state list --state-db stepscale.redb
//! ```
//!
//! Results go to stdout as JSON (TOML for `check`); logs go to stderr.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepscaled",
    about = "Step-limited replica autoscaler",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Where the scale target comes from. With neither flag, the target is
/// read from `TARGET_*`, `MIN_REPLICAS` and related environment variables.
#[derive(Args, Clone)]
pub struct TargetArgs {
    /// Static target and policy in TOML.
    #[arg(long, conflicts_with = "resource")]
    pub config: Option<PathBuf>,

    /// Autoscaler custom resource in JSON.
    #[arg(long)]
    pub resource: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a policy and print the effective settings.
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Evaluate a single observation.
    Evaluate {
        #[command(flatten)]
        target: TargetArgs,

        /// Replica count the workload has now.
        #[arg(long)]
        current: u32,

        /// Aggregate CPU usage in cores.
        #[arg(long, default_value = "0")]
        cpu_cores: f64,

        /// Aggregate working-set memory in bytes.
        #[arg(long, default_value = "0")]
        mem_bytes: f64,

        /// Epoch milliseconds of the last applied change.
        #[arg(long)]
        last_change_ms: Option<u64>,

        /// Evaluation time in epoch milliseconds (default: now).
        #[arg(long)]
        now_ms: Option<u64>,
    },
    /// Replay a JSON trace of observations through the reconciler.
    Simulate {
        #[command(flatten)]
        target: TargetArgs,

        /// JSON array of trace steps.
        #[arg(long)]
        trace: PathBuf,

        #[arg(long)]
        initial_replicas: u32,

        /// Persist engine state in this redb file across runs.
        #[arg(long)]
        state_db: Option<PathBuf>,

        /// Epoch milliseconds of the first step (default: now).
        #[arg(long)]
        start_ms: Option<u64>,

        /// After the cycles, print the last decision as Prometheus text.
        #[arg(long)]
        prometheus: bool,

        /// Write the resource with its final status to this file.
        #[arg(long, requires = "resource")]
        resource_out: Option<PathBuf>,
    },
    /// Inspect persisted scale records.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print every record, one JSON object per line.
    List {
        #[arg(long)]
        state_db: PathBuf,
    },
    /// Forget a workload's record, clearing its cooldown.
    Delete {
        #[arg(long)]
        state_db: PathBuf,

        /// Workload as `namespace/name`.
        #[arg(long)]
        workload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Check { target } => commands::check::check(&target),
        Command::Evaluate {
            target,
            current,
            cpu_cores,
            mem_bytes,
            last_change_ms,
            now_ms,
        } => commands::evaluate::evaluate(
            &target,
            current,
            cpu_cores,
            mem_bytes,
            last_change_ms,
            now_ms,
        ),
        Command::Simulate {
            target,
            trace,
            initial_replicas,
            state_db,
            start_ms,
            prometheus,
            resource_out,
        } => {
            commands::simulate::simulate(
                &target,
                &trace,
                initial_replicas,
                state_db.as_deref(),
                start_ms,
                commands::simulate::SimulateOutput {
                    prometheus,
                    resource_out: resource_out.as_deref(),
                },
            )
            .await
        }
        Command::State { action } => match action {
            StateAction::List { state_db } => commands::state::list(&state_db),
            StateAction::Delete { state_db, workload } => {
                commands::state::delete(&state_db, &workload)
            }
        },
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,stepscale=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
