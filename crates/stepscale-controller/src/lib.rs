//! stepscale-controller: the reconcile loop around the decision engine.
//!
//! The engine never talks to the outside world; the `Reconciler` does,
//! through four injected collaborators:
//!
//! ```text
//! Reconciler
//!   ├── WorkloadStore::get_replicas()   → current (NotFound ⇒ skip)
//!   ├── MetricsProvider::aggregate()    → usage   (Unavailable/timeout ⇒ skip)
//!   ├── ClockSource::now()
//!   ├── StateRepository::load()         → EngineState
//!   ├── stepscale_engine::evaluate()
//!   └── on change:
//!       ├── StateRepository::commit()   (version check claims the decision)
//!       └── WorkloadStore::set_replicas()
//! ```
//!
//! In-memory collaborators live in [`memory`] and back both the tests and
//! the trace replay in [`simulation`].

pub mod adapters;
pub mod clock;
pub mod collaborators;
pub mod error;
pub mod exposition;
pub mod memory;
pub mod reconciler;
pub mod simulation;

pub use adapters::ResourceStatusRepository;
pub use clock::{ManualClock, SystemClock};
pub use collaborators::{ClockSource, MetricsProvider, StateRepository, WorkloadStore};
pub use error::{MetricsError, ReconcileError, StoreError};
pub use exposition::render_prometheus;
pub use memory::{MemoryMetrics, MemoryStateRepository, MemoryWorkloads};
pub use reconciler::{CycleReport, DecisionRecord, Reconciler, SkipReason};
pub use simulation::{replay, Replay, SimulatedCycle, SimulationError, Trace, TraceStep};
