//! stepscale-state: persisted engine state for stepscale.
//!
//! Backed by [redb](https://docs.rs/redb). Holds one `ScaleRecord` per
//! workload so the cooldown clock survives controller restarts.
//!
//! # Concurrency
//!
//! Every record carries a `version`. Writes go through
//! `StateStore::compare_and_swap`, which checks the version the writer last
//! read inside the same write transaction. A writer holding a stale read
//! gets `StateError::Conflict` instead of overwriting a newer decision.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::ScaleRecord;
