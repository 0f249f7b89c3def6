//! Like/unlike write coalescing.
//!
//! Toggles land in a ledger hash in the cache store and are drained into Postgres by a
//! periodic flush. Reads are served from a cached per-recipe like set.
pub mod queue;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use queue::{FlushReport, LikeAction, LikeError, LikeQueue, ToggleOutcome};
pub use scheduler::spawn_flush_task;
