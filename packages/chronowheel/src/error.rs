//! Structured error type for scheduler operations.
//!
//! Every builder-phase failure and every pool failure surfaces through one
//! of these variants; nothing in this crate panics or swallows an error on
//! a path a caller can reach through the public API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The pool has been shut down; `submit` was called after `join()`.
    #[error("worker pool is shut down")]
    PoolShutDown,

    /// The task closure panicked while running on a worker thread.
    #[error("scheduled task panicked")]
    TaskPanicked,

    /// `TimerBuilder::at_str` could not parse its input against any of the
    /// supported formats.
    #[error("could not parse {input:?} as a time-of-day or datetime")]
    UnparseableDatetime { input: String },

    /// `AlarmBuilder::every_month`/`every_year`/`loop_for` was given a
    /// non-positive `ordinal` for an anchor where `ordinal` is a period
    /// stride (`Month..Year`, the thirds-of-month anchors). A non-positive
    /// stride would never advance a stale fire instant and livelock the
    /// runner.
    #[error("ordinal must be positive for this anchor, got {ordinal}")]
    NonPositiveOrdinal { ordinal: i32 },

    /// A worker thread failed to spawn.
    #[error("worker thread failed to start: {source}")]
    ThreadSpawnFailed {
        #[source]
        source: std::io::Error,
    },

    /// The runner thread panicked while the scheduler was shutting down.
    #[error("runner thread panicked during shutdown")]
    RunnerJoinFailed,
}
