//! Scheduler tunables.

use std::time::Duration;

/// Which `chrono` clock the scheduler reads calendar fields from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    Utc,
    Local,
}

impl Default for ClockKind {
    fn default() -> Self {
        ClockKind::Utc
    }
}

/// Tunables for a [`crate::Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads. Defaults to
    /// `std::thread::available_parallelism()`, falling back to 1.
    pub worker_count: usize,

    /// Upper bound on how long the runner sleeps between wheel scans when
    /// the wheel is empty or its next bucket is far away.
    pub larger_gap: Duration,

    /// How much earlier than a bucket's key the runner wakes up, to absorb
    /// scheduling jitter. Zero by default.
    pub wastage: Duration,

    /// Which clock `now()` reads from.
    pub clock: ClockKind,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            larger_gap: Duration::from_secs(3),
            wastage: Duration::ZERO,
            clock: ClockKind::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_count_is_at_least_one() {
        assert!(SchedulerConfig::default().worker_count >= 1);
    }
}
