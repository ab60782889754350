//! Polymorphic job abstraction: one-shot timers, fixed-interval tickers,
//! and calendar-anchored alarms, unified behind a single `Job` trait so the
//! timing wheel and runner (see [`crate::wheel`], [`crate::runner`]) never
//! need to know which concrete kind they are holding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use crate::calendar::{Instant, RecurrenceSpec};
use crate::error::SchedulerError;
use crate::pool::{JobHandle, WorkerPool};

/// Run after a job's closure finishes, on the same worker thread. Used by
/// the runner to re-insert a recurring job into the wheel without the job
/// itself needing a handle back to the wheel.
pub type PostHook = Box<dyn Fn() + Send + Sync>;

/// Anything the timing wheel can hold and the runner can dispatch.
///
/// Every method here is `&self`: jobs live behind `Arc<dyn Job>` shared
/// between the wheel and in-flight dispatch closures, so any mutable state
/// a concrete job needs (a one-shot's closure, a ticker's last-scheduled
/// instant) is behind interior mutability.
pub trait Job: Send + Sync {
    /// Run this job's work. Called on a worker thread, never on the runner
    /// thread.
    fn run(&self);

    /// Compute the next instant this job should fire, given the current
    /// instant. Meaningless for one-shot jobs, which are never rescheduled.
    fn next_time_point(&self, now: Instant) -> Instant;

    /// Total number of times this job has been dispatched (incremented by
    /// [`launch_to`] at dispatch time, not at completion).
    fn hit_count(&self) -> u64;

    fn record_hit(&self);

    /// Whether the runner should call `next_time_point` and re-insert this
    /// job after it fires.
    fn is_recurring(&self) -> bool;

    /// Whether a recurring job's next fire is measured from *completion*
    /// (re-insert after the worker finishes, via the dispatch post-hook)
    /// rather than from *dispatch* (re-insert on the runner thread before
    /// the callback even starts running). Meaningless unless
    /// `is_recurring()` is true.
    fn is_interval(&self) -> bool {
        false
    }
}

/// Submit `job` to `pool`, running `post_hook` (if any) right after the
/// job's own work on the same worker thread. Increments the job's hit
/// count at dispatch time, matching the reference implementation.
pub fn launch_to(
    job: std::sync::Arc<dyn Job>,
    pool: &WorkerPool,
    post_hook: Option<PostHook>,
) -> Result<JobHandle<()>, SchedulerError> {
    job.record_hit();
    pool.submit(move || {
        job.run();
        if let Some(hook) = post_hook {
            hook();
        }
    })
}

/// A job that fires exactly once.
pub struct OneShotJob {
    f: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    hits: AtomicU64,
}

impl OneShotJob {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            f: Mutex::new(Some(Box::new(f))),
            hits: AtomicU64::new(0),
        }
    }
}

impl Job for OneShotJob {
    fn run(&self) {
        if let Some(f) = self.f.lock().expect("one-shot job mutex poisoned").take() {
            f();
        }
    }

    fn next_time_point(&self, now: Instant) -> Instant {
        // Never consulted: the runner never reschedules a one-shot job.
        now
    }

    fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::AcqRel);
    }

    fn is_recurring(&self) -> bool {
        false
    }
}

/// Whether a ticker's next fire is computed from its previous *scheduled*
/// instant (no drift accumulation, but a slow run delays the next tick) or
/// from *now* at dispatch time (always `interval` apart from when the
/// previous run actually finished).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EveryMode {
    Every,
    Interval,
}

/// A job that fires on a fixed interval, in either `every` or `interval`
/// mode (see [`EveryMode`]).
pub struct EveryJob {
    f: Box<dyn Fn() + Send + Sync>,
    interval: ChronoDuration,
    mode: EveryMode,
    last_scheduled: Mutex<Instant>,
    hits: AtomicU64,
}

impl EveryJob {
    pub fn new(
        f: impl Fn() + Send + Sync + 'static,
        interval: Duration,
        mode: EveryMode,
        first_fire: Instant,
    ) -> Self {
        Self {
            f: Box::new(f),
            interval: ChronoDuration::from_std(interval).unwrap_or(ChronoDuration::zero()),
            mode,
            last_scheduled: Mutex::new(first_fire),
            hits: AtomicU64::new(0),
        }
    }
}

impl Job for EveryJob {
    fn run(&self) {
        (self.f)();
    }

    fn next_time_point(&self, now: Instant) -> Instant {
        match self.mode {
            EveryMode::Every => {
                let mut last = self
                    .last_scheduled
                    .lock()
                    .expect("every-job mutex poisoned");
                let next = *last + self.interval;
                *last = next;
                next
            }
            EveryMode::Interval => now + self.interval,
        }
    }

    fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::AcqRel);
    }

    fn is_recurring(&self) -> bool {
        true
    }

    fn is_interval(&self) -> bool {
        self.mode == EveryMode::Interval
    }
}

/// A job that fires on a calendar-anchored recurrence (see
/// [`crate::calendar`]).
pub struct PeriodicalJob {
    f: Box<dyn Fn() + Send + Sync>,
    spec: Mutex<RecurrenceSpec>,
    hits: AtomicU64,
    /// Stop rescheduling once this many fires have happened. `None` means
    /// unbounded.
    repeat_limit: Option<u64>,
}

impl PeriodicalJob {
    pub fn new(
        f: impl Fn() + Send + Sync + 'static,
        spec: RecurrenceSpec,
        repeat_limit: Option<u64>,
    ) -> Self {
        Self {
            f: Box::new(f),
            spec: Mutex::new(spec),
            hits: AtomicU64::new(0),
            repeat_limit,
        }
    }
}

impl Job for PeriodicalJob {
    fn run(&self) {
        (self.f)();
    }

    fn next_time_point(&self, now: Instant) -> Instant {
        self.spec
            .lock()
            .expect("periodical job mutex poisoned")
            .next_after(now)
    }

    fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::AcqRel);
    }

    fn is_recurring(&self) -> bool {
        match self.repeat_limit {
            Some(limit) => self.hit_count() < limit,
            None => true,
        }
    }
}
