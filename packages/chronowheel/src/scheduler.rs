//! The crate's single public entry point: owns the worker pool, the timing
//! wheel, and the runner thread, and hands out the fluent builders.

use std::sync::Arc;

use chrono::Utc;

use crate::builder::{AlarmBuilder, TickerBuilder, TimerBuilder};
use crate::calendar::Instant;
use crate::config::{ClockKind, SchedulerConfig};
use crate::error::SchedulerError;
use crate::job::Job;
use crate::pool::WorkerPool;
use crate::runner::Runner;
use crate::wheel::TimingWheel;

/// A handle to a job registered on a [`Scheduler`]. Unlike
/// [`crate::pool::JobHandle`] (which blocks until one pool task finishes),
/// a `ScheduledJob` may outlive many dispatches — a ticker or alarm keeps
/// firing until cancelled — so it does not offer a blocking `join`.
pub struct ScheduledJob {
    wheel: Arc<TimingWheel>,
    job: Arc<dyn Job>,
    at: Instant,
}

impl ScheduledJob {
    /// Remove this job from the wheel. A no-op if it already fired and was
    /// not recurring, or if it already fired and was re-inserted at a
    /// different instant (cancel again with the new instant is not
    /// supported; call `cancel` promptly after `build` if cancellation is
    /// needed).
    pub fn cancel(&self) {
        self.wheel.remove_task(self.at, &self.job);
    }

    pub fn hit_count(&self) -> u64 {
        self.job.hit_count()
    }
}

pub struct Scheduler {
    wheel: Arc<TimingWheel>,
    pool: Arc<WorkerPool>,
    runner: Arc<Runner>,
    clock: ClockKind,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let wheel = Arc::new(TimingWheel::new());
        let pool = Arc::new(WorkerPool::new(&config)?);
        let runner = Runner::start(wheel.clone(), pool.clone(), &config);
        tracing::info!(workers = config.worker_count, "scheduler started");
        Ok(Self {
            wheel,
            pool,
            runner,
            clock: config.clock,
        })
    }

    pub fn timer(&self) -> TimerBuilder<'_> {
        TimerBuilder::new(self)
    }

    pub fn ticker(&self) -> TickerBuilder<'_> {
        TickerBuilder::new(self)
    }

    pub fn alarm(&self) -> AlarmBuilder<'_> {
        AlarmBuilder::new(self)
    }

    pub fn now(&self) -> Instant {
        match self.clock {
            ClockKind::Utc => Utc::now(),
            ClockKind::Local => chrono::Local::now().with_timezone(&Utc),
        }
    }

    pub fn active_worker_count(&self) -> usize {
        self.pool.active_count()
    }

    pub fn bucket_count(&self) -> usize {
        self.wheel.bucket_count()
    }

    pub(crate) fn register_job(
        &self,
        at: Instant,
        job: Arc<dyn Job>,
    ) -> Result<ScheduledJob, SchedulerError> {
        self.wheel.add_task(at, job.clone());
        self.runner.nudge();
        Ok(ScheduledJob {
            wheel: self.wheel.clone(),
            job,
            at,
        })
    }

    /// Stop accepting new work, join the runner thread, then join the
    /// worker pool. Also available through `Drop`, which cannot propagate
    /// join errors — call this explicitly to observe them.
    pub fn shutdown(self) -> Result<(), SchedulerError> {
        self.runner.shutdown();
        // `Runner` holds its own clone of `pool` in its struct field; the
        // runner thread's clone is already gone (joined above), but this
        // scheduler-owned `Arc<Runner>` must be dropped too before `pool`'s
        // refcount can drop to one, or `try_unwrap` below spuriously fails.
        drop(self.runner);
        Arc::try_unwrap(self.pool)
            .map_err(|_| SchedulerError::RunnerJoinFailed)?
            .join()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.runner.shutdown();
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn timer_fires_once() {
        let scheduler = Scheduler::new(SchedulerConfig {
            worker_count: 2,
            larger_gap: Duration::from_millis(50),
            ..Default::default()
        })
        .expect("scheduler construction failed");

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        scheduler
            .timer()
            .in_(Duration::from_millis(10))
            .on(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .expect("build failed");

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ticker_fires_multiple_times() {
        let scheduler = Scheduler::new(SchedulerConfig {
            worker_count: 2,
            larger_gap: Duration::from_millis(20),
            ..Default::default()
        })
        .expect("scheduler construction failed");

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        scheduler
            .ticker()
            .every(Duration::from_millis(20))
            .on(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .expect("build failed");

        std::thread::sleep(Duration::from_millis(250));
        assert!(counter.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn shutdown_joins_cleanly() {
        let scheduler = Scheduler::new(SchedulerConfig {
            worker_count: 2,
            larger_gap: Duration::from_millis(50),
            ..Default::default()
        })
        .expect("scheduler construction failed");

        scheduler
            .timer()
            .in_(Duration::from_millis(5))
            .on(|| ())
            .build()
            .expect("build failed");

        std::thread::sleep(Duration::from_millis(50));
        scheduler.shutdown().expect("shutdown should succeed once the runner thread is joined");
    }
}
