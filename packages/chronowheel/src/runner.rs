//! Single-threaded runner that scans the timing wheel and dispatches due
//! jobs onto the worker pool.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::calendar::Instant;
use crate::config::{ClockKind, SchedulerConfig};
use crate::job::{launch_to, Job, PostHook};
use crate::pool::WorkerPool;
use crate::shutdown::ShutdownToken;
use crate::wheel::TimingWheel;

const STARTING_GAP: Duration = Duration::from_nanos(10);

fn now(clock: ClockKind) -> Instant {
    match clock {
        ClockKind::Utc => Utc::now(),
        // `Instant` is fixed to `DateTime<Utc>` crate-wide so `Arc<dyn Job>`
        // stays object-safe; `ClockKind::Local` only changes which wall
        // clock `now()` reads before normalizing to UTC.
        ClockKind::Local => chrono::Local::now().with_timezone(&Utc),
    }
}

/// Owns the wheel, the worker pool, and the background thread that scans
/// the wheel. Dropping a `Runner` does not stop it — call
/// [`Runner::shutdown`] (or let [`crate::Scheduler`]'s `Drop` impl do it).
pub struct Runner {
    wheel: Arc<TimingWheel>,
    pool: Arc<WorkerPool>,
    shutdown: ShutdownToken,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    larger_gap: Duration,
    wastage: Duration,
    clock: ClockKind,
}

impl Runner {
    pub fn start(wheel: Arc<TimingWheel>, pool: Arc<WorkerPool>, config: &SchedulerConfig) -> Arc<Self> {
        let shutdown = ShutdownToken::new();
        let runner = Arc::new(Self {
            wheel,
            pool,
            shutdown: shutdown.clone(),
            thread: Mutex::new(None),
            larger_gap: config.larger_gap,
            wastage: config.wastage,
            clock: config.clock,
        });

        let loop_runner = runner.clone();
        let handle = thread::Builder::new()
            .name("chronowheel-runner".into())
            .spawn(move || loop_runner.run_loop())
            .expect("failed to spawn runner thread");
        *runner.thread.lock().expect("runner thread mutex poisoned") = Some(handle);

        runner
    }

    pub fn wheel(&self) -> &Arc<TimingWheel> {
        &self.wheel
    }

    /// Wake the runner immediately so it re-evaluates its sleep duration.
    /// Called after `add_task`/`remove_task` from another thread so a
    /// newly-added task doesn't wait out `larger_gap` before being noticed.
    pub fn nudge(&self) {
        self.shutdown.nudge();
    }

    pub fn shutdown(&self) {
        self.shutdown.kill();
        if let Some(handle) = self.thread.lock().expect("runner thread mutex poisoned").take() {
            let _ = handle.join();
        }
    }

    fn run_loop(&self) {
        loop {
            let sleep_for = self.next_sleep_duration();
            // `wait_for_wake` returns on a plain nudge, not only on real
            // shutdown — a spurious wakeup for this loop, which just falls
            // through to recomputing the next sleep duration.
            if self.shutdown.wait_for_wake(sleep_for) {
                return;
            }

            let now = now(self.clock);
            let Some((picked, jobs)) = self.wheel.drain_latest_due(now) else {
                continue;
            };

            tracing::debug!(
                bucket = %picked,
                jobs = jobs.len(),
                "draining due bucket"
            );

            for job in jobs {
                self.dispatch(job, now);
            }
        }
    }

    /// Dispatch one due job. `is_interval` jobs reschedule from a post-hook
    /// that runs after the callback completes, measuring the next fire from
    /// actual completion time; plain recurring jobs (`every`, calendar
    /// alarms) reschedule synchronously on this thread before the callback
    /// even starts, measuring the next fire from `now` (the bucket's due
    /// time) — so a slow callback delays when an `interval` job's next fire
    /// is computed from, but never delays an `every`/alarm job's.
    fn dispatch(&self, job: Arc<dyn Job>, now: Instant) {
        if job.is_interval() {
            let wheel = self.wheel.clone();
            let job_for_hook = job.clone();
            let clock = self.clock;
            let hook: PostHook = Box::new(move || {
                let completed_at = self::now(clock);
                let next = job_for_hook.next_time_point(completed_at);
                wheel.add_task(next, job_for_hook.clone());
            });
            if let Err(err) = launch_to(job, &self.pool, Some(hook)) {
                tracing::warn!(error = %err, "failed to dispatch job");
            }
            return;
        }

        let job_for_reinsert = job.clone();
        if let Err(err) = launch_to(job, &self.pool, None) {
            tracing::warn!(error = %err, "failed to dispatch job");
            return;
        }
        // Checked after `launch_to`'s `record_hit()`: a bounded periodical
        // job's `is_recurring()` depends on the hit count, so this must see
        // the count including the dispatch that just happened.
        if job_for_reinsert.is_recurring() {
            let next = job_for_reinsert.next_time_point(now);
            self.wheel.add_task(next, job_for_reinsert);
        }
    }

    fn next_sleep_duration(&self) -> Duration {
        match self.wheel.earliest() {
            None => self.larger_gap,
            Some(next) => {
                let now = now(self.clock);
                let remaining = (next - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .saturating_sub(self.wastage);
                remaining.max(STARTING_GAP).min(self.larger_gap)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::OneShotJob;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[test]
    fn runner_dispatches_a_due_one_shot_job() {
        let wheel = Arc::new(TimingWheel::new());
        let pool = Arc::new(
            WorkerPool::new(&SchedulerConfig {
                worker_count: 1,
                ..Default::default()
            })
            .expect("pool construction failed"),
        );
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let job: Arc<dyn Job> = Arc::new(OneShotJob::new(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));
        wheel.add_task(Utc::now(), job);

        let config = SchedulerConfig {
            worker_count: 1,
            larger_gap: StdDuration::from_millis(50),
            wastage: StdDuration::ZERO,
            clock: ClockKind::Utc,
        };
        let runner = Runner::start(wheel, pool.clone(), &config);
        thread::sleep(StdDuration::from_millis(200));
        runner.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        // `runner` holds its own clone of `pool`; drop it first or
        // `try_unwrap` below sees two live references and spuriously fails.
        drop(runner);

        let pool = Arc::try_unwrap(pool).expect("pool should be uniquely owned after runner shutdown");
        pool.join().expect("pool join failed");
    }
}
