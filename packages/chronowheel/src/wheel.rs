//! The timing wheel: an ordered map from instant to the jobs due at that
//! instant.
//!
//! The reference implementation pairs this with a "past wheel" — a second
//! map that a drained bucket's jobs move into, purely so a `shared_ptr`
//! stays alive while the job is still executing on a worker thread after
//! its wheel entry is erased. That's a workaround for manual/shared-pointer
//! lifetime management; here, the `Arc<dyn Job>` cloned into the worker's
//! dispatch closure (see [`crate::runner::Runner::dispatch`]) already keeps
//! the job alive for exactly as long as it's running, so a second
//! unbounded map would only leak memory for no safety benefit, so it's
//! omitted here.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::calendar::Instant;
use crate::job::Job;

type Bucket = Vec<Arc<dyn Job>>;

struct State {
    wheel: BTreeMap<Instant, Bucket>,
}

/// Guarded by a single mutex; held only for the duration of a lookup or
/// mutation, never across a job's dispatch.
pub struct TimingWheel {
    state: Mutex<State>,
}

impl TimingWheel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                wheel: BTreeMap::new(),
            }),
        }
    }

    /// Insert `job` into the bucket at `at`, creating it if absent. Returns
    /// the wheel's new bucket count.
    pub fn add_task(&self, at: Instant, job: Arc<dyn Job>) -> usize {
        let mut state = self.state.lock().expect("wheel mutex poisoned");
        state.wheel.entry(at).or_default().push(job);
        state.wheel.len()
    }

    /// Remove a specific job from its bucket, deleting the bucket if it
    /// becomes empty.
    pub fn remove_task(&self, at: Instant, job: &Arc<dyn Job>) {
        let mut state = self.state.lock().expect("wheel mutex poisoned");
        if let Some(bucket) = state.wheel.get_mut(&at) {
            bucket.retain(|j| !Arc::ptr_eq(j, job));
            if bucket.is_empty() {
                state.wheel.remove(&at);
            }
        }
    }

    /// The earliest bucket's key, if any.
    pub fn earliest(&self) -> Option<Instant> {
        let state = self.state.lock().expect("wheel mutex poisoned");
        state.wheel.keys().next().copied()
    }

    pub fn bucket_count(&self) -> usize {
        self.state.lock().expect("wheel mutex poisoned").wheel.len()
    }

    /// Find the *latest* bucket whose key is `<= now`, erase every bucket
    /// strictly older than it without returning their jobs (a backlog of
    /// missed buckets collapses to a single dispatch of the most recent
    /// one, rather than a burst of catch-up runs), and return
    /// `(picked_instant, jobs)`.
    pub fn drain_latest_due(&self, now: Instant) -> Option<(Instant, Bucket)> {
        let mut state = self.state.lock().expect("wheel mutex poisoned");

        let picked = state
            .wheel
            .range(..=now)
            .next_back()
            .map(|(k, _)| *k)?;

        // Erase every bucket up to and including the picked one; only the
        // picked bucket's jobs are returned for dispatch.
        let remainder = state.wheel.split_off(&picked);
        state.wheel = remainder;
        let jobs = state.wheel.remove(&picked).unwrap_or_default();

        Some((picked, jobs))
    }
}

impl Default for TimingWheel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::OneShotJob;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Instant {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn job() -> Arc<dyn Job> {
        Arc::new(OneShotJob::new(|| ()))
    }

    #[test]
    fn drain_latest_due_erases_older_buckets_without_dispatch() {
        let wheel = TimingWheel::new();
        wheel.add_task(at(0), job());
        wheel.add_task(at(10), job());
        wheel.add_task(at(20), job());
        wheel.add_task(at(1000), job()); // not yet due

        let (picked, jobs) = wheel.drain_latest_due(at(30)).expect("expected a due bucket");
        assert_eq!(picked, at(20));
        assert_eq!(jobs.len(), 1);
        // The buckets at 0 and 10 are gone, never dispatched.
        assert_eq!(wheel.bucket_count(), 1);
        assert_eq!(wheel.earliest(), Some(at(1000)));
    }

    #[test]
    fn drain_latest_due_returns_none_when_nothing_is_due() {
        let wheel = TimingWheel::new();
        wheel.add_task(at(1000), job());
        assert!(wheel.drain_latest_due(at(0)).is_none());
        assert_eq!(wheel.bucket_count(), 1);
    }

    #[test]
    fn remove_task_deletes_empty_bucket() {
        let wheel = TimingWheel::new();
        let j = job();
        wheel.add_task(at(0), j.clone());
        wheel.remove_task(at(0), &j);
        assert_eq!(wheel.bucket_count(), 0);
    }
}
