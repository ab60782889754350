//! Predicate-guarded condition variable wrapper, and the two latch shapes
//! built on top of it.
//!
//! Everything in this module blocks the calling OS thread. There is no
//! async variant — the runner and pool in this crate coordinate real
//! threads, not futures.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A value guarded by a mutex, with waiters woken through a condvar.
///
/// `T` is the guarded state; callers supply their own predicate to `wait*`
/// rather than this type owning one, so the same primitive backs both
/// [`Latch`] (`T = bool`) and [`CountdownLatch`] (`T = usize`).
pub struct ConditionalWait<T> {
    state: Mutex<T>,
    cv: Condvar,
}

impl<T> ConditionalWait<T> {
    pub fn new(initial: T) -> Self {
        Self {
            state: Mutex::new(initial),
            cv: Condvar::new(),
        }
    }

    /// Block until `pred` holds, then return.
    pub fn wait<P>(&self, mut pred: P)
    where
        P: FnMut(&T) -> bool,
    {
        let guard = self.state.lock().expect("condvar mutex poisoned");
        let _guard = self
            .cv
            .wait_while(guard, |v| !pred(v))
            .expect("condvar mutex poisoned");
    }

    /// Block until `pred` holds or `timeout` elapses. Returns whether the
    /// predicate held when this call returned — a timeout never gets
    /// reported as success just because the OS woke the thread up.
    pub fn wait_for<P>(&self, timeout: Duration, mut pred: P) -> bool
    where
        P: FnMut(&T) -> bool,
    {
        let guard = self.state.lock().expect("condvar mutex poisoned");
        let (guard, _timeout_result) = self
            .cv
            .wait_timeout_while(guard, timeout, |v| !pred(v))
            .expect("condvar mutex poisoned");
        pred(&guard)
    }

    /// Block until `pred` holds or `deadline` passes.
    pub fn wait_until<P>(&self, deadline: Instant, mut pred: P) -> bool
    where
        P: FnMut(&T) -> bool,
    {
        let now = Instant::now();
        if deadline <= now {
            return pred(&self.state.lock().expect("condvar mutex poisoned"));
        }
        self.wait_for(deadline - now, pred)
    }

    /// Mutate the guarded value and wake exactly one waiter.
    pub fn set(&self, f: impl FnOnce(&mut T)) {
        {
            let mut guard = self.lock();
            f(&mut guard);
        }
        self.cv.notify_one();
    }

    /// Mutate the guarded value and wake every waiter.
    pub fn set_for_all(&self, f: impl FnOnce(&mut T)) {
        {
            let mut guard = self.lock();
            f(&mut guard);
        }
        self.cv.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().expect("condvar mutex poisoned")
    }
}

impl<T: Clone> ConditionalWait<T> {
    /// Snapshot the current value without waiting.
    pub fn get(&self) -> T {
        self.lock().clone()
    }

    /// Wait for a single wake (a real notify or the timeout), without
    /// re-checking any predicate — unlike `wait_for`, this returns as soon
    /// as the condvar is notified even if the guarded value didn't change.
    /// Returns the value observed right after waking.
    pub fn wait_once_for(&self, timeout: Duration) -> T {
        let guard = self.state.lock().expect("condvar mutex poisoned");
        let (guard, _timed_out) = self
            .cv
            .wait_timeout(guard, timeout)
            .expect("condvar mutex poisoned");
        guard.clone()
    }
}

impl<T> ConditionalWait<T> {
    /// Wake every waiter without changing the guarded value. Used to nudge
    /// a thread blocked in [`ConditionalWait::wait_once_for`] without
    /// otherwise signaling anything.
    pub fn nudge(&self) {
        self.cv.notify_all();
    }
}

impl<T> ConditionalWait<Option<T>> {
    /// Take the guarded value out, leaving `None` behind. Used once a
    /// waiter has confirmed (via `wait`) that the slot is populated.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }
}

/// A one-shot boolean signal. Used as the scheduler's shutdown token (see
/// [`crate::shutdown`]).
pub struct Latch {
    inner: ConditionalWait<bool>,
}

impl Latch {
    pub fn new() -> Self {
        Self {
            inner: ConditionalWait::new(false),
        }
    }

    pub fn signal(&self) {
        self.inner.set_for_all(|v| *v = true);
    }

    pub fn is_signaled(&self) -> bool {
        self.inner.get()
    }

    pub fn wait(&self) {
        self.inner.wait(|v| *v);
    }

    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.inner.wait_for(timeout, |v| *v)
    }

    pub fn wait_until(&self, deadline: Instant) -> bool {
        self.inner.wait_until(deadline, |v| *v)
    }

    /// Wait for a single wake (timeout or [`Latch::nudge`]) and report
    /// whether the latch was signaled at that point. Used by the runner's
    /// sleep loop, which needs to react to a plain wakeup rather than only
    /// to an actual signal.
    pub fn wait_for_wake(&self, timeout: Duration) -> bool {
        self.inner.wait_once_for(timeout)
    }

    /// Wake anything blocked in `wait_for_wake` without signaling the
    /// latch.
    pub fn nudge(&self) {
        self.inner.nudge();
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts up to a fixed target, then stays satisfied. Counting past the
/// target saturates rather than wrapping or panicking.
pub struct CountdownLatch {
    target: usize,
    inner: ConditionalWait<usize>,
}

impl CountdownLatch {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            inner: ConditionalWait::new(0),
        }
    }

    pub fn count_down(&self) {
        let target = self.target;
        self.inner.set_for_all(|v| {
            if *v < target {
                *v += 1;
            }
        });
    }

    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.inner.get())
    }

    pub fn wait(&self) {
        let target = self.target;
        self.inner.wait(|v| *v >= target);
    }

    pub fn wait_for(&self, timeout: Duration) -> bool {
        let target = self.target;
        self.inner.wait_for(timeout, |v| *v >= target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn latch_wakes_waiter() {
        let latch = Arc::new(Latch::new());
        let waiter = {
            let latch = latch.clone();
            thread::spawn(move || latch.wait())
        };
        thread::sleep(Duration::from_millis(20));
        latch.signal();
        waiter.join().expect("waiter thread panicked");
        assert!(latch.is_signaled());
    }

    #[test]
    fn latch_wait_for_times_out_without_signal() {
        let latch = Latch::new();
        let satisfied = latch.wait_for(Duration::from_millis(20));
        assert!(!satisfied);
    }

    #[test]
    fn countdown_latch_releases_at_target() {
        let latch = Arc::new(CountdownLatch::new(3));
        let waiter = {
            let latch = latch.clone();
            thread::spawn(move || latch.wait())
        };
        for _ in 0..3 {
            thread::sleep(Duration::from_millis(5));
            latch.count_down();
        }
        waiter.join().expect("waiter thread panicked");
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn countdown_latch_saturates_past_target() {
        let latch = CountdownLatch::new(1);
        latch.count_down();
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.remaining(), 0);
    }
}
