//! Fixed-size worker thread pool fed by a single shared [`BlockingQueue`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::queue::BlockingQueue;
use crate::wait::{ConditionalWait, CountdownLatch};

type Task = Box<dyn FnOnce() + Send>;

/// The `std::future`-free return value of [`WorkerPool::submit`]. Blocks on
/// [`JobHandle::join`] the way `std::thread::JoinHandle` does, rather than
/// offering an `await`-able future.
pub struct JobHandle<R> {
    slot: Arc<ConditionalWait<Option<Result<R, SchedulerError>>>>,
}

impl<R> JobHandle<R> {
    fn new() -> (Self, Arc<ConditionalWait<Option<Result<R, SchedulerError>>>>) {
        let slot = Arc::new(ConditionalWait::new(None));
        (
            Self {
                slot: slot.clone(),
            },
            slot,
        )
    }

    /// Block until the task completes, returning its result or the error
    /// that stopped it from completing (panic, or the pool shut down before
    /// the task ran).
    pub fn join(self) -> Result<R, SchedulerError> {
        self.slot.wait(|v| v.is_some());
        self.slot.take().expect("slot signaled without a value")
    }
}

/// A fixed pool of OS threads pulling [`Task`]s off one shared FIFO queue.
pub struct WorkerPool {
    queue: Arc<BlockingQueue<Task>>,
    threads: Vec<thread::JoinHandle<()>>,
    active_count: Arc<AtomicUsize>,
    total_count: usize,
    shut_down: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        let worker_count = config.worker_count.max(1);
        let queue: Arc<BlockingQueue<Task>> = Arc::new(BlockingQueue::new());
        let active_count = Arc::new(AtomicUsize::new(0));
        let shut_down = Arc::new(AtomicBool::new(false));
        let ready = Arc::new(CountdownLatch::new(worker_count));

        let mut threads = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let queue = queue.clone();
            let active_count = active_count.clone();
            let ready = ready.clone();
            let handle = thread::Builder::new()
                .name(format!("chronowheel-worker-{id}"))
                .spawn(move || {
                    ready.count_down();
                    worker_loop(queue, active_count);
                })
                .map_err(|source| SchedulerError::ThreadSpawnFailed { source })?;
            threads.push(handle);
        }

        // Startup ready barrier: block until every worker has entered its
        // loop, so a caller can never race `submit` against a pool that
        // looks constructed but has no live threads pulling from it yet.
        ready.wait();

        Ok(Self {
            queue,
            threads,
            active_count,
            total_count: worker_count,
            shut_down,
        })
    }

    /// Enqueue `f` to run on the pool. Returns `Err(PoolShutDown)` without
    /// enqueuing anything if `join()` has already been called.
    pub fn submit<F, R>(&self, f: F) -> Result<JobHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SchedulerError::PoolShutDown);
        }
        let (handle, slot) = JobHandle::new();
        let task: Task = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            let outcome = result.map_err(|_| SchedulerError::TaskPanicked);
            slot.set_for_all(|v| *v = Some(outcome));
        });
        self.queue.push(task);
        Ok(handle)
    }

    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Stop accepting new tasks and wake every thread blocked in
    /// `queue.pop()`. Does not block; `join` is what waits for the threads
    /// to actually exit. Idempotent.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.queue.clear();
    }

    /// Signal shutdown, drain the queue, and join every worker thread.
    /// Consumes `self` so a caller cannot join the same pool twice.
    pub fn join(mut self) -> Result<(), SchedulerError> {
        self.shutdown();
        let mut panicked = false;
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                panicked = true;
            }
        }
        if panicked {
            Err(SchedulerError::RunnerJoinFailed)
        } else {
            Ok(())
        }
    }
}

fn worker_loop(queue: Arc<BlockingQueue<Task>>, active_count: Arc<AtomicUsize>) {
    while let Some(task) = queue.pop() {
        active_count.fetch_add(1, Ordering::AcqRel);
        task();
        active_count.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::time::Duration;

    #[test]
    fn submit_runs_task_and_returns_result() {
        let pool = WorkerPool::new(&SchedulerConfig {
            worker_count: 2,
            ..Default::default()
        })
        .expect("pool construction failed");
        let handle = pool.submit(|| 2 + 2).expect("submit failed");
        assert_eq!(handle.join().expect("task failed"), 4);
        pool.join().expect("pool join failed");
    }

    #[test]
    fn submit_after_shutdown_is_rejected() {
        let pool = WorkerPool::new(&SchedulerConfig {
            worker_count: 1,
            ..Default::default()
        })
        .expect("pool construction failed");
        pool.shutdown();
        assert!(matches!(
            pool.submit(|| ()),
            Err(SchedulerError::PoolShutDown)
        ));
        pool.join().expect("pool join failed");
    }

    #[test]
    fn panicking_task_does_not_stop_the_pool() {
        let pool = WorkerPool::new(&SchedulerConfig {
            worker_count: 2,
            ..Default::default()
        })
        .expect("pool construction failed");
        let panicking = pool
            .submit(|| -> i32 { panic!("boom") })
            .expect("submit failed");
        assert!(matches!(
            panicking.join(),
            Err(SchedulerError::TaskPanicked)
        ));

        let counter = Arc::new(StdAtomicUsize::new(0));
        let counter_clone = counter.clone();
        let handle = pool
            .submit(move || counter_clone.fetch_add(1, Ordering::SeqCst))
            .expect("submit failed");
        handle.join().expect("task failed");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        pool.join().expect("pool join failed");
    }

    #[test]
    fn ready_barrier_blocks_until_workers_are_running() {
        let start = std::time::Instant::now();
        let pool = WorkerPool::new(&SchedulerConfig {
            worker_count: 4,
            ..Default::default()
        })
        .expect("pool construction failed");
        // Constructing returns only after every worker thread has entered
        // its loop, so submitting immediately must not race empty threads.
        let handle = pool.submit(|| ()).expect("submit failed");
        handle.join().expect("task failed");
        assert!(start.elapsed() < Duration::from_secs(5));
        pool.join().expect("pool join failed");
    }
}
