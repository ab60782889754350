//! Blocking FIFO queue shared by every worker thread in the pool.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct State<T> {
    items: VecDeque<T>,
    abort: bool,
}

/// A `Mutex<VecDeque<T>>` plus a `Condvar`, FIFO from the caller's point of
/// view. `clear()` aborts every blocked `pop()` at once.
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    cv: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                abort: false,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.items.push_back(item);
        self.cv.notify_one();
    }

    /// Blocks until an item is available or the queue is aborted. Returns
    /// `None` only when woken because of `abort`, never as a spurious
    /// empty-queue wakeup.
    pub fn pop(&self) -> Option<T> {
        let mut state = self
            .cv
            .wait_while(self.state.lock().expect("queue mutex poisoned"), |s| {
                !s.abort && s.items.is_empty()
            })
            .expect("queue mutex poisoned");
        state.items.pop_front()
    }

    /// Abort every blocked and future `pop()`, draining whatever is queued.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.abort = true;
        state.items.clear();
        drop(state);
        self.cv.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pop_returns_pushed_items_in_order() {
        let queue = BlockingQueue::new();
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn clear_wakes_every_blocked_pop() {
        let queue = Arc::new(BlockingQueue::<i32>::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.pop())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        queue.clear();
        for waiter in waiters {
            assert_eq!(waiter.join().expect("waiter thread panicked"), None);
        }
    }

    #[test]
    fn pop_after_clear_does_not_block() {
        let queue = BlockingQueue::<i32>::new();
        queue.clear();
        assert_eq!(queue.pop(), None);
    }
}
