//! Shutdown token shared between the worker pool and the timing-wheel
//! runner.

use std::sync::Arc;
use std::time::Duration;

use crate::wait::Latch;

/// A cloneable handle to a single shutdown signal. Every clone observes the
/// same underlying [`Latch`] — cloning shares state, it does not reset it.
#[derive(Clone)]
pub struct ShutdownToken {
    latch: Arc<Latch>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            latch: Arc::new(Latch::new()),
        }
    }

    pub fn kill(&self) {
        self.latch.signal();
    }

    pub fn is_shutdown(&self) -> bool {
        self.latch.is_signaled()
    }

    pub fn wait(&self) {
        self.latch.wait();
    }

    /// Sleep until shut down or `timeout` elapses; returns whether shutdown
    /// had been signaled when this call returned.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.latch.wait_for(timeout)
    }

    /// Wait for a single wake (timeout or [`ShutdownToken::nudge`]) and
    /// report whether shutdown had been signaled at that point. Unlike
    /// `wait_for`, a plain nudge causes this to return immediately even
    /// though the latch is still unsignaled.
    pub fn wait_for_wake(&self, timeout: Duration) -> bool {
        self.latch.wait_for_wake(timeout)
    }

    /// Wake anything blocked in `wait_for_wake` without shutting anything
    /// down. Used to make the runner re-evaluate its sleep duration right
    /// after a task is added to the wheel from another thread.
    pub fn nudge(&self) {
        self.latch.nudge();
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = ShutdownToken::new();
        let clone = token.clone();
        assert!(!clone.is_shutdown());
        token.kill();
        assert!(clone.is_shutdown());
    }
}
