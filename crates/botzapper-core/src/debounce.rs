//! Single-slot delayed task with cancel-and-reschedule semantics.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs at most one future after a delay.
///
/// Scheduling while a task is pending aborts it and starts the delay again,
/// so a burst of calls results in a single run after the burst settles.
#[derive(Debug)]
pub struct DelayedTask {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl DelayedTask {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Delay applied to every scheduled task.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces any pending task with `task`, run after the delay.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Aborts the pending task, if any. Returns whether one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether a scheduled task has not finished yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
