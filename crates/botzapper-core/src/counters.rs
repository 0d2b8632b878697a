//! Session and all-time hidden post counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::debounce::DelayedTask;
use crate::storage::{Store, keys};

/// Counts hidden posts.
///
/// The session counter starts at zero on every activation and is never
/// persisted. The all-time counter is loaded from the local area and written
/// back through a debounce, so a burst of hides costs one write. A crash
/// inside the debounce window loses at most that window's increments.
///
/// Nothing is written until a load has read the stored total, so an
/// unreadable store never has its total replaced by a smaller one.
pub struct CounterLedger<S> {
    local: S,
    session: u64,
    all_time: u64,
    persisted: Arc<AtomicU64>,
    baseline_known: bool,
    pending_write: DelayedTask,
}

impl<S> CounterLedger<S>
where
    S: Store + Clone + Send + Sync + 'static,
{
    /// Creates a ledger with both counters at zero.
    #[must_use]
    pub fn new(local: S, debounce: Duration) -> Self {
        Self {
            local,
            session: 0,
            all_time: 0,
            persisted: Arc::new(AtomicU64::new(0)),
            baseline_known: false,
            pending_write: DelayedTask::new(debounce),
        }
    }

    /// Resets the session counter and reads the all-time counter.
    ///
    /// A missing or malformed value counts as zero. An unreadable value also
    /// counts as zero, but then the total is kept in memory only until a
    /// later load succeeds.
    pub async fn load(&mut self) {
        self.pending_write.cancel();
        self.session = 0;
        match self.local.get(keys::ALL_TIME_HIDDEN).await {
            Ok(value) => {
                self.all_time = value.as_ref().and_then(Value::as_u64).unwrap_or(0);
                self.baseline_known = true;
                info!(all_time = self.all_time, "Loaded all-time hidden posts");
            }
            Err(e) => {
                self.all_time = 0;
                self.baseline_known = false;
                warn!("Failed to read all-time hidden posts, not saving this session: {e}");
            }
        }
        self.persisted.store(self.all_time, Ordering::SeqCst);
    }

    /// Whether the stored total was read, so writes may replace it.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.baseline_known
    }

    /// Counts one hidden post and schedules a debounced write of the total.
    pub fn record_hide(&mut self) {
        self.session += 1;
        self.all_time += 1;
        debug!(session = self.session, all_time = self.all_time, "Hide recorded");
        if !self.baseline_known {
            return;
        }

        let local = self.local.clone();
        let persisted = Arc::clone(&self.persisted);
        let total = self.all_time;
        self.pending_write.schedule(async move {
            if let Err(e) = write_total(&local, &persisted, total).await {
                // The next hide schedules another write of the newer total.
                error!("Failed to save all-time hidden posts: {e}");
            }
        });
    }

    /// Posts hidden since activation.
    #[must_use]
    pub const fn session_count(&self) -> u64 {
        self.session
    }

    /// Posts hidden across all activations, including unsaved increments.
    #[must_use]
    pub const fn all_time_count(&self) -> u64 {
        self.all_time
    }

    /// Cancels the pending write and saves the total now if it is not saved
    /// yet. Does nothing when the stored total could not be read.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.pending_write.cancel();
        if !self.baseline_known || self.persisted.load(Ordering::SeqCst) == self.all_time {
            return Ok(());
        }
        write_total(&self.local, &self.persisted, self.all_time).await
    }
}

async fn write_total<S: Store>(local: &S, persisted: &AtomicU64, total: u64) -> Result<()> {
    local.set(keys::ALL_TIME_HIDDEN, json!(total)).await?;
    persisted.store(total, Ordering::SeqCst);
    debug!(total, "Saved all-time hidden posts");
    Ok(())
}
