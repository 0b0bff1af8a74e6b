//! Auto-end timers

use shiftwatch_util::ShiftId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cancellable one-shot timers keyed by shift.
///
/// Each armed shift owns one task that sleeps until its deadline and then
/// runs the supplied job. Re-arming a shift replaces its previous timer.
#[derive(Clone, Default)]
pub struct AutoEndScheduler {
    timers: Arc<Mutex<HashMap<ShiftId, Timer>>>,
    next_token: Arc<AtomicU64>,
}

struct Timer {
    token: u64,
    handle: JoinHandle<()>,
}

impl AutoEndScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` after `delay` unless the shift is cancelled first
    pub fn arm<F>(&self, shift_id: ShiftId, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Held across spawn so a zero-delay task cannot deregister before it is registered
        let mut timers = self.timers();

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.timers);
        let id = shift_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
            let mut timers = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if timers.get(&id).is_some_and(|t| t.token == token) {
                timers.remove(&id);
            }
        });

        if let Some(previous) = timers.insert(shift_id.clone(), Timer { token, handle }) {
            previous.handle.abort();
        }
        debug!(shift_id = %shift_id, delay_secs = delay.as_secs(), "Auto-end armed");
    }

    /// Cancel a pending timer. Returns whether one was armed.
    pub fn cancel(&self, shift_id: &ShiftId) -> bool {
        match self.timers().remove(shift_id) {
            Some(timer) => {
                timer.handle.abort();
                debug!(shift_id = %shift_id, "Auto-end cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, shift_id: &ShiftId) -> bool {
        self.timers().contains_key(shift_id)
    }

    pub fn armed_count(&self) -> usize {
        self.timers().len()
    }

    /// Cancel every pending timer
    pub fn cancel_all(&self) {
        for (_, timer) in self.timers().drain() {
            timer.handle.abort();
        }
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<ShiftId, Timer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let scheduler = AutoEndScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        scheduler.arm(ShiftId::new("s"), Duration::from_secs(60), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_armed(&ShiftId::new("s")));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let scheduler = AutoEndScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        scheduler.arm(ShiftId::new("s"), Duration::from_secs(60), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(scheduler.cancel(&ShiftId::new("s")));
        assert!(!scheduler.cancel(&ShiftId::new("s")));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let scheduler = AutoEndScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for delay in [10, 20] {
            let counter = Arc::clone(&fired);
            scheduler.arm(ShiftId::new("s"), Duration::from_secs(delay), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scheduler.armed_count(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
