//! Single-flight TTL cache
//!
//! One cache instance per derived aggregate. A fresh entry is served as is.
//! On a miss exactly one caller (the leader) computes the value; concurrent
//! callers get the previous payload when there is one and otherwise wait for
//! the leader. Freshness is measured with `tokio::time::Instant`.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    payload: Arc<V>,
    computed_at: Instant,
}

struct Slot<V> {
    entry: Option<CacheEntry<V>>,
    /// Generation of the running refresh and a receiver that closes when it stops
    in_flight: Option<(u64, watch::Receiver<()>)>,
    /// Bumped on invalidation so results of older refreshes are discarded
    generation: u64,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            entry: None,
            in_flight: None,
            generation: 0,
        }
    }

    fn invalidate(&mut self) {
        self.entry = None;
        self.in_flight = None;
        self.generation += 1;
    }
}

enum Claim<V> {
    Ready(Arc<V>),
    Wait(watch::Receiver<()>),
    Lead {
        generation: u64,
        done: watch::Sender<()>,
    },
}

/// Keyed cache with a fixed time-to-live
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached payload for `key`, computing it on a miss.
    ///
    /// A failed compute stores nothing and the error goes to the leader only;
    /// waiting callers retry and one of them leads the next attempt.
    pub async fn get<F, Fut, E>(&self, key: &K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        loop {
            match self.claim(key) {
                Claim::Ready(payload) => return Ok(payload),
                Claim::Wait(mut rx) => {
                    // Closed when the leader finishes, fails or is dropped
                    let _ = rx.changed().await;
                }
                Claim::Lead { generation, done } => {
                    debug!(cache = self.name, key = ?key, "Refreshing cache entry");
                    let _guard = InFlightGuard {
                        cache: self,
                        key: key.clone(),
                        generation,
                        _done: done,
                    };

                    let payload = Arc::new(compute().await?);
                    self.store(key, generation, Arc::clone(&payload));
                    return Ok(payload);
                }
            }
        }
    }

    /// Drop the entry and discard any refresh already running for it
    pub fn invalidate(&self, key: &K) {
        if let Some(slot) = self.slots().get_mut(key) {
            slot.invalidate();
            debug!(cache = self.name, key = ?key, "Cache entry invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        for slot in self.slots().values_mut() {
            slot.invalidate();
        }
        debug!(cache = self.name, "Cache cleared");
    }

    /// The payload if present and fresh, without computing
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.slots()
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| entry.computed_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.payload))
    }

    /// When the current payload was computed, fresh or not
    pub fn computed_at(&self, key: &K) -> Option<Instant> {
        self.slots()
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| entry.computed_at)
    }

    fn claim(&self, key: &K) -> Claim<V> {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_insert_with(Slot::new);

        if let Some(entry) = &slot.entry
            && entry.computed_at.elapsed() < self.ttl
        {
            return Claim::Ready(Arc::clone(&entry.payload));
        }

        if let Some((_, rx)) = &slot.in_flight {
            return match &slot.entry {
                Some(stale) => Claim::Ready(Arc::clone(&stale.payload)),
                None => Claim::Wait(rx.clone()),
            };
        }

        let (done, rx) = watch::channel(());
        slot.in_flight = Some((slot.generation, rx));
        Claim::Lead {
            generation: slot.generation,
            done,
        }
    }

    fn store(&self, key: &K, generation: u64, payload: Arc<V>) {
        let mut slots = self.slots();
        match slots.get_mut(key) {
            Some(slot) if slot.generation == generation => {
                slot.entry = Some(CacheEntry {
                    payload,
                    computed_at: Instant::now(),
                });
            }
            _ => {
                debug!(cache = self.name, key = ?key, "Discarding result of invalidated refresh");
            }
        }
    }

    fn release(&self, key: &K, generation: u64) {
        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(key)
            && slot
                .in_flight
                .as_ref()
                .is_some_and(|(g, _)| *g == generation)
        {
            slot.in_flight = None;
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight marker however the leader exits, then wakes waiters
struct InFlightGuard<'a, K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    cache: &'a TtlCache<K, V>,
    key: K,
    generation: u64,
    _done: watch::Sender<()>,
}

impl<K, V> Drop for InFlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn drop(&mut self) {
        self.cache.release(&self.key, self.generation);
    }
}
