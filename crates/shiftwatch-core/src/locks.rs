//! Per-(guild, user) command serialization

use shiftwatch_util::{GuildId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table size above which idle locks are dropped on the next acquire
const PRUNE_THRESHOLD: usize = 256;

/// Async mutexes keyed by (guild, user).
///
/// Holding the guard makes a load-validate-append sequence atomic with
/// respect to every other command and auto-end firing for the same user.
#[derive(Default)]
pub struct ScopeLocks {
    locks: Mutex<HashMap<(GuildId, UserId), Arc<AsyncMutex<()>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, guild: &GuildId, user: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(
                locks
                    .entry((guild.clone(), user.clone()))
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of tracked scopes
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_same_scope_is_serialized() {
        let locks = Arc::new(ScopeLocks::new());
        let guild = GuildId::new("g");
        let user = UserId::new("u");

        let guard = locks.lock(&guild, &user).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            let (guild, user) = (guild.clone(), user.clone());
            tokio::spawn(async move {
                let _guard = locks.lock(&guild, &user).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_scopes_are_independent() {
        let locks = ScopeLocks::new();
        let guild = GuildId::new("g");

        let _a = locks.lock(&guild, &UserId::new("a")).await;
        let _b = locks.lock(&guild, &UserId::new("b")).await;
        assert_eq!(locks.len(), 2);
    }
}
