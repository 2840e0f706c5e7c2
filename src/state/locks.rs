//! Per-key asynchronous mutual exclusion.

use std::{hash::Hash, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::timeout,
};

/// Registry of async mutexes keyed by `K`; unrelated keys never contend.
pub struct KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

/// Exclusive access to one key, released on drop.
pub struct KeyGuard<K>
where
    K: Eq + Hash + Clone,
{
    key: K,
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

/// Waiting for the key exceeded the configured bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout;

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Wait at most `limit` for exclusive access to `key`.
    pub async fn acquire(&self, key: &K, limit: Duration) -> Result<KeyGuard<K>, LockTimeout> {
        let mutex = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = timeout(limit, mutex.lock_owned())
            .await
            .map_err(|_| LockTimeout)?;

        Ok(KeyGuard {
            key: key.clone(),
            slots: self.slots.clone(),
            guard: Some(guard),
        })
    }

    /// Number of keys currently tracked; idle keys are evicted.
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for KeyGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // Release first so the strong count only reflects waiters and the registry.
        drop(self.guard.take());
        self.slots
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
