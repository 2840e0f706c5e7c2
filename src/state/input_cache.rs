//! Generated puzzle inputs kept per catalog puzzle and seed.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

use crate::services::catalog_client::PuzzleRef;

struct CachedInput {
    value: Value,
    stored_at: Instant,
}

/// Time-bounded cache of catalog inputs keyed by puzzle and seed.
pub struct InputCache {
    ttl: Duration,
    entries: DashMap<PuzzleRef, CachedInput>,
}

impl InputCache {
    /// Empty cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Fresh input for `puzzle`, evicting it when expired.
    pub fn get(&self, puzzle: &PuzzleRef) -> Option<Value> {
        let fresh = self.entries.get(puzzle).map(|entry| {
            (entry.stored_at.elapsed() < self.ttl).then(|| entry.value.clone())
        })?;
        if fresh.is_none() {
            self.entries
                .remove_if(puzzle, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        }
        fresh
    }

    /// Remember `value` as the input of `puzzle`.
    pub fn insert(&self, puzzle: PuzzleRef, value: Value) {
        self.entries.insert(
            puzzle,
            CachedInput {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Forget the input of `puzzle`; returns whether one was cached.
    pub fn invalidate(&self, puzzle: &PuzzleRef) -> bool {
        self.entries.remove(puzzle).is_some()
    }

    /// Number of cached inputs, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn puzzle(seed: &str) -> PuzzleRef {
        PuzzleRef {
            address: "http://catalog.test".into(),
            theme: "space".into(),
            puzzle_id: "p1".into(),
            seed_id: seed.into(),
        }
    }

    #[tokio::test]
    async fn entries_are_scoped_to_the_seed() {
        let cache = InputCache::new(Duration::from_secs(60));
        cache.insert(puzzle("u1"), json!({"input": "a"}));

        assert_eq!(cache.get(&puzzle("u1")), Some(json!({"input": "a"})));
        assert_eq!(cache.get(&puzzle("u2")), None);
        assert!(cache.invalidate(&puzzle("u1")));
        assert!(!cache.invalidate(&puzzle("u1")));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_read() {
        let cache = InputCache::new(Duration::from_millis(30));
        cache.insert(puzzle("u1"), json!({"input": "a"}));
        assert!(cache.get(&puzzle("u1")).is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(&puzzle("u1")).is_none());
        assert_eq!(cache.len(), 0);
    }
}
