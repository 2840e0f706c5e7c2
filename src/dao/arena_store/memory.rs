//! Embedded, process-local storage backend.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::{
    dao::{
        arena_store::{ArenaStore, sort_attempts},
        models::{CompetitionEntity, UserEntity},
        storage::{StorageError, StorageResult},
    },
    state::attempt::{Attempt, AttemptKey},
};

/// [`ArenaStore`] keeping every row in memory.
///
/// Create-if-absent relies on the map entry lock; updates compare versions
/// under the same lock, so it mirrors the guarantees of the database backend.
#[derive(Clone, Default)]
pub struct MemoryArenaStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    attempts: DashMap<AttemptKey, Attempt>,
    competitions: DashMap<String, CompetitionEntity>,
    users: DashMap<String, UserEntity>,
}

impl MemoryArenaStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store preloaded with directory entries.
    pub fn with_directory(
        competitions: impl IntoIterator<Item = CompetitionEntity>,
        users: impl IntoIterator<Item = UserEntity>,
    ) -> Self {
        let store = Self::new();
        competitions
            .into_iter()
            .for_each(|competition| store.insert_competition(competition));
        users.into_iter().for_each(|user| store.insert_user(user));
        store
    }

    /// Add or replace a competition.
    pub fn insert_competition(&self, competition: CompetitionEntity) {
        self.inner
            .competitions
            .insert(competition.id.clone(), competition);
    }

    /// Add or replace a user.
    pub fn insert_user(&self, user: UserEntity) {
        self.inner.users.insert(user.id.clone(), user);
    }

    /// Number of attempt rows currently stored.
    pub fn attempt_count(&self) -> usize {
        self.inner.attempts.len()
    }

    fn insert_if_absent(&self, attempt: Attempt) -> (Attempt, bool) {
        match self.inner.attempts.entry(attempt.key.clone()) {
            Entry::Occupied(existing) => (existing.get().clone(), false),
            Entry::Vacant(slot) => {
                slot.insert(attempt.clone());
                (attempt, true)
            }
        }
    }

    fn update(&self, mut attempt: Attempt, expected_version: u64) -> StorageResult<Attempt> {
        match self.inner.attempts.get_mut(&attempt.key) {
            Some(mut row) if row.version == expected_version => {
                attempt.version = expected_version + 1;
                *row.value_mut() = attempt.clone();
                Ok(attempt)
            }
            _ => Err(StorageError::conflict(&attempt.key)),
        }
    }

    fn collect_attempts(&self, filter: impl Fn(&AttemptKey) -> bool) -> Vec<Attempt> {
        let mut attempts = self
            .inner
            .attempts
            .iter()
            .filter(|row| filter(row.key()))
            .map(|row| row.value().clone())
            .collect::<Vec<_>>();
        sort_attempts(&mut attempts);
        attempts
    }
}

impl ArenaStore for MemoryArenaStore {
    fn find_attempt(&self, key: AttemptKey) -> BoxFuture<'static, StorageResult<Option<Attempt>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .attempts
                .get(&key)
                .map(|row| row.value().clone()))
        })
    }

    fn insert_attempt_if_absent(
        &self,
        attempt: Attempt,
    ) -> BoxFuture<'static, StorageResult<(Attempt, bool)>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert_if_absent(attempt)) })
    }

    fn update_attempt(
        &self,
        attempt: Attempt,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<Attempt>> {
        let store = self.clone();
        Box::pin(async move { store.update(attempt, expected_version) })
    }

    fn has_completed_puzzle_index(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.inner.attempts.iter().any(|row| {
                let key = row.key();
                key.competition_id == competition_id
                    && key.user_id == user_id
                    && key.puzzle_index == puzzle_index
                    && row.end_time.is_some()
            }))
        })
    }

    fn list_puzzle_attempts(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.collect_attempts(|key| {
                key.competition_id == competition_id
                    && key.user_id == user_id
                    && key.puzzle_id == puzzle_id
                    && key.puzzle_index == puzzle_index
            }))
        })
    }

    fn list_competition_attempts(
        &self,
        competition_id: String,
        user_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.collect_attempts(|key| {
                key.competition_id == competition_id
                    && user_id.as_ref().is_none_or(|user| *user == key.user_id)
            }))
        })
    }

    fn find_competition(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .competitions
                .get(&id)
                .map(|row| row.value().clone()))
        })
    }

    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.users.get(&id).map(|row| row.value().clone())) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
