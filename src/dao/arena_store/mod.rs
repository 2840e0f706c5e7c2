/// In-process backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{CompetitionEntity, UserEntity};
use crate::dao::storage::StorageResult;
use crate::state::attempt::{Attempt, AttemptKey};
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for attempts and the read-only directory.
pub trait ArenaStore: Send + Sync {
    /// Look up an attempt by its unique key.
    fn find_attempt(&self, key: AttemptKey) -> BoxFuture<'static, StorageResult<Option<Attempt>>>;
    /// Insert `attempt` unless a row already exists for its key.
    ///
    /// Returns the stored row and whether this call created it. A uniqueness
    /// violation is reported as `(existing, false)`, never as an error.
    fn insert_attempt_if_absent(
        &self,
        attempt: Attempt,
    ) -> BoxFuture<'static, StorageResult<(Attempt, bool)>>;
    /// Replace the stored row when its version still equals `expected_version`.
    ///
    /// The returned row carries the bumped version. A mismatch or a missing row
    /// yields [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict).
    fn update_attempt(
        &self,
        attempt: Attempt,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<Attempt>>;
    /// Whether any attempt of `user_id` at `puzzle_index` has an end time.
    fn has_completed_puzzle_index(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Every step of one puzzle slot for a user, ordered by step.
    fn list_puzzle_attempts(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>>;
    /// Attempts of a competition, optionally restricted to one user, ordered by
    /// puzzle index, step and start time.
    fn list_competition_attempts(
        &self,
        competition_id: String,
        user_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>>;
    /// Competition directory lookup.
    fn find_competition(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>>;
    /// User directory lookup.
    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Cheap round-trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Ordering shared by every backend for attempt listings.
pub(crate) fn sort_attempts(attempts: &mut [Attempt]) {
    attempts.sort_by(|a, b| {
        a.key
            .puzzle_index
            .cmp(&b.key.puzzle_index)
            .then_with(|| u8::from(a.key.step).cmp(&u8::from(b.key.step)))
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
}
