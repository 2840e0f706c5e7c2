//! Attempt lifecycle: creation, submissions, completion and the step cascade.

use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    dao::{
        arena_store::ArenaStore,
        models::UserEntity,
        storage::StorageError,
    },
    dto::{attempt::AttemptSnapshot, broadcast::AttemptUpdate},
    error::ServiceError,
    services::scoring::compute_score,
    state::{
        SharedState,
        attempt::{Attempt, AttemptKey, PuzzleLevel},
        locks::KeyGuard,
    },
};

/// Step-2 insert attempts before the submission is rolled back.
const CASCADE_ATTEMPTS: u32 = 3;
const CASCADE_BACKOFF: Duration = Duration::from_millis(50);

/// Result of recording a submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// The attempt as committed.
    pub attempt: Attempt,
    /// Step-2 attempt created because this submission solved step 1.
    pub next_step: Option<Attempt>,
}

/// Ensure the step-1 attempt exists for this puzzle slot and return it.
///
/// Only a call that actually creates the row announces it to spectators.
pub async fn trigger_first_attempt(
    state: &SharedState,
    competition_id: &str,
    puzzle_id: &str,
    puzzle_index: u32,
    puzzle_lvl: PuzzleLevel,
    user: &UserEntity,
) -> Result<Attempt, ServiceError> {
    let store = state.require_store().await?;
    let key = AttemptKey::first_step(competition_id, &user.id, puzzle_id, puzzle_index);
    let (attempt, created) = create_if_absent(
        store.as_ref(),
        Attempt::new(key, puzzle_lvl, OffsetDateTime::now_utc()),
    )
    .await?;

    if created {
        info!(key = %attempt.key, level = %attempt.puzzle_lvl, "try created");
        announce(state, &attempt, user, AttemptUpdate::created);
    }

    Ok(attempt)
}

/// Look up an attempt by key.
pub async fn find_attempt(state: &SharedState, key: &AttemptKey) -> Result<Attempt, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_attempt(key.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("try `{key}` not found")))
}

/// Count a checked submission and, when correct, complete the attempt.
///
/// Mutations of one key are serialized; the oracle verdict must already be
/// known since no network I/O happens while the key is held.
pub async fn record_submission(
    state: &SharedState,
    key: AttemptKey,
    user: &UserEntity,
    answer: String,
    is_correct: bool,
) -> Result<SubmissionOutcome, ServiceError> {
    let store = state.require_store().await?;
    let guard = lock_attempt(state, &key).await?;

    // Detached so a dropped request cannot stop between the commit and the cascade.
    let task_state = state.clone();
    let user = user.clone();
    tokio::spawn(async move {
        commit_submission(&task_state, store, guard, key, &user, answer, is_correct).await
    })
    .await
    .map_err(|err| ServiceError::Internal(format!("submission task failed: {err}")))?
}

/// Wait for exclusive access to `key`, giving a busy holder one more period.
async fn lock_attempt(
    state: &SharedState,
    key: &AttemptKey,
) -> Result<KeyGuard<AttemptKey>, ServiceError> {
    let limit = state.config().locking.lock_timeout;
    let locks = state.attempt_locks();
    if let Ok(guard) = locks.acquire(key, limit).await {
        return Ok(guard);
    }

    warn!(key = %key, "timed out waiting for try lock; retrying once");
    locks.acquire(key, limit).await.map_err(|_| {
        warn!(key = %key, "try lock still busy");
        ServiceError::ConcurrencyConflict(key.to_string())
    })
}

async fn commit_submission(
    state: &SharedState,
    store: Arc<dyn ArenaStore>,
    guard: KeyGuard<AttemptKey>,
    key: AttemptKey,
    user: &UserEntity,
    answer: String,
    is_correct: bool,
) -> Result<SubmissionOutcome, ServiceError> {
    let mut retried = false;
    let (previous, saved) = loop {
        let current = store
            .find_attempt(key.clone())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("try `{key}` not found")))?;
        let expected_version = current.version;
        let updated = apply_submission(
            current.clone(),
            &answer,
            is_correct,
            OffsetDateTime::now_utc(),
        )?;

        match store.update_attempt(updated, expected_version).await {
            Ok(saved) => break (current, saved),
            Err(StorageError::Conflict { .. }) if !retried => {
                warn!(key = %key, "stale try version; retrying once");
                retried = true;
            }
            Err(err) => return Err(err.into()),
        }
    };

    let next_step = match saved.next_step(OffsetDateTime::now_utc()) {
        Some(next) => match create_next_step(store.as_ref(), next).await {
            Ok((next, true)) => {
                info!(key = %next.key, "next step try created");
                Some(next)
            }
            Ok((_, false)) => None,
            Err(err) => {
                restore(store.as_ref(), previous, saved.version).await;
                return Err(err);
            }
        },
        None => None,
    };

    info!(
        key = %saved.key,
        attempts = saved.attempts,
        correct = is_correct,
        score = saved.score,
        "submission recorded"
    );

    announce(state, &saved, user, AttemptUpdate::updated);
    if let Some(next) = &next_step {
        announce(state, next, user, AttemptUpdate::created);
    }
    drop(guard);

    Ok(SubmissionOutcome {
        attempt: saved,
        next_step,
    })
}

/// Create the step-2 row, retrying transient storage failures a few times.
async fn create_next_step(
    store: &dyn ArenaStore,
    next: Attempt,
) -> Result<(Attempt, bool), ServiceError> {
    let mut attempt = 1;
    loop {
        match create_if_absent(store, next.clone()).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if attempt < CASCADE_ATTEMPTS => {
                warn!(key = %next.key, attempt, error = %err, "next step try insert failed; retrying");
                tokio::time::sleep(CASCADE_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Put back the row as it was before the submission so it can be replayed.
async fn restore(store: &dyn ArenaStore, previous: Attempt, saved_version: u64) {
    let key = previous.key.clone();
    match store.update_attempt(previous, saved_version).await {
        Ok(_) => warn!(key = %key, "next step unavailable; submission rolled back"),
        Err(err) => error!(key = %key, error = %err, "failed to roll back completed try"),
    }
}

/// Pure transition applied to the loaded row.
fn apply_submission(
    mut attempt: Attempt,
    answer: &str,
    is_correct: bool,
    now: OffsetDateTime,
) -> Result<Attempt, ServiceError> {
    attempt.record_submission(answer, now)?;
    if is_correct {
        let score = compute_score(
            attempt.puzzle_lvl,
            attempt.key.step,
            attempt.key.puzzle_index,
            now - attempt.start_time,
            attempt.attempts,
        );
        attempt.complete(now, score)?;
    }
    Ok(attempt)
}

/// Whether `user_id` may open puzzle `puzzle_index`: the previous index must be solved.
pub async fn user_has_permission_to_view_puzzle(
    state: &SharedState,
    competition_id: &str,
    puzzle_index: u32,
    user_id: &str,
) -> Result<bool, ServiceError> {
    let Some(previous) = puzzle_index.checked_sub(1) else {
        return Ok(true);
    };
    let store = state.require_store().await?;
    Ok(store
        .has_completed_puzzle_index(competition_id.to_owned(), user_id.to_owned(), previous)
        .await?)
}

/// Every step of one puzzle slot for a user.
pub async fn list_puzzle_attempts(
    state: &SharedState,
    competition_id: &str,
    user_id: &str,
    puzzle_id: &str,
    puzzle_index: u32,
) -> Result<Vec<Attempt>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_puzzle_attempts(
            competition_id.to_owned(),
            user_id.to_owned(),
            puzzle_id.to_owned(),
            puzzle_index,
        )
        .await?)
}

/// All attempts of a user in a competition.
pub async fn list_user_attempts(
    state: &SharedState,
    competition_id: &str,
    user_id: &str,
) -> Result<Vec<Attempt>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_competition_attempts(competition_id.to_owned(), Some(user_id.to_owned()))
        .await?)
}

/// Insert unless present, retrying once when the backend reports a lost race.
async fn create_if_absent(
    store: &dyn ArenaStore,
    attempt: Attempt,
) -> Result<(Attempt, bool), ServiceError> {
    match store.insert_attempt_if_absent(attempt.clone()).await {
        Err(StorageError::Conflict { key }) => {
            warn!(%key, "try insert raced; re-reading");
            Ok(store.insert_attempt_if_absent(attempt).await?)
        }
        other => Ok(other?),
    }
}

fn announce(
    state: &SharedState,
    attempt: &Attempt,
    user: &UserEntity,
    build: fn(AttemptSnapshot) -> AttemptUpdate,
) {
    let snapshot = AttemptSnapshot::capture(attempt, Some(user));
    state.broadcast().publish(build(snapshot));
}
