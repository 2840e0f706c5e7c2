//! Participant flows: identity resolution, puzzle input and answer submission.

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    dao::models::{CompetitionEntity, UserEntity},
    dto::course::{AnswerPuzzleRequest, AnswerPuzzleResponse, PuzzleInputRequest},
    error::ServiceError,
    services::{
        attempt_service,
        catalog_client::PuzzleRef,
        rate_limiter::{RateLimitVerdict, check_rate_limit},
    },
    state::{
        SharedState,
        attempt::{AttemptKey, Step},
    },
};

/// Resolve the caller forwarded by the authenticating proxy.
pub async fn resolve_user(
    state: &SharedState,
    user_id: Option<&str>,
) -> Result<UserEntity, ServiceError> {
    let user_id = user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("missing user identity".into()))?;
    let store = state.require_store().await?;
    store
        .find_user(user_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(format!("unknown user `{user_id}`")))
}

/// Load a competition or fail with `NotFound`.
pub async fn load_competition(
    state: &SharedState,
    competition_id: &str,
) -> Result<CompetitionEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_competition(competition_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("competition `{competition_id}` not found")))
}

/// Open the step-1 attempt for a puzzle and return its generated input.
pub async fn fetch_puzzle_input(
    state: &SharedState,
    user: &UserEntity,
    request: PuzzleInputRequest,
) -> Result<Value, ServiceError> {
    let competition = load_competition(state, &request.competition_id).await?;
    ensure_visible(state, &competition.id, request.puzzle_index, &user.id).await?;

    if let Err(err) = attempt_service::trigger_first_attempt(
        state,
        &competition.id,
        &request.puzzle_id,
        request.puzzle_index,
        request.puzzle_lvl,
        user,
    )
    .await
    {
        warn!(
            competition_id = %competition.id,
            puzzle_id = %request.puzzle_id,
            error = %err,
            "failed to open first try"
        );
    }

    let puzzle = puzzle_ref(&competition, &request.puzzle_id, user);
    if let Some(cached) = state.inputs().get(&puzzle) {
        debug!(puzzle_id = %puzzle.puzzle_id, seed_id = %puzzle.seed_id, "serving cached puzzle input");
        return Ok(cached);
    }

    let input = state.catalog().fetch_input(puzzle.clone()).await?;
    state.inputs().insert(puzzle, input.clone());
    Ok(input)
}

/// Gate, check and record an answer for one step of a puzzle.
pub async fn answer_puzzle(
    state: &SharedState,
    user: &UserEntity,
    request: AnswerPuzzleRequest,
) -> Result<AnswerPuzzleResponse, ServiceError> {
    let step = Step::try_from(request.puzzle_step)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let competition = load_competition(state, &request.competition_id).await?;
    let key = AttemptKey::first_step(
        &competition.id,
        &user.id,
        &request.puzzle_id,
        request.puzzle_index,
    )
    .with_step(step);

    let attempt = attempt_service::find_attempt(state, &key).await?;
    if attempt.is_finished() {
        return Err(ServiceError::AlreadyFinished);
    }

    let verdict = check_rate_limit(
        &attempt,
        &state.config().rate_limit,
        OffsetDateTime::now_utc(),
    );
    if let RateLimitVerdict::Blocked { remaining, tier } = verdict {
        info!(
            key = %key,
            attempts = attempt.attempts,
            tier,
            remaining_secs = remaining.as_secs(),
            "submission blocked by cooldown"
        );
        return Err(ServiceError::RateLimited { remaining });
    }

    let puzzle = puzzle_ref(&competition, &request.puzzle_id, user);
    let is_correct = state
        .catalog()
        .check_answer(puzzle.clone(), step.into(), request.answer.clone())
        .await?;

    attempt_service::record_submission(state, key, user, request.answer, is_correct).await?;
    if is_correct {
        state.inputs().invalidate(&puzzle);
    }

    Ok(AnswerPuzzleResponse {
        is_correct,
        puzzle_id: request.puzzle_id,
        puzzle_step: step.into(),
    })
}

async fn ensure_visible(
    state: &SharedState,
    competition_id: &str,
    puzzle_index: u32,
    user_id: &str,
) -> Result<(), ServiceError> {
    if attempt_service::user_has_permission_to_view_puzzle(state, competition_id, puzzle_index, user_id)
        .await?
    {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "puzzle #{puzzle_index} is locked until the previous one is solved"
        )))
    }
}

fn puzzle_ref(competition: &CompetitionEntity, puzzle_id: &str, user: &UserEntity) -> PuzzleRef {
    PuzzleRef {
        address: competition.catalog_address.clone(),
        theme: competition.catalog_theme.clone(),
        puzzle_id: puzzle_id.to_owned(),
        seed_id: user.id.clone(),
    }
}
