use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;
use serde_json::Value;

use crate::{
    dao::models::UserEntity,
    dto::{
        attempt::AttemptSnapshot,
        course::{AnswerPuzzleRequest, AnswerPuzzleResponse, PermissionResponse, PuzzleInputRequest},
    },
    error::{AppError, ServiceError},
    services::{attempt_service, course_service},
    state::SharedState,
};

/// Header set by the authenticating proxy with the caller's user ID.
const USER_ID_HEADER: &str = "x-user-id";

/// Participant endpoints; every route requires a resolvable caller identity.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/competitions/input", post(puzzle_input))
        .route("/competitions/answer_puzzle", post(answer_puzzle))
        .route(
            "/competitions/{id}/puzzles/{index}/permission",
            get(puzzle_permission),
        )
        .route(
            "/competitions/{id}/puzzles/{puzzle_id}/{index}/tries",
            get(puzzle_tries),
        )
        .route("/competitions/{id}/users/{user_id}/tries", get(user_tries))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

/// Fetch the generated puzzle input, opening the step-1 try on first access.
#[utoipa::path(
    post,
    path = "/competitions/input",
    tag = "course",
    params(("X-User-Id" = String, Header, description = "Caller identity forwarded by the proxy")),
    request_body = PuzzleInputRequest,
    responses(
        (status = 200, description = "Puzzle input as produced by the catalog", content_type = "application/json"),
        (status = 403, description = "Previous puzzle not solved yet"),
        (status = 404, description = "Unknown competition"),
        (status = 502, description = "Catalog failure")
    )
)]
pub async fn puzzle_input(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Valid(Json(payload)): Valid<Json<PuzzleInputRequest>>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(
        course_service::fetch_puzzle_input(&state, &user, payload).await?,
    ))
}

/// Submit an answer for one step of a puzzle.
#[utoipa::path(
    post,
    path = "/competitions/answer_puzzle",
    tag = "course",
    params(("X-User-Id" = String, Header, description = "Caller identity forwarded by the proxy")),
    request_body = AnswerPuzzleRequest,
    responses(
        (status = 200, description = "Answer checked and recorded", body = AnswerPuzzleResponse),
        (status = 404, description = "No try opened for this puzzle step"),
        (status = 409, description = "Try already finished"),
        (status = 429, description = "Cooldown in effect", body = crate::dto::course::RateLimitedResponse),
        (status = 502, description = "Answer checker failure")
    )
)]
pub async fn answer_puzzle(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Valid(Json(payload)): Valid<Json<AnswerPuzzleRequest>>,
) -> Result<Json<AnswerPuzzleResponse>, AppError> {
    Ok(Json(
        course_service::answer_puzzle(&state, &user, payload).await?,
    ))
}

/// Whether the caller may open the puzzle at `index`.
#[utoipa::path(
    get,
    path = "/competitions/{id}/puzzles/{index}/permission",
    tag = "course",
    params(
        ("X-User-Id" = String, Header, description = "Caller identity forwarded by the proxy"),
        ("id" = String, Path, description = "Competition identifier"),
        ("index" = u32, Path, description = "Puzzle index within the competition")
    ),
    responses((status = 200, description = "Visibility of the puzzle", body = PermissionResponse))
)]
pub async fn puzzle_permission(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path((competition_id, index)): Path<(String, u32)>,
) -> Result<Json<PermissionResponse>, AppError> {
    let has_permission =
        attempt_service::user_has_permission_to_view_puzzle(&state, &competition_id, index, &user.id)
            .await?;
    Ok(Json(PermissionResponse { has_permission }))
}

/// Caller's tries for every step of one puzzle.
#[utoipa::path(
    get,
    path = "/competitions/{id}/puzzles/{puzzle_id}/{index}/tries",
    tag = "course",
    params(
        ("X-User-Id" = String, Header, description = "Caller identity forwarded by the proxy"),
        ("id" = String, Path, description = "Competition identifier"),
        ("puzzle_id" = String, Path, description = "Catalog puzzle identifier"),
        ("index" = u32, Path, description = "Puzzle index within the competition")
    ),
    responses((status = 200, description = "Tries ordered by step", body = [AttemptSnapshot]))
)]
pub async fn puzzle_tries(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path((competition_id, puzzle_id, index)): Path<(String, String, u32)>,
) -> Result<Json<Vec<AttemptSnapshot>>, AppError> {
    let attempts =
        attempt_service::list_puzzle_attempts(&state, &competition_id, &user.id, &puzzle_id, index)
            .await?;
    Ok(Json(snapshots(&attempts, &user)))
}

/// Every try of a user in a competition; callers may only list their own.
#[utoipa::path(
    get,
    path = "/competitions/{id}/users/{user_id}/tries",
    tag = "course",
    params(
        ("X-User-Id" = String, Header, description = "Caller identity forwarded by the proxy"),
        ("id" = String, Path, description = "Competition identifier"),
        ("user_id" = String, Path, description = "User whose tries are listed")
    ),
    responses(
        (status = 200, description = "Tries ordered by puzzle index and step", body = [AttemptSnapshot]),
        (status = 403, description = "Listing another user's tries")
    )
)]
pub async fn user_tries(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path((competition_id, user_id)): Path<(String, String)>,
) -> Result<Json<Vec<AttemptSnapshot>>, AppError> {
    if user_id != user.id {
        return Err(ServiceError::Forbidden("tries of other users are private".into()).into());
    }
    let attempts = attempt_service::list_user_attempts(&state, &competition_id, &user.id).await?;
    Ok(Json(snapshots(&attempts, &user)))
}

fn snapshots(
    attempts: &[crate::state::attempt::Attempt],
    user: &UserEntity,
) -> Vec<AttemptSnapshot> {
    attempts
        .iter()
        .map(|attempt| AttemptSnapshot::capture(attempt, Some(user)))
        .collect()
}

async fn require_user(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_owned());

    let user = course_service::resolve_user(&state, user_id.as_deref()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
