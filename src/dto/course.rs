//! DTO definitions for the participant-facing puzzle endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::attempt::PuzzleLevel;

/// Request for the generated input of a puzzle; also opens the step-1 attempt.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PuzzleInputRequest {
    /// Competition to play in.
    #[validate(length(min = 1))]
    pub competition_id: String,
    /// Catalog puzzle identifier.
    #[validate(length(min = 1))]
    pub puzzle_id: String,
    /// Position of the puzzle in the competition.
    pub puzzle_index: u32,
    /// Difficulty recorded on the new attempt.
    pub puzzle_lvl: PuzzleLevel,
}

/// Answer submission for one step of a puzzle.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerPuzzleRequest {
    /// Competition to play in.
    #[validate(length(min = 1))]
    pub competition_id: String,
    /// Catalog puzzle identifier.
    #[validate(length(min = 1))]
    pub puzzle_id: String,
    /// Position of the puzzle in the competition.
    pub puzzle_index: u32,
    /// Step being answered, `1` or `2`.
    #[validate(range(min = 1, max = 2))]
    pub puzzle_step: u8,
    /// Submitted answer.
    #[validate(length(min = 1, max = 10000))]
    pub answer: String,
}

/// Verdict returned after an answer was checked and recorded.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AnswerPuzzleResponse {
    /// Catalog verdict.
    pub is_correct: bool,
    /// Puzzle that was answered.
    pub puzzle_id: String,
    /// Step that was answered.
    pub puzzle_step: u8,
}

/// Body returned with `429 Too Many Requests`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RateLimitedResponse {
    /// Human-readable reason.
    pub error: String,
    /// Seconds to wait before the next submission.
    pub wait_time_seconds: u64,
}

/// Whether the caller may open a puzzle index.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PermissionResponse {
    /// Whether the puzzle is unlocked.
    pub has_permission: bool,
}
