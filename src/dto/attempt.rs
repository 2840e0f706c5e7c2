//! Wire projection of attempts, shared by REST listings and broadcast events.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{GroupEntity, UserEntity},
    dto::format_timestamp,
    state::attempt::{Attempt, PuzzleLevel},
};

/// Group membership copied into a user snapshot.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct GroupSnapshot {
    /// Group identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Denormalized user attached to an attempt at snapshot time.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserSnapshot {
    /// User identifier.
    pub id: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Group memberships at snapshot time.
    pub groups: Vec<GroupSnapshot>,
}

/// Full state of an attempt as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct AttemptSnapshot {
    /// Row identifier.
    pub id: Uuid,
    /// Competition the attempt belongs to.
    pub competition_id: String,
    /// Participant owning the attempt.
    pub user_id: String,
    /// Catalog puzzle identifier.
    pub puzzle_id: String,
    /// Position of the puzzle in the competition.
    pub puzzle_index: u32,
    /// Difficulty of the puzzle.
    pub puzzle_lvl: PuzzleLevel,
    /// `1` or `2`.
    pub step: u8,
    /// RFC 3339 timestamp.
    pub start_time: String,
    /// RFC 3339 completion time, absent while open.
    pub end_time: Option<String>,
    /// Processed submissions.
    pub attempts: u32,
    /// Most recent answer.
    pub last_answer: Option<String>,
    /// RFC 3339 time of the most recent submission.
    pub last_move_time: Option<String>,
    /// Score awarded on completion.
    pub score: f64,
    /// Owner details, included in spectator events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSnapshot>,
}

impl From<&GroupEntity> for GroupSnapshot {
    fn from(group: &GroupEntity) -> Self {
        Self {
            id: group.id.clone(),
            name: group.name.clone(),
        }
    }
}

impl From<&UserEntity> for UserSnapshot {
    fn from(user: &UserEntity) -> Self {
        Self {
            id: user.id.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            groups: user.groups.iter().map(Into::into).collect(),
        }
    }
}

impl AttemptSnapshot {
    /// Snapshot an attempt, optionally enriched with its owner.
    pub fn capture(attempt: &Attempt, user: Option<&UserEntity>) -> Self {
        Self {
            id: attempt.id,
            competition_id: attempt.key.competition_id.clone(),
            user_id: attempt.key.user_id.clone(),
            puzzle_id: attempt.key.puzzle_id.clone(),
            puzzle_index: attempt.key.puzzle_index,
            puzzle_lvl: attempt.puzzle_lvl,
            step: attempt.key.step.into(),
            start_time: format_timestamp(attempt.start_time),
            end_time: attempt.end_time.map(format_timestamp),
            attempts: attempt.attempts,
            last_answer: attempt.last_answer.clone(),
            last_move_time: attempt.last_move_time.map(format_timestamp),
            score: attempt.score,
            user: user.map(Into::into),
        }
    }
}

impl From<&Attempt> for AttemptSnapshot {
    fn from(attempt: &Attempt) -> Self {
        Self::capture(attempt, None)
    }
}
