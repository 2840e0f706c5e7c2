//! Domain model for a user's attempt ("try") at one step of one puzzle.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Difficulty tier copied from the catalog when an attempt is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PuzzleLevel {
    /// Entry-level puzzle.
    Easy,
    /// Intermediate puzzle.
    Medium,
    /// Advanced puzzle.
    Hard,
}

impl PuzzleLevel {
    /// Wire representation of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            PuzzleLevel::Easy => "EASY",
            PuzzleLevel::Medium => "MEDIUM",
            PuzzleLevel::Hard => "HARD",
        }
    }
}

impl fmt::Display for PuzzleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a puzzle. Serialized as the integer `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Step {
    /// Find the answer.
    First,
    /// Find the refined answer; only reachable after [`Step::First`] is solved.
    Second,
}

#[derive(Debug, Error)]
#[error("invalid puzzle step `{0}` (expected 1 or 2)")]
/// Raised when converting an out-of-range integer into a [`Step`].
pub struct InvalidStep(pub u8);

impl TryFrom<u8> for Step {
    type Error = InvalidStep;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Step::First),
            2 => Ok(Step::Second),
            other => Err(InvalidStep(other)),
        }
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        match step {
            Step::First => 1,
            Step::Second => 2,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Identity of an attempt; at most one attempt exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    /// Competition the puzzle belongs to.
    pub competition_id: String,
    /// Participant working on the puzzle.
    pub user_id: String,
    /// Catalog identifier of the puzzle.
    pub puzzle_id: String,
    /// Position of the puzzle in the competition, starting at 0.
    pub puzzle_index: u32,
    /// Phase this attempt covers.
    pub step: Step,
}

impl AttemptKey {
    /// Build the key of the step-1 attempt for a puzzle slot.
    pub fn first_step(
        competition_id: impl Into<String>,
        user_id: impl Into<String>,
        puzzle_id: impl Into<String>,
        puzzle_index: u32,
    ) -> Self {
        Self {
            competition_id: competition_id.into(),
            user_id: user_id.into(),
            puzzle_id: puzzle_id.into(),
            puzzle_index,
            step: Step::First,
        }
    }

    /// Same puzzle slot, different step.
    pub fn with_step(&self, step: Step) -> Self {
        Self {
            step,
            ..self.clone()
        }
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}/step{}",
            self.competition_id, self.user_id, self.puzzle_id, self.puzzle_index, self.step
        )
    }
}

/// Errors raised by attempt state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// The attempt already has an end time; it can no longer change.
    #[error("try already finished")]
    AlreadyFinished,
}

/// One user's work record for one step of one puzzle within a competition.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Row identifier.
    pub id: Uuid,
    /// Unique identity of the attempt.
    pub key: AttemptKey,
    /// Difficulty recorded when the attempt was opened.
    pub puzzle_lvl: PuzzleLevel,
    /// When the attempt was opened.
    pub start_time: OffsetDateTime,
    /// Set exactly once, when the step is solved.
    pub end_time: Option<OffsetDateTime>,
    /// Processed submissions, correct or not.
    pub attempts: u32,
    /// Most recent submitted answer.
    pub last_answer: Option<String>,
    /// When the most recent submission was processed.
    pub last_move_time: Option<OffsetDateTime>,
    /// Score awarded on completion; zero while open.
    pub score: f64,
    /// Optimistic concurrency counter bumped by the store on every update.
    pub version: u64,
}

impl Attempt {
    /// Fresh attempt with no submissions.
    pub fn new(key: AttemptKey, puzzle_lvl: PuzzleLevel, started_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            puzzle_lvl,
            start_time: started_at,
            end_time: None,
            attempts: 0,
            last_answer: None,
            last_move_time: None,
            score: 0.0,
            version: 0,
        }
    }

    /// Whether the step has been solved.
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Count a processed submission, correct or not.
    pub fn record_submission(
        &mut self,
        answer: impl Into<String>,
        at: OffsetDateTime,
    ) -> Result<(), AttemptError> {
        self.ensure_open()?;
        self.last_answer = Some(answer.into());
        self.last_move_time = Some(at);
        self.attempts += 1;
        Ok(())
    }

    /// Close the attempt with its final score.
    pub fn complete(&mut self, at: OffsetDateTime, score: f64) -> Result<(), AttemptError> {
        self.ensure_open()?;
        self.end_time = Some(at);
        self.score = score;
        Ok(())
    }

    /// Attempt for the following step, available once step 1 is solved.
    pub fn next_step(&self, at: OffsetDateTime) -> Option<Attempt> {
        match (self.key.step, self.is_finished()) {
            (Step::First, true) => Some(Attempt::new(
                self.key.with_step(Step::Second),
                self.puzzle_lvl,
                at,
            )),
            _ => None,
        }
    }

    /// Time spent between start and completion, if completed.
    pub fn elapsed(&self) -> Option<time::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    fn ensure_open(&self) -> Result<(), AttemptError> {
        if self.is_finished() {
            Err(AttemptError::AlreadyFinished)
        } else {
            Ok(())
        }
    }
}
