use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::attempt::AttemptSnapshot;

/// Whether the event announces a new attempt or a change to an existing one.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// The attempt was just opened.
    New,
    /// An existing attempt changed.
    Update,
}

/// Payload pushed to every spectator of a competition.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct AttemptUpdate {
    /// Competition whose spectators receive the event.
    pub competition_id: String,
    /// Attempt state after the change.
    #[serde(rename = "try")]
    pub attempt: AttemptSnapshot,
    /// Whether the attempt was just opened or changed.
    pub update_type: UpdateKind,
}

impl AttemptUpdate {
    /// Announce a freshly created attempt.
    pub fn created(attempt: AttemptSnapshot) -> Self {
        Self::with_kind(attempt, UpdateKind::New)
    }

    /// Announce a change to an existing attempt.
    pub fn updated(attempt: AttemptSnapshot) -> Self {
        Self::with_kind(attempt, UpdateKind::Update)
    }

    fn with_kind(attempt: AttemptSnapshot, update_type: UpdateKind) -> Self {
        Self {
            competition_id: attempt.competition_id.clone(),
            attempt,
            update_type,
        }
    }
}
