use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Attempt snapshots.
pub mod attempt;
/// Spectator event payloads.
pub mod broadcast;
/// Course request and response bodies.
pub mod course;
/// Health check body.
pub mod health;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
