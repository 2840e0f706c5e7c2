//! Cooldown gate evaluated before an answer reaches the checker.

use std::time::Duration;

use time::OffsetDateTime;

use crate::{config::RateLimitConfig, state::attempt::Attempt};

/// Outcome of [`check_rate_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitVerdict {
    /// The submission may proceed.
    Allowed,
    /// A cooldown is still running.
    Blocked {
        /// Time left before the next submission is accepted.
        remaining: Duration,
        /// Which threshold triggered the cooldown (1 or 2).
        tier: u8,
    },
}

impl RateLimitVerdict {
    /// Whether the submission must wait.
    pub fn is_blocked(&self) -> bool {
        matches!(self, RateLimitVerdict::Blocked { .. })
    }

    /// Remaining wait, zero when allowed.
    pub fn remaining(&self) -> Duration {
        match self {
            RateLimitVerdict::Allowed => Duration::ZERO,
            RateLimitVerdict::Blocked { remaining, .. } => *remaining,
        }
    }
}

/// Decide whether a new submission on `attempt` is currently blocked.
///
/// The highest reached threshold alone decides; a lower tier is never
/// consulted once a higher one applies.
pub fn check_rate_limit(
    attempt: &Attempt,
    config: &RateLimitConfig,
    now: OffsetDateTime,
) -> RateLimitVerdict {
    let Some(last_move) = attempt.last_move_time else {
        return RateLimitVerdict::Allowed;
    };

    let (cooldown, tier) = if attempt.attempts >= config.attempts_threshold_2 {
        (config.cooldown_2, 2)
    } else if attempt.attempts >= config.attempts_threshold_1 {
        (config.cooldown_1, 1)
    } else {
        return RateLimitVerdict::Allowed;
    };

    let unblocked_at = last_move + cooldown;
    if unblocked_at <= now {
        return RateLimitVerdict::Allowed;
    }

    match Duration::try_from(unblocked_at - now) {
        Ok(remaining) => RateLimitVerdict::Blocked { remaining, tier },
        Err(_) => RateLimitVerdict::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::state::attempt::{AttemptKey, PuzzleLevel};

    const NOW: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

    fn attempt(attempts: u32, minutes_ago: Option<i64>) -> Attempt {
        let mut attempt = Attempt::new(
            AttemptKey::first_step("c1", "u1", "p1", 0),
            PuzzleLevel::Easy,
            datetime!(2024-03-01 11:00 UTC),
        );
        attempt.attempts = attempts;
        attempt.last_move_time = minutes_ago.map(|m| NOW - time::Duration::minutes(m));
        attempt
    }

    #[test]
    fn first_submission_is_always_allowed() {
        let verdict = check_rate_limit(&attempt(9, None), &RateLimitConfig::default(), NOW);
        assert_eq!(verdict, RateLimitVerdict::Allowed);
    }

    #[test]
    fn below_first_threshold_is_allowed() {
        let verdict = check_rate_limit(&attempt(2, Some(0)), &RateLimitConfig::default(), NOW);
        assert!(!verdict.is_blocked());
    }

    #[test]
    fn first_tier_blocks_for_the_rest_of_its_cooldown() {
        let verdict = check_rate_limit(&attempt(3, Some(2)), &RateLimitConfig::default(), NOW);
        assert_eq!(
            verdict,
            RateLimitVerdict::Blocked {
                remaining: Duration::from_secs(60),
                tier: 1,
            }
        );

        let verdict = check_rate_limit(&attempt(3, Some(4)), &RateLimitConfig::default(), NOW);
        assert_eq!(verdict, RateLimitVerdict::Allowed);
    }

    #[test]
    fn second_tier_takes_precedence() {
        let verdict = check_rate_limit(&attempt(5, Some(4)), &RateLimitConfig::default(), NOW);
        assert_eq!(
            verdict,
            RateLimitVerdict::Blocked {
                remaining: Duration::from_secs(60),
                tier: 2,
            }
        );
        assert_eq!(verdict.remaining(), Duration::from_secs(60));
    }

    #[test]
    fn cooldown_boundary_is_exclusive() {
        let verdict = check_rate_limit(&attempt(3, Some(3)), &RateLimitConfig::default(), NOW);
        assert_eq!(verdict, RateLimitVerdict::Allowed);
    }
}
