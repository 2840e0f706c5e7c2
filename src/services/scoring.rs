//! Score awarded when an attempt is completed.

use time::Duration;

use crate::state::attempt::{PuzzleLevel, Step};

/// Score for a completed step: base, time bonus and attempts malus, scaled by
/// the puzzle index multiplier.
///
/// `attempts` counts every processed submission, the winning one included.
pub fn compute_score(
    level: PuzzleLevel,
    step: Step,
    puzzle_index: u32,
    elapsed: Duration,
    attempts: u32,
) -> f64 {
    let points = base_score(level, step) + time_points(level, elapsed) + attempts_malus(attempts);
    f64::from(points) * f64::from(multiplier(puzzle_index))
}

fn base_score(level: PuzzleLevel, step: Step) -> i32 {
    match (level, step) {
        (PuzzleLevel::Easy, Step::First) => 15,
        (PuzzleLevel::Easy, Step::Second) => 35,
        (PuzzleLevel::Medium, Step::First) => 35,
        (PuzzleLevel::Medium, Step::Second) => 65,
        (PuzzleLevel::Hard, Step::First) => 65,
        (PuzzleLevel::Hard, Step::Second) => 135,
    }
}

/// Bonus or malus on whole elapsed minutes. Landing exactly on the last
/// threshold earns nothing.
fn time_points(level: PuzzleLevel, elapsed: Duration) -> i32 {
    let minutes = elapsed.whole_minutes();
    match level {
        PuzzleLevel::Easy => match minutes {
            m if m < 10 => 20,
            m if m < 30 => 10,
            m if m > 30 => -5,
            _ => 0,
        },
        PuzzleLevel::Medium => match minutes {
            m if m < 20 => 20,
            m if m < 40 => 10,
            m if m > 40 => -5,
            _ => 0,
        },
        PuzzleLevel::Hard => match minutes {
            m if m < 40 => 75,
            m if m < 90 => 40,
            m if m < 120 => 20,
            _ => 0,
        },
    }
}

fn attempts_malus(attempts: u32) -> i32 {
    match attempts {
        a if a > 10 => -10,
        a if a > 5 => -5,
        a if a > 3 => -2,
        _ => 0,
    }
}

fn multiplier(puzzle_index: u32) -> u32 {
    1 + puzzle_index / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_first_try_on_easy_step_one() {
        let score = compute_score(PuzzleLevel::Easy, Step::First, 0, Duration::minutes(5), 1);
        assert_eq!(score, 35.0);
    }

    #[test]
    fn base_score_depends_on_step() {
        let first = compute_score(PuzzleLevel::Hard, Step::First, 0, Duration::hours(3), 1);
        let second = compute_score(PuzzleLevel::Hard, Step::Second, 0, Duration::hours(3), 1);
        assert_eq!(first, 65.0);
        assert_eq!(second, 135.0);
    }

    #[test]
    fn time_thresholds_use_whole_minutes() {
        let just_under = Duration::minutes(9) + Duration::seconds(59);
        assert_eq!(time_points(PuzzleLevel::Easy, just_under), 20);
        assert_eq!(time_points(PuzzleLevel::Easy, Duration::minutes(10)), 10);
        assert_eq!(time_points(PuzzleLevel::Easy, Duration::minutes(30)), 0);
        assert_eq!(time_points(PuzzleLevel::Easy, Duration::minutes(31)), -5);
        assert_eq!(time_points(PuzzleLevel::Medium, Duration::minutes(41)), -5);
        assert_eq!(time_points(PuzzleLevel::Hard, Duration::minutes(119)), 20);
        assert_eq!(time_points(PuzzleLevel::Hard, Duration::minutes(120)), 0);
    }

    #[test]
    fn attempts_malus_checks_highest_tier_first() {
        assert_eq!(attempts_malus(3), 0);
        assert_eq!(attempts_malus(4), -2);
        assert_eq!(attempts_malus(6), -5);
        assert_eq!(attempts_malus(11), -10);
    }

    #[test]
    fn multiplier_grows_every_hundred_indexes() {
        assert_eq!(multiplier(0), 1);
        assert_eq!(multiplier(99), 1);
        assert_eq!(multiplier(100), 2);

        let scaled = compute_score(PuzzleLevel::Medium, Step::First, 150, Duration::minutes(50), 12);
        assert_eq!(scaled, f64::from((35 - 5 - 10) * 2));
    }
}
