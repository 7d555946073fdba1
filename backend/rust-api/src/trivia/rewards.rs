//! Reward formulas: XP, diamonds, daily streak, leaderboard score and grade.
//!
//! | accuracy        | arcade diamonds                 |
//! |-----------------|---------------------------------|
//! | < 50%           | 0 (no time bonus)               |
//! | 50% ..< 70%     | floor(reward * 0.2) + time bonus |
//! | 70% ..< 90%     | floor(reward * 0.5) + time bonus |
//! | >= 90%          | reward + time bonus             |
//!
//! The time bonus is one diamond per 6 seconds left on the clock.
//! Tiers are compared in integer arithmetic so 7/10 lands exactly on 70%.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{SessionOutcome, TriviaMode};

pub const STREAK_BONUS_CAP_DAYS: u32 = 7;
pub const STREAK_BONUS_PER_DAY: u32 = 5;
pub const PERFECT_BONUS: u32 = 25;
pub const TIME_BONUS_DIVISOR: u32 = 6;

pub fn calculate_xp(mode: TriviaMode, correct_count: u32, total_questions: u32, streak: u32) -> u32 {
    let base = mode.config().xp_base * correct_count;
    let streak_bonus = streak.min(STREAK_BONUS_CAP_DAYS) * STREAK_BONUS_PER_DAY;
    let perfect_bonus = if total_questions > 0 && correct_count == total_questions {
        PERFECT_BONUS
    } else {
        0
    };

    base + streak_bonus + perfect_bonus
}

pub fn calculate_diamonds(
    mode: TriviaMode,
    correct_count: u32,
    total_questions: u32,
    time_remaining: u32,
) -> u32 {
    if mode != TriviaMode::Arcade || total_questions == 0 {
        return 0;
    }

    let reward = mode.config().diamond_reward;
    let correct = u64::from(correct_count) * 10;
    let total = u64::from(total_questions);

    let tier = if correct >= total * 9 {
        reward
    } else if correct >= total * 7 {
        reward / 2
    } else if correct >= total * 5 {
        reward / 5
    } else {
        return 0;
    };

    tier + time_remaining / TIME_BONUS_DIVISOR
}

/// Daily mode: a correct answer extends the streak, a miss resets it.
/// Other modes never touch the streak.
pub fn next_streak(mode: TriviaMode, previous: u32, correct_count: u32) -> u32 {
    match mode {
        TriviaMode::Daily if correct_count > 0 => previous + 1,
        TriviaMode::Daily => 0,
        _ => previous,
    }
}

/// Streak a player brings into `today`'s daily question. A stored streak
/// survives only if the last daily play was yesterday or today.
pub fn carried_streak(current: u32, last_played: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match (last_played, today.pred_opt()) {
        (Some(last), Some(yesterday)) if last >= yesterday => current,
        _ => 0,
    }
}

/// Leaderboard score for one play.
pub fn score(correct_count: u32, time_remaining: u32) -> u32 {
    correct_count * 100 + time_remaining * 2
}

pub fn accuracy_percent(correct_count: u32, total_questions: u32) -> u32 {
    if total_questions == 0 {
        return 0;
    }
    ((f64::from(correct_count) / f64::from(total_questions)) * 100.0).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_accuracy(accuracy: u32) -> Self {
        match accuracy {
            100.. => Grade::S,
            90..=99 => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            60..=69 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::S => "PERFECT!",
            Grade::A => "Excellent!",
            Grade::B => "Great Job!",
            Grade::C => "Good Work!",
            Grade::D => "Keep Trying!",
            Grade::F => "Study Up!",
        }
    }
}

/// Terminal summary of one session, rewards included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriviaResult {
    pub mode: TriviaMode,
    pub correct_count: u32,
    pub total_questions: u32,
    pub time_spent: u32,
    pub time_remaining: u32,
    pub xp_earned: u32,
    pub diamonds_earned: u32,
    /// Streak after this play.
    pub streak: u32,
    pub score: u32,
    pub accuracy: u32,
    pub grade: Grade,
    pub expired: bool,
}

impl TriviaResult {
    /// XP uses the streak the player carried into the session.
    pub fn from_outcome(mode: TriviaMode, outcome: &SessionOutcome, previous_streak: u32) -> Self {
        let accuracy = accuracy_percent(outcome.correct_count, outcome.total_questions);

        Self {
            mode,
            correct_count: outcome.correct_count,
            total_questions: outcome.total_questions,
            time_spent: outcome.time_spent,
            time_remaining: outcome.time_remaining,
            xp_earned: calculate_xp(
                mode,
                outcome.correct_count,
                outcome.total_questions,
                previous_streak,
            ),
            diamonds_earned: calculate_diamonds(
                mode,
                outcome.correct_count,
                outcome.total_questions,
                outcome.time_remaining,
            ),
            streak: next_streak(mode, previous_streak, outcome.correct_count),
            score: score(outcome.correct_count, outcome.time_remaining),
            accuracy,
            grade: Grade::from_accuracy(accuracy),
            expired: outcome.expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(correct_count: u32, total_questions: u32, time_remaining: u32) -> SessionOutcome {
        SessionOutcome {
            answers: Vec::new(),
            correct_count,
            total_questions,
            time_spent: 0,
            time_remaining,
            expired: false,
        }
    }

    #[test]
    fn xp_is_monotonic_in_correct_count() {
        for mode in TriviaMode::ALL {
            for streak in [0, 3, 12] {
                let mut last = 0;
                for correct in 0..=10 {
                    let xp = calculate_xp(mode, correct, 10, streak);
                    assert!(xp >= last, "{mode} streak={streak} correct={correct}");
                    last = xp;
                }
            }
        }
    }

    #[test]
    fn perfect_bonus_only_on_perfect_runs() {
        for n in 1..=10 {
            let perfect = calculate_xp(TriviaMode::Rules, n, n, 0);
            assert_eq!(perfect, 10 * n + PERFECT_BONUS);
            if n > 1 {
                let near = calculate_xp(TriviaMode::Rules, n - 1, n, 0);
                assert_eq!(near, 10 * (n - 1));
            }
        }
        assert_eq!(calculate_xp(TriviaMode::Rules, 0, 0, 0), 0);
    }

    #[test]
    fn streak_bonus_caps_at_seven_days() {
        assert_eq!(calculate_xp(TriviaMode::Pro, 0, 10, 3), 15);
        assert_eq!(calculate_xp(TriviaMode::Pro, 0, 10, 7), 35);
        assert_eq!(calculate_xp(TriviaMode::Pro, 0, 10, 40), 35);
    }

    #[test]
    fn history_perfect_run_xp() {
        for streak in [0, 2, 9] {
            assert_eq!(
                calculate_xp(TriviaMode::History, 10, 10, streak),
                10 * 10 + streak.min(7) * 5 + 25
            );
        }
    }

    #[test]
    fn only_arcade_pays_diamonds() {
        for mode in TriviaMode::ALL {
            if mode == TriviaMode::Arcade {
                continue;
            }
            for correct in 0..=10 {
                for time_remaining in [0, 30, 60] {
                    assert_eq!(calculate_diamonds(mode, correct, 10, time_remaining), 0);
                }
            }
        }
    }

    #[test]
    fn arcade_tiers() {
        assert_eq!(calculate_diamonds(TriviaMode::Arcade, 10, 10, 12), 102);
        assert_eq!(calculate_diamonds(TriviaMode::Arcade, 9, 10, 0), 100);
        assert_eq!(calculate_diamonds(TriviaMode::Arcade, 8, 10, 0), 50);
        assert_eq!(calculate_diamonds(TriviaMode::Arcade, 7, 10, 5), 50);
        assert_eq!(calculate_diamonds(TriviaMode::Arcade, 6, 10, 6), 21);
        assert_eq!(calculate_diamonds(TriviaMode::Arcade, 5, 10, 0), 20);
    }

    #[test]
    fn arcade_below_half_accuracy_ignores_time_bonus() {
        for time_remaining in [0, 6, 59, 600] {
            assert_eq!(calculate_diamonds(TriviaMode::Arcade, 4, 10, time_remaining), 0);
            assert_eq!(calculate_diamonds(TriviaMode::Arcade, 0, 10, time_remaining), 0);
        }
        assert_eq!(calculate_diamonds(TriviaMode::Arcade, 0, 0, 60), 0);
    }

    #[test]
    fn daily_streak_rule() {
        assert_eq!(next_streak(TriviaMode::Daily, 4, 1), 5);
        assert_eq!(next_streak(TriviaMode::Daily, 4, 0), 0);
        assert_eq!(next_streak(TriviaMode::Arcade, 4, 0), 4);
    }

    #[test]
    fn streak_lapses_after_a_missed_day() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d);

        assert_eq!(carried_streak(6, day(9), today), 6);
        assert_eq!(carried_streak(6, day(10), today), 6);
        assert_eq!(carried_streak(6, day(8), today), 0);
        assert_eq!(carried_streak(6, None, today), 0);
    }

    #[test]
    fn daily_miss_keeps_previous_streak_bonus() {
        let result = TriviaResult::from_outcome(TriviaMode::Daily, &outcome(0, 1, 0), 3);
        assert_eq!(result.xp_earned, 15);
        assert_eq!(result.streak, 0);
        assert_eq!(result.grade, Grade::F);
    }

    #[test]
    fn result_from_arcade_outcome() {
        let result = TriviaResult::from_outcome(TriviaMode::Arcade, &outcome(10, 10, 12), 0);
        assert_eq!(result.diamonds_earned, 102);
        assert_eq!(result.xp_earned, 5 * 10 + 25);
        assert_eq!(result.score, 1024);
        assert_eq!(result.accuracy, 100);
        assert_eq!(result.grade, Grade::S);
    }

    #[test]
    fn grades_follow_accuracy() {
        assert_eq!(Grade::from_accuracy(95), Grade::A);
        assert_eq!(Grade::from_accuracy(80), Grade::B);
        assert_eq!(Grade::from_accuracy(70), Grade::C);
        assert_eq!(Grade::from_accuracy(67), Grade::D);
        assert_eq!(Grade::from_accuracy(10), Grade::F);
        assert_eq!(accuracy_percent(2, 3), 67);
        assert_eq!(accuracy_percent(0, 0), 0);
    }
}
