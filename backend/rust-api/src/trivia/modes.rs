use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Category, TriviaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriviaMode {
    Daily,
    History,
    Rules,
    Pro,
    Arcade,
}

/// Static per-mode settings. Never written at runtime.
#[derive(Debug, Clone, Serialize)]
pub struct TriviaModeConfig {
    pub name: &'static str,
    pub description: &'static str,
    pub questions_count: usize,
    /// Whole-session limit in seconds; `None` means untimed.
    pub time_limit: Option<u32>,
    pub xp_base: u32,
    pub diamond_cost: u32,
    /// Payout at >= 90% accuracy, before the time bonus.
    pub diamond_reward: u32,
    /// Empty means no category filter.
    pub categories: &'static [Category],
    pub auto_advance: bool,
    pub show_explanations: bool,
}

static DAILY: TriviaModeConfig = TriviaModeConfig {
    name: "Daily Question",
    description: "One new question every day. Keep your streak alive",
    questions_count: 1,
    time_limit: None,
    xp_base: 50,
    diamond_cost: 0,
    diamond_reward: 0,
    categories: &[],
    auto_advance: false,
    show_explanations: true,
};

static HISTORY: TriviaModeConfig = TriviaModeConfig {
    name: "Poker History",
    description: "Iconic moments, famous hands, legendary players",
    questions_count: 10,
    time_limit: None,
    xp_base: 10,
    diamond_cost: 0,
    diamond_reward: 0,
    categories: &[
        Category::PokerHistory,
        Category::FamousHands,
        Category::PlayerProfiles,
    ],
    auto_advance: false,
    show_explanations: true,
};

static RULES: TriviaModeConfig = TriviaModeConfig {
    name: "Rules Quiz",
    description: "Test your understanding of official poker rules",
    questions_count: 10,
    time_limit: None,
    xp_base: 10,
    diamond_cost: 0,
    diamond_reward: 0,
    categories: &[Category::RuleKnowledge],
    auto_advance: false,
    show_explanations: true,
};

static PRO: TriviaModeConfig = TriviaModeConfig {
    name: "Pro Knowledge",
    description: "Strategy concepts, GTO basics, advanced trivia",
    questions_count: 10,
    time_limit: None,
    xp_base: 15,
    diamond_cost: 0,
    diamond_reward: 0,
    categories: &[Category::GtoTheory, Category::TournamentFacts],
    auto_advance: false,
    show_explanations: true,
};

static ARCADE: TriviaModeConfig = TriviaModeConfig {
    name: "Diamond Arcade",
    description: "High-speed trivia for Diamond rewards",
    questions_count: 10,
    time_limit: Some(60),
    xp_base: 5,
    diamond_cost: 10,
    diamond_reward: 100,
    categories: &[],
    auto_advance: true,
    show_explanations: false,
};

impl TriviaMode {
    pub const ALL: [TriviaMode; 5] = [
        TriviaMode::Daily,
        TriviaMode::History,
        TriviaMode::Rules,
        TriviaMode::Pro,
        TriviaMode::Arcade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriviaMode::Daily => "daily",
            TriviaMode::History => "history",
            TriviaMode::Rules => "rules",
            TriviaMode::Pro => "pro",
            TriviaMode::Arcade => "arcade",
        }
    }

    pub fn config(&self) -> &'static TriviaModeConfig {
        match self {
            TriviaMode::Daily => &DAILY,
            TriviaMode::History => &HISTORY,
            TriviaMode::Rules => &RULES,
            TriviaMode::Pro => &PRO,
            TriviaMode::Arcade => &ARCADE,
        }
    }
}

impl fmt::Display for TriviaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriviaMode {
    type Err = TriviaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriviaMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| TriviaError::UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_mode_key() {
        for mode in TriviaMode::ALL {
            assert_eq!(mode.as_str().parse::<TriviaMode>(), Ok(mode));
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert_eq!(
            "blitz".parse::<TriviaMode>(),
            Err(TriviaError::UnknownMode("blitz".to_string()))
        );
    }

    #[test]
    fn only_arcade_is_paid_and_timed() {
        for mode in TriviaMode::ALL {
            let config = mode.config();
            assert!(config.questions_count >= 1);
            if mode == TriviaMode::Arcade {
                assert_eq!(config.diamond_cost, 10);
                assert_eq!(config.diamond_reward, 100);
                assert_eq!(config.time_limit, Some(60));
                assert!(config.auto_advance);
                assert!(!config.show_explanations);
            } else {
                assert_eq!(config.diamond_cost, 0);
                assert_eq!(config.time_limit, None);
                assert!(!config.auto_advance);
            }
        }
    }

    #[test]
    fn daily_draws_a_single_question() {
        assert_eq!(TriviaMode::Daily.config().questions_count, 1);
        assert!(TriviaMode::Daily.config().categories.is_empty());
    }
}
