use serde::{Deserialize, Serialize};

use super::TriviaError;

/// Known question categories. Stored questions may carry other category strings;
/// those are tolerated and displayed as "General".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PokerHistory,
    FamousHands,
    GtoTheory,
    PlayerProfiles,
    TournamentFacts,
    RuleKnowledge,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::PokerHistory,
        Category::FamousHands,
        Category::GtoTheory,
        Category::PlayerProfiles,
        Category::TournamentFacts,
        Category::RuleKnowledge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PokerHistory => "poker_history",
            Category::FamousHands => "famous_hands",
            Category::GtoTheory => "gto_theory",
            Category::PlayerProfiles => "player_profiles",
            Category::TournamentFacts => "tournament_facts",
            Category::RuleKnowledge => "rule_knowledge",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::PokerHistory => "Poker History",
            Category::FamousHands => "Famous Hands",
            Category::GtoTheory => "GTO Theory",
            Category::PlayerProfiles => "Player Profiles",
            Category::TournamentFacts => "Tournament Facts",
            Category::RuleKnowledge => "Rules & Etiquette",
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaQuestion {
    pub id: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl TriviaQuestion {
    pub fn validate(&self) -> Result<(), TriviaError> {
        if self.options.len() < 2 {
            return Err(TriviaError::InvalidQuestion {
                id: self.id.clone(),
                reason: format!("expected at least 2 options, got {}", self.options.len()),
            });
        }
        if self.correct_index >= self.options.len() {
            return Err(TriviaError::InvalidQuestion {
                id: self.id.clone(),
                reason: format!(
                    "correct_index {} out of range for {} options",
                    self.correct_index,
                    self.options.len()
                ),
            });
        }
        Ok(())
    }

    pub fn is_correct(&self, answer_index: usize) -> bool {
        answer_index == self.correct_index
    }

    pub fn known_category(&self) -> Option<Category> {
        Category::from_key(&self.category)
    }

    pub fn category_name(&self) -> &'static str {
        self.known_category()
            .map(|c| c.display_name())
            .unwrap_or("General")
    }
}
