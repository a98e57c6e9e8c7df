//! Card Entity
//!
//! A piece of feedback text with like/dislike counters. `CardRow` is the flat
//! shape stored in the `cards` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::Category;
use super::entity::Entity;

/// Which counter an increment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Counter {
    Like,
    Dislike,
}

impl Counter {
    /// Column holding this counter
    pub fn column(&self) -> &'static str {
        match self {
            Counter::Like => "likes",
            Counter::Dislike => "dislikes",
        }
    }
}

/// A card as the board sees it (category implied by its bucket)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub text: String,
    pub likes: u32,
    pub dislikes: u32,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Fresh card with a generated id and zero counters
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            likes: 0,
            dislikes: 0,
            created_at: Utc::now(),
        }
    }

    pub fn counter(&self, counter: Counter) -> u32 {
        match counter {
            Counter::Like => self.likes,
            Counter::Dislike => self.dislikes,
        }
    }

    /// Local +1, used for optimistic updates
    pub fn bump(&mut self, counter: Counter) {
        match counter {
            Counter::Like => self.likes = self.likes.saturating_add(1),
            Counter::Dislike => self.dislikes = self.dislikes.saturating_add(1),
        }
    }
}

impl Entity for Card {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Row in the `cards` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRow {
    pub id: String,
    pub project_id: String,
    pub text: String,
    pub likes: u32,
    pub dislikes: u32,
    /// Raw category tag; may hold values this build doesn't know
    pub swimlane: String,
    pub created_at: DateTime<Utc>,
}

impl CardRow {
    pub fn from_card(card: &Card, project_id: &str, category: Category) -> Self {
        Self {
            id: card.id.clone(),
            project_id: project_id.to_string(),
            text: card.text.clone(),
            likes: card.likes,
            dislikes: card.dislikes,
            swimlane: category.as_tag().to_string(),
            created_at: card.created_at,
        }
    }

    pub fn category(&self) -> Option<Category> {
        Category::from_tag(&self.swimlane)
    }

    pub fn counter(&self, counter: Counter) -> u32 {
        match counter {
            Counter::Like => self.likes,
            Counter::Dislike => self.dislikes,
        }
    }

    pub fn to_card(&self) -> Card {
        Card {
            id: self.id.clone(),
            text: self.text.clone(),
            likes: self.likes,
            dislikes: self.dislikes,
            created_at: self.created_at,
        }
    }
}
