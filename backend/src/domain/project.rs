//! Project Entity
//!
//! A named retrospective with its cards bucketed by category. Also holds the
//! reshaping between flat table rows and the nested shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::card::{Card, CardRow};
use super::category::Category;
use super::entity::Entity;

/// Cards of one project, one list per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedCards {
    #[serde(default)]
    pub what_went_well: Vec<Card>,
    #[serde(default)]
    pub to_improve: Vec<Card>,
    #[serde(default)]
    pub action_items: Vec<Card>,
}

impl CategorizedCards {
    pub fn get(&self, category: Category) -> &[Card] {
        match category {
            Category::WhatWentWell => &self.what_went_well,
            Category::ToImprove => &self.to_improve,
            Category::ActionItems => &self.action_items,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<Card> {
        match category {
            Category::WhatWentWell => &mut self.what_went_well,
            Category::ToImprove => &mut self.to_improve,
            Category::ActionItems => &mut self.action_items,
        }
    }

    /// All cards in board order, tagged with their category
    pub fn iter(&self) -> impl Iterator<Item = (Category, &Card)> + '_ {
        Category::ALL
            .into_iter()
            .flat_map(move |category| self.get(category).iter().map(move |card| (category, card)))
    }

    pub fn find_mut(&mut self, card_id: &str) -> Option<&mut Card> {
        self.what_went_well
            .iter_mut()
            .chain(self.to_improve.iter_mut())
            .chain(self.action_items.iter_mut())
            .find(|card| card.id == card_id)
    }

    pub fn len(&self) -> usize {
        self.what_went_well.len() + self.to_improve.len() + self.action_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Card counts shown under the board and in document exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub total_cards: usize,
    pub per_category: Vec<(Category, usize)>,
    pub total_likes: u64,
    pub total_dislikes: u64,
}

/// A retrospective project in nested form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cards: CategorizedCards,
}

impl Project {
    /// Empty project for a freshly inserted row
    pub fn empty(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            cards: CategorizedCards::default(),
        }
    }

    /// Assemble a project from its row and card rows
    ///
    /// Rows for another project and rows with an unrecognized category tag are
    /// dropped. Row order is kept within each category.
    pub fn from_rows(row: ProjectRow, card_rows: impl IntoIterator<Item = CardRow>) -> Self {
        let mut project = Self::empty(row);
        for card_row in card_rows {
            if card_row.project_id != project.id {
                continue;
            }
            match card_row.category() {
                Some(category) => project.cards.get_mut(category).push(card_row.to_card()),
                None => log::debug!(
                    "dropping card {} with unknown swimlane '{}'",
                    card_row.id,
                    card_row.swimlane
                ),
            }
        }
        project
    }

    pub fn row(&self) -> ProjectRow {
        ProjectRow {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
        }
    }

    /// Flatten back to table rows in board order
    pub fn card_rows(&self) -> Vec<CardRow> {
        self.cards
            .iter()
            .map(|(category, card)| CardRow::from_card(card, &self.id, category))
            .collect()
    }

    pub fn summary(&self) -> BoardSummary {
        let per_category = Category::ALL
            .into_iter()
            .map(|category| (category, self.cards.get(category).len()))
            .collect();
        let (total_likes, total_dislikes) = self
            .cards
            .iter()
            .fold((0u64, 0u64), |(l, d), (_, card)| (l + card.likes as u64, d + card.dislikes as u64));

        BoardSummary {
            total_cards: self.cards.len(),
            per_category,
            total_likes,
            total_dislikes,
        }
    }
}

impl Entity for Project {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Row in the `projects` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Group all card rows under their projects, keeping the project order
pub fn assemble_projects(project_rows: Vec<ProjectRow>, card_rows: Vec<CardRow>) -> Vec<Project> {
    let mut by_project: HashMap<String, Vec<CardRow>> = HashMap::new();
    for card_row in card_rows {
        by_project.entry(card_row.project_id.clone()).or_default().push(card_row);
    }

    project_rows
        .into_iter()
        .map(|row| {
            let cards = by_project.remove(&row.id).unwrap_or_default();
            Project::from_rows(row, cards)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn project_row(id: &str) -> ProjectRow {
        ProjectRow {
            id: id.to_string(),
            name: format!("Project {}", id),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    fn card_row(id: &str, project_id: &str, swimlane: &str, likes: u32) -> CardRow {
        CardRow {
            id: id.to_string(),
            project_id: project_id.to_string(),
            text: format!("card {}", id),
            likes,
            dislikes: likes / 2,
            swimlane: swimlane.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    fn tuples(rows: &[CardRow]) -> Vec<(String, String, u32, u32, DateTime<Utc>, String)> {
        let mut out: Vec<_> = rows
            .iter()
            .map(|r| (r.id.clone(), r.text.clone(), r.likes, r.dislikes, r.created_at, r.swimlane.clone()))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_group_then_flatten_is_identity() {
        let rows = vec![
            card_row("c1", "p1", "toImprove", 1),
            card_row("c2", "p1", "whatWentWell", 4),
            card_row("c3", "p1", "actionItems", 0),
            card_row("c4", "p1", "toImprove", 7),
        ];

        let project = Project::from_rows(project_row("p1"), rows.clone());

        assert_eq!(tuples(&project.card_rows()), tuples(&rows));
    }

    #[test]
    fn test_unknown_category_is_dropped() {
        let rows = vec![
            card_row("c1", "p1", "whatWentWell", 0),
            card_row("c2", "p1", "parkingLot", 0),
            card_row("c3", "p1", "", 0),
        ];

        let project = Project::from_rows(project_row("p1"), rows);

        assert_eq!(project.cards.len(), 1);
        assert_eq!(project.cards.what_went_well[0].id, "c1");
    }

    #[test]
    fn test_rows_of_other_projects_are_ignored() {
        let project = Project::from_rows(project_row("p1"), vec![card_row("c1", "p2", "toImprove", 0)]);
        assert!(project.cards.is_empty());
    }

    #[test]
    fn test_assemble_keeps_project_order() {
        let projects = assemble_projects(
            vec![project_row("b"), project_row("a")],
            vec![card_row("c1", "a", "toImprove", 0), card_row("c2", "b", "actionItems", 0)],
        );

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].id, "b");
        assert_eq!(projects[0].cards.action_items.len(), 1);
        assert_eq!(projects[1].cards.to_improve.len(), 1);
    }

    #[test]
    fn test_row_order_kept_within_category() {
        let project = Project::from_rows(
            project_row("p1"),
            vec![card_row("c2", "p1", "toImprove", 0), card_row("c1", "p1", "toImprove", 0)],
        );
        let ids: Vec<_> = project.cards.to_improve.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[test]
    fn test_summary_counts() {
        let project = Project::from_rows(
            project_row("p1"),
            vec![
                card_row("c1", "p1", "toImprove", 2),
                card_row("c2", "p1", "toImprove", 4),
                card_row("c3", "p1", "actionItems", 1),
            ],
        );

        let summary = project.summary();
        assert_eq!(summary.total_cards, 3);
        assert_eq!(
            summary.per_category,
            vec![(Category::WhatWentWell, 0), (Category::ToImprove, 2), (Category::ActionItems, 1)]
        );
        assert_eq!(summary.total_likes, 7);
        assert_eq!(summary.total_dislikes, 3);
    }

    #[test]
    fn test_legacy_json_shape_parses() {
        let json = r#"{
            "id": "1712000000000",
            "name": "Sprint 12",
            "createdAt": "2024-04-01T10:00:00.000Z",
            "cards": {
                "whatWentWell": [{"id": "a", "text": "Demo went well", "likes": 2, "dislikes": 0, "createdAt": "2024-04-01T10:05:00.000Z"}],
                "toImprove": [],
                "actionItems": []
            }
        }"#;

        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.name, "Sprint 12");
        assert_eq!(project.cards.what_went_well[0].likes, 2);
    }
}
