//! Terminal rendering of boards and project lists

use std::fmt::Write;

use crate::board::SyncState;
use retro_store_lib::{Category, Project};

pub fn project_list(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects yet. Create one with `retro-board create <name>`.\n".to_string();
    }

    let mut out = String::new();
    for project in projects {
        let _ = writeln!(
            out,
            "{}  {}  ({} cards, created {})",
            project.id,
            project.name,
            project.cards.len(),
            project.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

pub fn board(project: &Project) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", project.name);
    let _ = writeln!(out, "{}", "=".repeat(project.name.chars().count().max(1)));

    for category in Category::ALL {
        let cards = project.cards.get(category);
        let _ = writeln!(out, "\n{} ({})", category.label(), cards.len());
        if cards.is_empty() {
            let _ = writeln!(out, "  -");
        }
        for card in cards {
            let _ = writeln!(out, "  [+{} -{}] {}", card.likes, card.dislikes, card.text);
            let _ = writeln!(out, "      {}", card.id);
        }
    }

    let summary = project.summary();
    let _ = writeln!(
        out,
        "\n{} cards, {} likes, {} dislikes",
        summary.total_cards, summary.total_likes, summary.total_dislikes
    );
    out
}

pub fn sync_state(state: &SyncState) -> String {
    match state {
        SyncState::Idle => "idle".to_string(),
        SyncState::Loading => "refreshing...".to_string(),
        SyncState::Ready => "live".to_string(),
        SyncState::Error(message) => format!("out of date ({})", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures;

    #[test]
    fn test_board_lists_every_category() {
        let text = board(&fixtures::sprint());

        assert!(text.starts_with("Sprint 12\n=========\n"));
        assert!(text.contains("What Went Well (1)\n  [+3 -0] Demo went well"));
        assert!(text.contains("Action Items (0)\n  -"));
        assert!(text.contains("2 cards, 4 likes, 2 dislikes"));
    }

    #[test]
    fn test_empty_project_list() {
        assert!(project_list(&[]).starts_with("No projects yet"));
    }
}
