//! Board console
//!
//! Lines typed while `watch` is running. Each line is parsed with clap and
//! applied to the open board, so adds and votes show up locally before the
//! store confirms them.

use clap::{Parser, Subcommand};

use crate::board::BoardSession;
use crate::render;
use retro_store_lib::{Category, Counter};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true, disable_help_flag = true)]
struct BoardLine {
    #[command(subcommand)]
    action: BoardAction,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum BoardAction {
    /// add <category> <text...>
    Add {
        category: Category,
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    Like { card: String },
    Dislike { card: String },
    /// Fetch the board again
    Reload,
    Status,
    #[command(alias = "exit")]
    Quit,
}

pub enum Outcome {
    Continue(Option<String>),
    Quit,
}

/// `Ok(None)` for a blank line
pub fn parse(line: &str) -> Result<Option<BoardAction>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    BoardLine::try_parse_from(words)
        .map(|parsed| Some(parsed.action))
        .map_err(|e| e.render().to_string().trim_end().to_string())
}

/// Failed adds and votes were already reported as notices by the board
pub async fn apply(board: &BoardSession, action: BoardAction, live: bool) -> Outcome {
    let output = match action {
        BoardAction::Add { category, text } => board
            .add_card(category, &text.join(" "))
            .await
            .ok()
            .map(|card| format!("{} (added to {})", card.id, category.label())),
        BoardAction::Like { card } => vote(board, &card, Counter::Like).await,
        BoardAction::Dislike { card } => vote(board, &card, Counter::Dislike).await,
        BoardAction::Reload => {
            board.reload().await;
            None
        }
        BoardAction::Status => Some(format!(
            "{}, live updates {}",
            render::sync_state(&board.state()),
            if live { "on" } else { "stopped" }
        )),
        BoardAction::Quit => return Outcome::Quit,
    };
    Outcome::Continue(output)
}

async fn vote(board: &BoardSession, card: &str, counter: Counter) -> Option<String> {
    board
        .increment(card, counter)
        .await
        .ok()
        .map(|value| format!("{} {}", value, counter.column()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice;
    use retro_store_lib::{MemoryStore, ProjectRepository};
    use std::sync::Arc;

    async fn open_board() -> (ProjectRepository, BoardSession, notice::NoticeReceiver) {
        let repo = ProjectRepository::new(Arc::new(MemoryStore::new()));
        let project = repo.create_project("Console").await.unwrap();
        let (tx, rx) = notice::channel();
        let board = BoardSession::open(repo.clone(), &project.id, tx).await.unwrap();
        (repo, board, rx)
    }

    fn output(outcome: Outcome) -> Option<String> {
        match outcome {
            Outcome::Continue(output) => output,
            Outcome::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn test_parse_add_joins_text() {
        let action = parse("add toImprove standups  run long").unwrap().unwrap();
        assert_eq!(
            action,
            BoardAction::Add {
                category: Category::ToImprove,
                text: vec!["standups".into(), "run".into(), "long".into()],
            }
        );
    }

    #[test]
    fn test_parse_blank_and_invalid_lines() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("exit").unwrap(), Some(BoardAction::Quit));
        assert!(parse("add parkingLot idea").unwrap_err().contains("parkingLot"));
        assert!(parse("like").is_err());
        assert!(parse("shout hello").is_err());
    }

    #[tokio::test]
    async fn test_add_then_like_through_board() {
        let (_, board, _rx) = open_board().await;

        let added = output(apply(&board, parse("add well Shipped it").unwrap().unwrap(), true).await);
        let card_id = board.project().unwrap().cards.what_went_well[0].id.clone();
        assert!(added.unwrap().starts_with(&card_id));

        let liked = output(apply(&board, BoardAction::Like { card: card_id }, true).await);
        assert_eq!(liked.as_deref(), Some("1 likes"));
        assert_eq!(board.project().unwrap().cards.what_went_well[0].likes, 1);
    }

    #[tokio::test]
    async fn test_failed_vote_prints_nothing_and_notifies() {
        let (_, board, mut rx) = open_board().await;

        let out = output(apply(&board, BoardAction::Dislike { card: "missing".into() }, true).await);

        assert_eq!(out, None);
        assert!(rx.try_recv().unwrap().message.contains("vote"));
    }

    #[tokio::test]
    async fn test_status_and_quit() {
        let (_, board, _rx) = open_board().await;

        let status = output(apply(&board, BoardAction::Status, false).await);
        assert_eq!(status.as_deref(), Some("live, live updates stopped"));
        assert!(matches!(apply(&board, BoardAction::Quit, true).await, Outcome::Quit));
    }
}
