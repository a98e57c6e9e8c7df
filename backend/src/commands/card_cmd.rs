//! Card Commands
//!
//! Card creation and voting. There is no card edit or delete.

use super::{require_id, require_text};
use crate::domain::{Card, Category, Counter, DomainResult};
use crate::repository::ProjectRepository;

/// Add a card to a project's category
///
/// `category` accepts the stored tags (`toImprove`) and friendlier spellings
/// (`to-improve`).
pub async fn add_card(
    repo: &ProjectRepository,
    project_id: &str,
    category: &str,
    text: &str,
) -> DomainResult<(Category, Card)> {
    let project_id = require_id("project id", project_id)?;
    let category: Category = category.parse()?;
    let text = require_text("card text", text)?;

    let card = repo.add_card(&project_id, category, &text).await?;
    Ok((category, card))
}

/// Like a card, returning its new like count
pub async fn like_card(repo: &ProjectRepository, card_id: &str) -> DomainResult<u32> {
    let card_id = require_id("card id", card_id)?;
    repo.increment_counter(&card_id, Counter::Like).await
}

/// Dislike a card, returning its new dislike count
pub async fn dislike_card(repo: &ProjectRepository, card_id: &str) -> DomainResult<u32> {
    let card_id = require_id("card id", card_id)?;
    repo.increment_counter(&card_id, Counter::Dislike).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create_project, get_project};
    use crate::domain::DomainError;
    use crate::repository::MemoryStore;
    use std::sync::Arc;

    fn setup() -> ProjectRepository {
        ProjectRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_card_trims_text() {
        let repo = setup();
        let project = create_project(&repo, "Sprint 12").await.unwrap();

        let (category, card) = add_card(&repo, &project.id, "toImprove", "  Standups ran late ")
            .await
            .unwrap();

        assert_eq!(category, Category::ToImprove);
        assert_eq!(card.text, "Standups ran late");
        let stored = get_project(&repo, &project.id).await.unwrap();
        assert_eq!(stored.cards.to_improve.len(), 1);
    }

    #[tokio::test]
    async fn test_add_card_validation() {
        let repo = setup();
        let project = create_project(&repo, "Sprint 12").await.unwrap();

        assert!(matches!(
            add_card(&repo, &project.id, "toImprove", "   ").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            add_card(&repo, &project.id, "parkingLot", "text").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            add_card(&repo, "", "toImprove", "text").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_like_and_dislike() {
        let repo = setup();
        let project = create_project(&repo, "Votes").await.unwrap();
        let (_, card) = add_card(&repo, &project.id, "well", "Good demo").await.unwrap();

        assert_eq!(like_card(&repo, &card.id).await.unwrap(), 1);
        assert_eq!(like_card(&repo, &card.id).await.unwrap(), 2);
        assert_eq!(dislike_card(&repo, &card.id).await.unwrap(), 1);

        let stored = get_project(&repo, &project.id).await.unwrap();
        assert_eq!(stored.cards.what_went_well[0].likes, 2);
        assert_eq!(stored.cards.what_went_well[0].dislikes, 1);
    }
}
