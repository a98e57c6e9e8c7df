//! Project Repository Implementation
//!
//! Reshapes between flat `projects` / `cards` rows and nested `Project`s and
//! runs every operation against an injected `RemoteStore`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::changes::ChangeSubscription;
use super::traits::{RemoteStore, Repository};
use crate::domain::{assemble_projects, Card, CardRow, Category, Counter, DomainError, DomainResult, Project};

/// How counter increments reach the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterStrategy {
    /// Single server-side `counter = counter + 1`
    #[default]
    Atomic,
    /// Read the value, write back value + 1. Two clients incrementing from the
    /// same base both write base + 1 and one increment is lost.
    ReadModifyWrite,
}

/// Store adapter for projects and their cards
#[derive(Clone)]
pub struct ProjectRepository {
    store: Arc<dyn RemoteStore>,
    counter_strategy: CounterStrategy,
}

impl ProjectRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            counter_strategy: CounterStrategy::default(),
        }
    }

    pub fn with_counter_strategy(mut self, strategy: CounterStrategy) -> Self {
        self.counter_strategy = strategy;
        self
    }

    pub fn counter_strategy(&self) -> CounterStrategy {
        self.counter_strategy
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Get project by id, `NotFound` when the row is absent
    pub async fn get(&self, id: &str) -> DomainResult<Project> {
        self.find_by_id(&id.to_string())
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("project {}", id)))
    }

    /// Insert an empty project; the store assigns id and timestamp
    pub async fn create_project(&self, name: &str) -> DomainResult<Project> {
        let row = self.store.insert_project(name).await?;
        log::info!("created project {} ({})", row.id, row.name);
        Ok(Project::empty(row))
    }

    pub async fn rename(&self, id: &str, name: &str) -> DomainResult<()> {
        self.store.update_project_name(id, name).await
    }

    /// Insert one card row with a fresh id and zero counters
    pub async fn add_card(&self, project_id: &str, category: Category, text: &str) -> DomainResult<Card> {
        let card = Card::new(text);
        let row = self
            .store
            .insert_card(&CardRow::from_card(&card, project_id, category))
            .await?;
        log::debug!("added card {} to {}/{}", row.id, project_id, category);
        Ok(row.to_card())
    }

    /// Add one to a card's like or dislike counter, returning the new value
    pub async fn increment_counter(&self, card_id: &str, counter: Counter) -> DomainResult<u32> {
        match self.counter_strategy {
            CounterStrategy::Atomic => self.store.increment_card_counter(card_id, counter).await,
            CounterStrategy::ReadModifyWrite => self.increment_read_modify_write(card_id, counter).await,
        }
    }

    async fn increment_read_modify_write(&self, card_id: &str, counter: Counter) -> DomainResult<u32> {
        let current = self
            .store
            .select_card(card_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("card {}", card_id)))?
            .counter(counter);
        let next = current.saturating_add(1);
        self.store.set_card_counter(card_id, counter, next).await?;
        Ok(next)
    }

    /// Change notifications for one project's cards
    pub async fn subscribe(&self, project_id: &str) -> DomainResult<ChangeSubscription> {
        self.store.subscribe(project_id).await
    }

    /// Make the stored cards match `project`'s card set exactly
    async fn reconcile_cards(&self, project: &Project) -> DomainResult<()> {
        let existing = self.store.select_cards(Some(&project.id)).await?;
        let existing_ids: HashSet<&str> = existing.iter().map(|row| row.id.as_str()).collect();

        let wanted = project.card_rows();
        let wanted_ids: HashSet<&str> = wanted.iter().map(|row| row.id.as_str()).collect();

        let (mut updated, mut inserted, mut deleted) = (0usize, 0usize, 0usize);
        for row in &wanted {
            if existing_ids.contains(row.id.as_str()) {
                self.store.update_card(row).await?;
                updated += 1;
            } else {
                self.store.insert_card(row).await?;
                inserted += 1;
            }
        }
        for row in existing.iter().filter(|row| !wanted_ids.contains(row.id.as_str())) {
            self.store.delete_card(&row.id).await?;
            deleted += 1;
        }

        log::debug!(
            "reconciled project {}: {} updated, {} inserted, {} deleted",
            project.id,
            updated,
            inserted,
            deleted
        );
        Ok(())
    }
}

#[async_trait]
impl Repository<Project> for ProjectRepository {
    /// Insert `entity.name` as a new project, then any cards it carries
    async fn create(&self, entity: &Project) -> DomainResult<Project> {
        let created = self.create_project(&entity.name).await?;
        if entity.cards.is_empty() {
            return Ok(created);
        }

        let with_cards = Project {
            cards: entity.cards.clone(),
            ..created
        };
        self.reconcile_cards(&with_cards).await?;
        self.get(&with_cards.id).await
    }

    async fn find_by_id(&self, id: &String) -> DomainResult<Option<Project>> {
        let Some(row) = self.store.select_project(id).await? else {
            return Ok(None);
        };
        let cards = self.store.select_cards(Some(id)).await?;
        Ok(Some(Project::from_rows(row, cards)))
    }

    async fn list(&self) -> DomainResult<Vec<Project>> {
        let projects = self.store.select_projects().await?;
        let cards = self.store.select_cards(None).await?;
        Ok(assemble_projects(projects, cards))
    }

    /// Whole-project write: name plus an id-set diff of the cards
    ///
    /// Costlier and more race-prone than the per-card operations; those are
    /// preferred for interactive edits.
    async fn update(&self, entity: &Project) -> DomainResult<Project> {
        self.store.update_project_name(&entity.id, &entity.name).await?;
        self.reconcile_cards(entity).await?;
        self.get(&entity.id).await
    }

    /// Delete the project row; the store cascades to its cards
    async fn delete(&self, id: &String) -> DomainResult<()> {
        self.store.delete_project(id).await?;
        log::info!("deleted project {}", id);
        Ok(())
    }
}
