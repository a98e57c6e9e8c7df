//! In-memory Store
//!
//! Ephemeral `RemoteStore` used by tests and scratch sessions. Mirrors the SQLite
//! semantics (newest-first projects, cascading delete, foreign key check on card
//! insert) and adds knobs for exercising failure and interleaving paths:
//!
//! - `fail_next` makes the next operation return a store error
//! - `hold` / `release` park every operation until released
//! - `park_card_reads` lets card reads complete, then parks them before they
//!   return, until `release`
//! - `interleaved` yields to the scheduler at the start of every operation

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::changes::{ChangeEvent, ChangeHub, ChangeKind, ChangeSubscription};
use super::traits::RemoteStore;
use crate::domain::{CardRow, Counter, DomainError, DomainResult, ProjectRow};

#[derive(Default)]
struct MemoryInner {
    /// Insertion order
    projects: Vec<ProjectRow>,
    cards: Vec<CardRow>,
    fail_next: Option<String>,
}

/// Thread-safe in-memory tables
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    hub: ChangeHub,
    gate: watch::Sender<bool>,
    card_read_gate: watch::Sender<bool>,
    yield_between_ops: bool,
    project_fetches: AtomicUsize,
    card_reads: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        let (card_read_gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::default())),
            hub: ChangeHub::new(),
            gate,
            card_read_gate,
            yield_between_ops: false,
            project_fetches: AtomicUsize::new(0),
            card_reads: AtomicUsize::new(0),
        }
    }

    /// Store whose operations each start by yielding, so concurrent callers
    /// on one task interleave at every store call
    pub fn interleaved() -> Self {
        Self {
            yield_between_ops: true,
            ..Self::new()
        }
    }

    /// Make the next operation fail with a store error
    pub async fn fail_next(&self, message: &str) {
        self.inner.lock().await.fail_next = Some(message.to_string());
    }

    /// Park all operations until `release`
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let card reads take their rows, then park them until `release`
    pub fn park_card_reads(&self) {
        self.card_read_gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
        self.card_read_gate.send_replace(true);
    }

    /// Number of single-project fetches served so far
    pub fn project_fetches(&self) -> usize {
        self.project_fetches.load(Ordering::SeqCst)
    }

    /// Number of card reads that have taken their rows
    pub fn card_reads(&self) -> usize {
        self.card_reads.load(Ordering::SeqCst)
    }

    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    async fn enter(&self) -> DomainResult<tokio::sync::MutexGuard<'_, MemoryInner>> {
        if self.yield_between_ops {
            tokio::task::yield_now().await;
        }

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| DomainError::Store("memory store closed".into()))?;

        let mut inner = self.inner.lock().await;
        if let Some(message) = inner.fail_next.take() {
            return Err(DomainError::Store(message));
        }
        Ok(inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn select_projects(&self) -> DomainResult<Vec<ProjectRow>> {
        let inner = self.enter().await?;
        let mut rows: Vec<ProjectRow> = inner.projects.iter().rev().cloned().collect();
        // Stable: ties stay newest-inserted first
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn select_project(&self, id: &str) -> DomainResult<Option<ProjectRow>> {
        let inner = self.enter().await?;
        self.project_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(inner.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_project(&self, name: &str) -> DomainResult<ProjectRow> {
        let row = ProjectRow {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        {
            let mut inner = self.enter().await?;
            inner.projects.push(row.clone());
        }
        self.hub.publish(ChangeEvent::project(&row.id, ChangeKind::Insert));
        Ok(row)
    }

    async fn update_project_name(&self, id: &str, name: &str) -> DomainResult<()> {
        {
            let mut inner = self.enter().await?;
            let project = inner
                .projects
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| DomainError::NotFound(format!("project {}", id)))?;
            project.name = name.to_string();
        }
        self.hub.publish(ChangeEvent::project(id, ChangeKind::Update));
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> DomainResult<()> {
        {
            let mut inner = self.enter().await?;
            inner.projects.retain(|p| p.id != id);
            inner.cards.retain(|c| c.project_id != id);
        }
        self.hub.publish(ChangeEvent::cards(id, ChangeKind::Delete));
        Ok(())
    }

    async fn select_cards(&self, project_id: Option<&str>) -> DomainResult<Vec<CardRow>> {
        let rows: Vec<CardRow> = {
            let inner = self.enter().await?;
            inner
                .cards
                .iter()
                .filter(|c| project_id.map_or(true, |pid| c.project_id == pid))
                .cloned()
                .collect()
        };
        self.card_reads.fetch_add(1, Ordering::SeqCst);

        let mut parked = self.card_read_gate.subscribe();
        parked
            .wait_for(|open| *open)
            .await
            .map_err(|_| DomainError::Store("memory store closed".into()))?;
        Ok(rows)
    }

    async fn select_card(&self, id: &str) -> DomainResult<Option<CardRow>> {
        let inner = self.enter().await?;
        Ok(inner.cards.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_card(&self, row: &CardRow) -> DomainResult<CardRow> {
        {
            let mut inner = self.enter().await?;
            if !inner.projects.iter().any(|p| p.id == row.project_id) {
                return Err(DomainError::Store(format!(
                    "FOREIGN KEY constraint failed: project {}",
                    row.project_id
                )));
            }
            if inner.cards.iter().any(|c| c.id == row.id) {
                return Err(DomainError::Store(format!("UNIQUE constraint failed: cards.id {}", row.id)));
            }
            inner.cards.push(row.clone());
        }
        self.hub.publish(ChangeEvent::cards(&row.project_id, ChangeKind::Insert));
        Ok(row.clone())
    }

    async fn update_card(&self, row: &CardRow) -> DomainResult<()> {
        let project_id = {
            let mut inner = self.enter().await?;
            let card = inner
                .cards
                .iter_mut()
                .find(|c| c.id == row.id)
                .ok_or_else(|| DomainError::NotFound(format!("card {}", row.id)))?;
            card.text = row.text.clone();
            card.likes = row.likes;
            card.dislikes = row.dislikes;
            card.swimlane = row.swimlane.clone();
            card.project_id.clone()
        };
        self.hub.publish(ChangeEvent::cards(&project_id, ChangeKind::Update));
        Ok(())
    }

    async fn set_card_counter(&self, id: &str, counter: Counter, value: u32) -> DomainResult<()> {
        let project_id = {
            let mut inner = self.enter().await?;
            let card = inner
                .cards
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| DomainError::NotFound(format!("card {}", id)))?;
            match counter {
                Counter::Like => card.likes = value,
                Counter::Dislike => card.dislikes = value,
            }
            card.project_id.clone()
        };
        self.hub.publish(ChangeEvent::cards(&project_id, ChangeKind::Update));
        Ok(())
    }

    async fn increment_card_counter(&self, id: &str, counter: Counter) -> DomainResult<u32> {
        let (value, project_id) = {
            let mut inner = self.enter().await?;
            let card = inner
                .cards
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| DomainError::NotFound(format!("card {}", id)))?;
            let slot = match counter {
                Counter::Like => &mut card.likes,
                Counter::Dislike => &mut card.dislikes,
            };
            *slot = slot
                .checked_add(1)
                .ok_or_else(|| DomainError::Store(format!("{} counter overflow on card {}", counter.column(), id)))?;
            (*slot, card.project_id.clone())
        };
        self.hub.publish(ChangeEvent::cards(&project_id, ChangeKind::Update));
        Ok(value)
    }

    async fn delete_card(&self, id: &str) -> DomainResult<()> {
        let removed = {
            let mut inner = self.enter().await?;
            let position = inner.cards.iter().position(|c| c.id == id);
            position.map(|idx| inner.cards.remove(idx))
        };
        if let Some(card) = removed {
            self.hub.publish(ChangeEvent::cards(&card.project_id, ChangeKind::Delete));
        }
        Ok(())
    }

    async fn subscribe(&self, project_id: &str) -> DomainResult<ChangeSubscription> {
        Ok(self.hub.subscribe(project_id))
    }
}
