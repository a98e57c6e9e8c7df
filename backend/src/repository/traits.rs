//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! `RemoteStore` is the row-level table API a backend provides; `Repository`
//! is the entity-level CRUD contract built on top of it.

use async_trait::async_trait;

use super::changes::ChangeSubscription;
use crate::domain::{CardRow, Counter, DomainResult, Entity, ProjectRow};

/// Core repository trait for CRUD operations
///
/// Generic over any Entity type.
/// All operations are async to support various backends.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Create a new entity
    async fn create(&self, entity: &T) -> DomainResult<T>;

    /// Find entity by ID
    async fn find_by_id(&self, id: &T::Id) -> DomainResult<Option<T>>;

    /// List all entities
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Delete entity by ID
    async fn delete(&self, id: &T::Id) -> DomainResult<()>;
}

/// Table-level access to the `projects` and `cards` tables
///
/// Implementations publish every successful mutation to their change hub.
/// Failures come back as `DomainError::Store` (or `NotFound` where noted)
/// and are never retried here.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short name for logs
    fn backend_name(&self) -> &'static str;

    /// All project rows, newest first
    async fn select_projects(&self) -> DomainResult<Vec<ProjectRow>>;

    async fn select_project(&self, id: &str) -> DomainResult<Option<ProjectRow>>;

    /// Insert a project; the store assigns id and timestamp
    async fn insert_project(&self, name: &str) -> DomainResult<ProjectRow>;

    /// `NotFound` if no such project
    async fn update_project_name(&self, id: &str, name: &str) -> DomainResult<()>;

    /// Delete a project; its cards go with it (cascade)
    async fn delete_project(&self, id: &str) -> DomainResult<()>;

    /// Card rows, of one project or all, oldest first
    async fn select_cards(&self, project_id: Option<&str>) -> DomainResult<Vec<CardRow>>;

    async fn select_card(&self, id: &str) -> DomainResult<Option<CardRow>>;

    async fn insert_card(&self, row: &CardRow) -> DomainResult<CardRow>;

    /// Overwrite text, counters and swimlane; `NotFound` if no such card
    async fn update_card(&self, row: &CardRow) -> DomainResult<()>;

    /// Plain write of a counter value; `NotFound` if no such card
    async fn set_card_counter(&self, id: &str, counter: Counter, value: u32) -> DomainResult<()>;

    /// Server-side `counter = counter + 1`, returning the new value
    async fn increment_card_counter(&self, id: &str, counter: Counter) -> DomainResult<u32>;

    async fn delete_card(&self, id: &str) -> DomainResult<()>;

    /// Card changes for one project until the subscription is dropped
    async fn subscribe(&self, project_id: &str) -> DomainResult<ChangeSubscription>;
}
