//! Retro Board Store
//!
//! Layered architecture:
//! - domain: Projects, cards and the category vocabulary
//! - repository: Row-level stores and the project adapter over them
//! - commands: Validated entry points used by clients
//! - config: Backend selection persisted in the data directory

pub mod commands;
pub mod config;
pub mod domain;
pub mod repository;

pub use config::{AppConfig, BackendConfig};
pub use domain::{
    BoardSummary, Card, CardRow, CategorizedCards, Category, Counter, DomainError, DomainResult, Project, ProjectRow,
};
pub use repository::{
    ChangeEvent, ChangeKind, ChangeSubscription, CounterStrategy, MemoryStore, ProjectRepository, RemoteStore,
    Repository, RestStore, SqliteStore,
};
