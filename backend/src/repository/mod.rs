//! Repository Layer
//!
//! Data access abstractions and implementations.

mod changes;
mod db;
mod memory;
mod project_repo;
mod rest;
mod traits;


pub use changes::{ChangeEvent, ChangeHub, ChangeKind, ChangeSubscription, Table};
pub use db::SqliteStore;
pub use memory::MemoryStore;
pub use project_repo::{CounterStrategy, ProjectRepository};
pub use rest::RestStore;
pub use traits::{RemoteStore, Repository};
