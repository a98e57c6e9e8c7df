//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has no storage dependencies.

mod card;
mod category;
mod entity;
mod project;

pub use card::{Card, CardRow, Counter};
pub use category::Category;
pub use entity::{DomainError, DomainResult, Entity};
pub use project::{assemble_projects, BoardSummary, CategorizedCards, Project, ProjectRow};
