//! Project Commands
//!
//! Project CRUD plus import of legacy JSON snapshots.

use serde::{Deserialize, Serialize};

use super::{require_id, require_text};
use crate::domain::{Category, DomainError, DomainResult, Project};
use crate::repository::{ProjectRepository, Repository};

/// Create a new project
pub async fn create_project(repo: &ProjectRepository, name: &str) -> DomainResult<Project> {
    let name = require_text("project name", name)?;
    repo.create_project(&name).await
}

/// List all projects, newest first
pub async fn list_projects(repo: &ProjectRepository) -> DomainResult<Vec<Project>> {
    repo.list().await
}

/// Get project by ID
pub async fn get_project(repo: &ProjectRepository, id: &str) -> DomainResult<Project> {
    let id = require_id("project id", id)?;
    repo.get(&id).await
}

/// Rename a project
pub async fn rename_project(repo: &ProjectRepository, id: &str, name: &str) -> DomainResult<Project> {
    let id = require_id("project id", id)?;
    let name = require_text("project name", name)?;
    repo.rename(&id, &name).await?;
    repo.get(&id).await
}

/// Delete project (its cards go with it)
pub async fn delete_project(repo: &ProjectRepository, id: &str) -> DomainResult<()> {
    let id = require_id("project id", id)?;
    repo.delete(&id).await
}

/// Either a whole saved project list or a single exported project
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Many(Vec<Project>),
    One(Box<Project>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub cards: usize,
    pub skipped_cards: usize,
}

/// Import projects from a JSON snapshot in the nested project format
///
/// Projects whose id already exists are overwritten through the whole-project
/// update; the rest are created fresh and receive new card ids.
pub async fn import_projects(repo: &ProjectRepository, json: &str) -> DomainResult<ImportReport> {
    let snapshot: Snapshot = serde_json::from_str(json)
        .map_err(|e| DomainError::Validation(format!("not a project snapshot: {}", e)))?;
    let projects = match snapshot {
        Snapshot::Many(projects) => projects,
        Snapshot::One(project) => vec![*project],
    };

    let mut report = ImportReport::default();
    for mut project in projects {
        project.name = require_text("project name", &project.name)?;
        report.skipped_cards += drop_blank_cards(&mut project);

        // Ids from the old local format aren't UUIDs and can't exist remotely
        let existing = if uuid::Uuid::parse_str(&project.id).is_ok() {
            repo.find_by_id(&project.id).await?
        } else {
            None
        };

        let saved = match existing {
            Some(_) => {
                report.updated += 1;
                repo.update(&project).await?
            }
            None => {
                for category in Category::ALL {
                    for card in project.cards.get_mut(category).iter_mut() {
                        card.id = uuid::Uuid::new_v4().to_string();
                    }
                }
                report.created += 1;
                repo.create(&project).await?
            }
        };
        report.cards += saved.cards.len();
        log::info!("imported project {} ({} cards)", saved.id, saved.cards.len());
    }

    Ok(report)
}

fn drop_blank_cards(project: &mut Project) -> usize {
    let mut dropped = 0;
    for category in Category::ALL {
        let cards = project.cards.get_mut(category);
        let before = cards.len();
        cards.retain(|card| !card.text.trim().is_empty());
        for card in cards.iter_mut() {
            card.text = card.text.trim().to_string();
        }
        dropped += before - cards.len();
    }
    dropped
}
