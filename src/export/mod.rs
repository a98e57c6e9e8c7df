//! Board Export
//!
//! Renders a project to CSV, Markdown, HTML or the nested JSON form and writes
//! it next to other exports as `<name>_retrospective.<ext>`.

mod csv;
mod document;

pub use self::csv::to_csv;
pub use self::document::{to_html, to_markdown};

use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

use retro_store_lib::{DomainError, Project};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize project: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ExportError> for DomainError {
    fn from(e: ExportError) -> Self {
        DomainError::Export(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Markdown,
    Html,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
        }
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]").expect("valid file name pattern"))
}

/// `Sprint 12` -> `Sprint_12_retrospective.csv`
pub fn file_name(project_name: &str, format: ExportFormat) -> String {
    format!(
        "{}_retrospective.{}",
        unsafe_chars().replace_all(project_name, "_"),
        format.extension()
    )
}

pub fn render(project: &Project, format: ExportFormat, exported_at: DateTime<Utc>) -> Result<String, ExportError> {
    Ok(match format {
        ExportFormat::Csv => to_csv(project),
        ExportFormat::Markdown => to_markdown(project, exported_at),
        ExportFormat::Html => to_html(project, exported_at),
        ExportFormat::Json => serde_json::to_string_pretty(project)?,
    })
}

/// Render and write into `dir`, returning the written path
pub fn write_export(project: &Project, format: ExportFormat, dir: &Path) -> Result<PathBuf, ExportError> {
    let contents = render(project, format, Utc::now())?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name(&project.name, format));
    std::fs::write(&path, contents)?;
    log::info!("exported {} as {:?} to {}", project.id, format, path.display());
    Ok(path)
}
