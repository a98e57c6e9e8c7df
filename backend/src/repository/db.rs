//! SQLite Store
//!
//! Local or shared-file implementation of `RemoteStore`. Writes from this
//! process are published directly; writes from other processes sharing the
//! file are noticed by polling `PRAGMA data_version`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::changes::{ChangeEvent, ChangeHub, ChangeKind, ChangeSubscription};
use super::traits::RemoteStore;
use crate::domain::{CardRow, Counter, DomainError, DomainResult, ProjectRow};

/// How often a file-backed store checks for writes by other processes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const PROJECT_COLUMNS: &str = "id, name, created_at";
const CARD_COLUMNS: &str = "id, project_id, text, likes, dislikes, swimlane, created_at";

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Store(e.to_string())
    }
}

/// SQLite implementation of the project and card tables
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    hub: ChangeHub,
    poll_interval: Option<Duration>,
}

impl SqliteStore {
    /// Open (creating if needed) a database file and run migrations
    pub fn open(db_path: &Path) -> DomainResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DomainError::Store(format!("Failed to create {}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::debug!("journal_mode={}", mode);
        log::info!("opened sqlite store at {}", db_path.display());

        Self::from_connection(conn, Some(DEFAULT_POLL_INTERVAL))
    }

    /// Private in-memory database; nothing else can write to it, so no polling
    pub fn open_in_memory() -> DomainResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, poll_interval: Option<Duration>) -> DomainResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hub: ChangeHub::new(),
            poll_interval,
        })
    }

    /// Change (or disable) the cross-process polling interval
    pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self
    }

    fn spawn_data_version_watch(&self, project_id: String, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak_conn = Arc::downgrade(&self.conn);
        let hub = self.hub.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_version: Option<i64> = None;
            loop {
                ticker.tick().await;
                let Some(conn) = weak_conn.upgrade() else { break };
                let version = {
                    let guard = conn.lock().await;
                    data_version(&guard)
                };
                match version {
                    Ok(version) => {
                        if last_version.is_some_and(|last| last != version) {
                            log::debug!("external write detected (data_version {})", version);
                            hub.publish(ChangeEvent::external(Some(&project_id)));
                        }
                        last_version = Some(version);
                    }
                    Err(e) => log::warn!("data_version poll failed: {}", e),
                }
            }
        })
    }
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            text TEXT NOT NULL,
            likes INTEGER NOT NULL DEFAULT 0,
            swimlane TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )?;

    // Boards created before dislikes existed
    if !column_exists(conn, "cards", "dislikes")? {
        conn.execute("ALTER TABLE cards ADD COLUMN dislikes INTEGER NOT NULL DEFAULT 0", [])?;
    }

    conn.execute("CREATE INDEX IF NOT EXISTS idx_cards_project ON cards(project_id)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_projects_created ON projects(created_at)", [])?;

    Ok(())
}

fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA data_version", [], |row| row.get(0))
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: timestamp_at(row, 2)?,
    })
}

fn row_to_card(row: &Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        text: row.get(2)?,
        likes: row.get(3)?,
        dislikes: row.get(4)?,
        swimlane: row.get(5)?,
        created_at: timestamp_at(row, 6)?,
    })
}

fn query_projects(conn: &Connection) -> DomainResult<Vec<ProjectRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM projects ORDER BY created_at DESC, rowid DESC",
        PROJECT_COLUMNS
    ))?;
    let rows = stmt.query_map([], row_to_project)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_cards(conn: &Connection, project_id: Option<&str>) -> DomainResult<Vec<CardRow>> {
    let rows = match project_id {
        Some(pid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM cards WHERE project_id = ? ORDER BY created_at ASC, rowid ASC",
                CARD_COLUMNS
            ))?;
            let rows = stmt.query_map(params![pid], row_to_card)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM cards ORDER BY created_at ASC, rowid ASC",
                CARD_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_card)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

#[async_trait]
impl RemoteStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn select_projects(&self) -> DomainResult<Vec<ProjectRow>> {
        let conn = self.conn.lock().await;
        query_projects(&conn)
    }

    async fn select_project(&self, id: &str) -> DomainResult<Option<ProjectRow>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS),
                params![id],
                row_to_project,
            )
            .optional()?;
        Ok(row)
    }

    async fn insert_project(&self, name: &str) -> DomainResult<ProjectRow> {
        let row = ProjectRow {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO projects (id, name, created_at) VALUES (?, ?, ?)",
                params![row.id, row.name, format_timestamp(&row.created_at)],
            )?;
        }

        self.hub.publish(ChangeEvent::project(&row.id, ChangeKind::Insert));
        Ok(row)
    }

    async fn update_project_name(&self, id: &str, name: &str) -> DomainResult<()> {
        let changed = {
            let conn = self.conn.lock().await;
            conn.execute("UPDATE projects SET name = ? WHERE id = ?", params![name, id])?
        };
        if changed == 0 {
            return Err(DomainError::NotFound(format!("project {}", id)));
        }

        self.hub.publish(ChangeEvent::project(id, ChangeKind::Update));
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> DomainResult<()> {
        {
            let conn = self.conn.lock().await;
            conn.execute("DELETE FROM projects WHERE id = ?", params![id])?;
        }

        self.hub.publish(ChangeEvent::cards(id, ChangeKind::Delete));
        Ok(())
    }

    async fn select_cards(&self, project_id: Option<&str>) -> DomainResult<Vec<CardRow>> {
        let conn = self.conn.lock().await;
        query_cards(&conn, project_id)
    }

    async fn select_card(&self, id: &str) -> DomainResult<Option<CardRow>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM cards WHERE id = ?", CARD_COLUMNS),
                params![id],
                row_to_card,
            )
            .optional()?;
        Ok(row)
    }

    async fn insert_card(&self, row: &CardRow) -> DomainResult<CardRow> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO cards (id, project_id, text, likes, dislikes, swimlane, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    row.id,
                    row.project_id,
                    row.text,
                    row.likes,
                    row.dislikes,
                    row.swimlane,
                    format_timestamp(&row.created_at)
                ],
            )?;
        }

        self.hub.publish(ChangeEvent::cards(&row.project_id, ChangeKind::Insert));
        Ok(row.clone())
    }

    async fn update_card(&self, row: &CardRow) -> DomainResult<()> {
        let project_id: Option<String> = {
            let conn = self.conn.lock().await;
            conn.query_row(
                "UPDATE cards SET text = ?, likes = ?, dislikes = ?, swimlane = ? WHERE id = ? RETURNING project_id",
                params![row.text, row.likes, row.dislikes, row.swimlane, row.id],
                |r| r.get(0),
            )
            .optional()?
        };

        let project_id = project_id.ok_or_else(|| DomainError::NotFound(format!("card {}", row.id)))?;
        self.hub.publish(ChangeEvent::cards(&project_id, ChangeKind::Update));
        Ok(())
    }

    async fn set_card_counter(&self, id: &str, counter: Counter, value: u32) -> DomainResult<()> {
        let project_id: Option<String> = {
            let conn = self.conn.lock().await;
            conn.query_row(
                &format!("UPDATE cards SET {} = ? WHERE id = ? RETURNING project_id", counter.column()),
                params![value, id],
                |r| r.get(0),
            )
            .optional()?
        };

        let project_id = project_id.ok_or_else(|| DomainError::NotFound(format!("card {}", id)))?;
        self.hub.publish(ChangeEvent::cards(&project_id, ChangeKind::Update));
        Ok(())
    }

    async fn increment_card_counter(&self, id: &str, counter: Counter) -> DomainResult<u32> {
        let column = counter.column();
        let updated: Option<(u32, String)> = {
            let conn = self.conn.lock().await;
            conn.query_row(
                &format!(
                    "UPDATE cards SET {col} = {col} + 1 WHERE id = ? RETURNING {col}, project_id",
                    col = column
                ),
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
        };

        let (value, project_id) = updated.ok_or_else(|| DomainError::NotFound(format!("card {}", id)))?;
        self.hub.publish(ChangeEvent::cards(&project_id, ChangeKind::Update));
        Ok(value)
    }

    async fn delete_card(&self, id: &str) -> DomainResult<()> {
        let project_id: Option<String> = {
            let conn = self.conn.lock().await;
            conn.query_row("DELETE FROM cards WHERE id = ? RETURNING project_id", params![id], |r| r.get(0))
                .optional()?
        };

        if let Some(project_id) = project_id {
            self.hub.publish(ChangeEvent::cards(&project_id, ChangeKind::Delete));
        }
        Ok(())
    }

    async fn subscribe(&self, project_id: &str) -> DomainResult<ChangeSubscription> {
        let subscription = self.hub.subscribe(project_id);
        Ok(match self.poll_interval {
            Some(interval) => {
                subscription.with_watcher(self.spawn_data_version_watch(project_id.to_string(), interval))
            }
            None => subscription,
        })
    }
}
