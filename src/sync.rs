//! Live Sync
//!
//! Keeps an open board current: one change subscription scoped to the board's
//! project, and a reload for every event it delivers. Events say only that
//! something changed; the board re-fetches the whole project.

use tokio::task::{JoinHandle, JoinSet};

use crate::board::BoardSession;
use retro_store_lib::DomainResult;

/// Running subscription for one board; stops when dropped
pub struct LiveSync {
    project_id: String,
    task: JoinHandle<()>,
}

impl LiveSync {
    pub async fn start(board: BoardSession) -> DomainResult<Self> {
        let project_id = board.project_id().to_string();
        let mut subscription = board.repository().subscribe(&project_id).await?;
        log::info!("live sync started for {}", project_id);

        let scope = project_id.clone();
        let task = tokio::spawn(async move {
            // Reloads run beside the listener so events arriving mid-reload
            // reach the board and are coalesced there. Dropping the set on
            // abort cancels any reload still running.
            let mut reloads = JoinSet::new();
            loop {
                tokio::select! {
                    event = subscription.next() => match event {
                        Some(event) => {
                            log::debug!("change on {}: {:?}", scope, event.kind);
                            let board = board.clone();
                            reloads.spawn(async move {
                                board.reload().await;
                            });
                        }
                        None => {
                            log::info!("change feed for {} closed", scope);
                            break;
                        }
                    },
                    Some(_) = reloads.join_next(), if !reloads.is_empty() => {}
                }
            }
        });

        Ok(Self { project_id, task })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Close the subscription; nothing further reaches the board
    pub fn stop(self) {}
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        self.task.abort();
        log::info!("live sync stopped for {}", self.project_id);
    }
}
