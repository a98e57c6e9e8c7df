//! Change Notifications
//!
//! Every store publishes its mutations to a `ChangeHub`. Viewers subscribe per
//! project and only learn that "something changed"; they never rely on the
//! payload beyond its scope.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Projects,
    Cards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Observed from outside this process, or events were missed
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// `None` when the scope is not known; delivered to every subscriber
    pub project_id: Option<String>,
    pub table: Table,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn cards(project_id: &str, kind: ChangeKind) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            table: Table::Cards,
            kind,
        }
    }

    pub fn project(project_id: &str, kind: ChangeKind) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            table: Table::Projects,
            kind,
        }
    }

    /// A change seen by polling, attributed to `project_id` when known
    pub fn external(project_id: Option<&str>) -> Self {
        Self {
            project_id: project_id.map(str::to_string),
            table: Table::Cards,
            kind: ChangeKind::Unknown,
        }
    }

    pub fn concerns(&self, project_id: &str) -> bool {
        self.project_id.as_deref().map_or(true, |id| id == project_id)
    }
}

/// Broadcast point shared by a store and its pollers
#[derive(Debug, Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish to current subscribers; nobody listening is not an error
    pub fn publish(&self, event: ChangeEvent) {
        log::trace!("change: {:?}", event);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, project_id: &str) -> ChangeSubscription {
        ChangeSubscription {
            project_id: project_id.to_string(),
            receiver: self.sender.subscribe(),
            watcher: None,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Scoped view of a hub for one project
///
/// Dropping it unsubscribes and stops any poller attached to it.
#[derive(Debug)]
pub struct ChangeSubscription {
    project_id: String,
    receiver: broadcast::Receiver<ChangeEvent>,
    watcher: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Attach a background poller whose lifetime ends with this subscription
    pub fn with_watcher(mut self, watcher: JoinHandle<()>) -> Self {
        if let Some(previous) = self.watcher.replace(watcher) {
            previous.abort();
        }
        self
    }

    /// Next event for this project; `None` once the store is gone
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.concerns(&self.project_id) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "subscription for {} lagged by {} events",
                        self.project_id,
                        skipped
                    );
                    return Some(ChangeEvent::external(Some(&self.project_id)));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Unsubscribe now
    pub fn close(self) {}
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_subscription_filters_by_project() {
        let hub = ChangeHub::new();
        let mut sub = hub.subscribe("p1");

        hub.publish(ChangeEvent::cards("p2", ChangeKind::Insert));
        hub.publish(ChangeEvent::cards("p1", ChangeKind::Update));

        let event = sub.next().await.unwrap();
        assert_eq!(event.project_id.as_deref(), Some("p1"));
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn test_unscoped_events_reach_everyone() {
        let hub = ChangeHub::new();
        let mut sub = hub.subscribe("p1");

        hub.publish(ChangeEvent::external(None));

        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Unknown);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = ChangeHub::new();
        let sub = hub.subscribe("p1");
        assert_eq!(hub.subscriber_count(), 1);
        sub.close();
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lag_reports_a_change() {
        let hub = ChangeHub::new();
        let mut sub = hub.subscribe("p1");

        for _ in 0..(CHANNEL_CAPACITY + 10) {
            hub.publish(ChangeEvent::cards("p1", ChangeKind::Insert));
        }

        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Unknown);
    }

    #[tokio::test]
    async fn test_drop_aborts_watcher() {
        let hub = ChangeHub::new();
        let watcher = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let sub = hub.subscribe("p1").with_watcher(watcher);
        drop(sub);
        tokio::task::yield_now().await;
        assert_eq!(hub.subscriber_count(), 0);
    }
}
