//! Board Session
//!
//! Local copy of one open project plus the reload state machine. The copy is
//! replaced wholesale on every successful reload; card adds and votes are
//! applied to it immediately and reconciled with the store afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::notice::{Notice, NoticeSender};
use retro_store_lib::commands;
use retro_store_lib::{Card, Category, Counter, DomainResult, Project, ProjectRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// Snapshot published to viewers after every change
#[derive(Debug, Clone)]
pub struct BoardView {
    pub project: Option<Project>,
    pub state: SyncState,
    /// The project no longer exists in the store
    pub gone: bool,
}

#[derive(Clone)]
pub struct BoardSession {
    repo: ProjectRepository,
    project_id: String,
    view: Arc<watch::Sender<BoardView>>,
    /// A reload was requested while one was in flight
    pending: Arc<AtomicBool>,
    notices: NoticeSender,
}

impl BoardSession {
    pub fn new(repo: ProjectRepository, project_id: &str, notices: NoticeSender) -> Self {
        let (view, _) = watch::channel(BoardView {
            project: None,
            state: SyncState::Idle,
            gone: false,
        });
        Self {
            repo,
            project_id: project_id.to_string(),
            view: Arc::new(view),
            pending: Arc::new(AtomicBool::new(false)),
            notices,
        }
    }

    /// Session with the project loaded, failing if the first load fails
    pub async fn open(repo: ProjectRepository, project_id: &str, notices: NoticeSender) -> DomainResult<Self> {
        let project = commands::get_project(&repo, project_id).await?;
        let session = Self::new(repo, project_id, notices);
        session.view.send_modify(|view| {
            view.project = Some(project);
            view.state = SyncState::Ready;
        });
        Ok(session)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn repository(&self) -> &ProjectRepository {
        &self.repo
    }

    pub fn state(&self) -> SyncState {
        self.view.borrow().state.clone()
    }

    pub fn project(&self) -> Option<Project> {
        self.view.borrow().project.clone()
    }

    pub fn is_gone(&self) -> bool {
        self.view.borrow().gone
    }

    pub fn watch(&self) -> watch::Receiver<BoardView> {
        self.view.subscribe()
    }

    /// Re-fetch the project and replace the local copy
    ///
    /// Returns `false` without touching the store when a reload is already in
    /// flight; that reload fetches once more when it finishes, so a change
    /// landing after its read is never lost. Failures are reported as notices
    /// and leave the local copy as is.
    pub async fn reload(&self) -> bool {
        let started = self.view.send_if_modified(|view| {
            if view.state == SyncState::Loading {
                self.pending.store(true, Ordering::SeqCst);
                false
            } else {
                view.state = SyncState::Loading;
                true
            }
        });
        if !started {
            log::debug!("reload of {} coalesced", self.project_id);
            return false;
        }

        while self.fetch().await {
            log::debug!("reload of {} requested mid-fetch, fetching again", self.project_id);
        }
        true
    }

    /// One fetch; `true` when another was requested while it ran and the
    /// state was left at `Loading` for it
    async fn fetch(&self) -> bool {
        let mut again = false;
        match self.repo.get(&self.project_id).await {
            Ok(project) => {
                log::debug!("reloaded {} ({} cards)", project.id, project.cards.len());
                self.view.send_modify(|view| {
                    view.project = Some(project);
                    again = self.pending.swap(false, Ordering::SeqCst);
                    if !again {
                        view.state = SyncState::Ready;
                    }
                });
            }
            Err(e) if e.is_not_found() => {
                log::info!("project {} was deleted", self.project_id);
                self.notify(Notice::info("This project was deleted. Returning to the project list."));
                self.view.send_modify(|view| {
                    self.pending.store(false, Ordering::SeqCst);
                    view.state = SyncState::Error(e.to_string());
                    view.gone = true;
                });
            }
            Err(e) => {
                log::warn!("reload of {} failed: {}", self.project_id, e);
                self.notify(Notice::error(format!("Could not refresh the board: {}", e)));
                self.view.send_modify(|view| {
                    again = self.pending.swap(false, Ordering::SeqCst);
                    if !again {
                        view.state = SyncState::Error(e.to_string());
                    }
                });
            }
        }
        again
    }

    /// Add a card, showing it locally before the store confirms
    pub async fn add_card(&self, category: Category, text: &str) -> DomainResult<Card> {
        let placeholder = Card::new(text.trim());
        let placeholder_id = placeholder.id.clone();
        self.view.send_if_modified(|view| match view.project.as_mut() {
            Some(project) if !placeholder.text.is_empty() => {
                project.cards.get_mut(category).push(placeholder);
                true
            }
            _ => false,
        });

        match commands::add_card(&self.repo, &self.project_id, category.as_tag(), text).await {
            Ok((_, card)) => {
                self.view.send_modify(|view| {
                    if let Some(slot) = view.project.as_mut().and_then(|p| p.cards.find_mut(&placeholder_id)) {
                        *slot = card.clone();
                    }
                });
                Ok(card)
            }
            Err(e) => {
                self.recover(&format!("Could not add the card: {}", e)).await;
                Err(e)
            }
        }
    }

    /// Bump a counter locally, then at the store; returns the stored value
    pub async fn increment(&self, card_id: &str, counter: Counter) -> DomainResult<u32> {
        self.view.send_if_modified(|view| {
            match view.project.as_mut().and_then(|p| p.cards.find_mut(card_id)) {
                Some(card) => {
                    card.bump(counter);
                    true
                }
                None => false,
            }
        });

        let result = match counter {
            Counter::Like => commands::like_card(&self.repo, card_id).await,
            Counter::Dislike => commands::dislike_card(&self.repo, card_id).await,
        };

        match result {
            Ok(value) => {
                self.view.send_if_modified(|view| {
                    match view.project.as_mut().and_then(|p| p.cards.find_mut(card_id)) {
                        Some(card) if card.counter(counter) != value => {
                            match counter {
                                Counter::Like => card.likes = value,
                                Counter::Dislike => card.dislikes = value,
                            }
                            true
                        }
                        _ => false,
                    }
                });
                Ok(value)
            }
            Err(e) => {
                self.recover(&format!("Could not record the vote: {}", e)).await;
                Err(e)
            }
        }
    }

    /// Tell the user, then get back to what the store holds
    async fn recover(&self, message: &str) {
        log::warn!("{}", message);
        self.notify(Notice::error(message));
        self.reload().await;
    }

    fn notify(&self, notice: Notice) {
        // Nobody listening is fine; the log line already has it
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{self, NoticeLevel};
    use retro_store_lib::{MemoryStore, RemoteStore, Repository};
    use std::time::Duration;

    async fn setup() -> (Arc<MemoryStore>, ProjectRepository, String) {
        let store = Arc::new(MemoryStore::new());
        let repo = ProjectRepository::new(store.clone());
        let project = repo.create_project("Sprint 12").await.unwrap();
        (store, repo, project.id)
    }

    async fn wait_for_state(board: &BoardSession, state: SyncState) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while board.state() != state {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("state never reached");
    }

    #[tokio::test]
    async fn test_open_loads_project() {
        let (_, repo, id) = setup().await;
        let (tx, _rx) = notice::channel();

        let board = BoardSession::open(repo, &id, tx).await.unwrap();

        assert_eq!(board.state(), SyncState::Ready);
        assert_eq!(board.project().unwrap().name, "Sprint 12");
    }

    #[tokio::test]
    async fn test_open_missing_project_fails() {
        let (_, repo, _) = setup().await;
        let (tx, _rx) = notice::channel();
        let err = BoardSession::open(repo, "missing", tx).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reload_while_loading_is_coalesced() {
        let (store, repo, id) = setup().await;
        let (tx, _rx) = notice::channel();
        let board = BoardSession::new(repo, &id, tx);
        let fetches_before = store.project_fetches();

        store.hold();
        let first = tokio::spawn({
            let board = board.clone();
            async move { board.reload().await }
        });
        wait_for_state(&board, SyncState::Loading).await;

        assert!(!board.reload().await);
        assert!(!board.reload().await);
        assert!(!board.reload().await);

        store.release();
        assert!(first.await.unwrap());
        assert_eq!(board.state(), SyncState::Ready);
        // Three requests mid-flight fold into a single follow-up fetch
        assert_eq!(store.project_fetches(), fetches_before + 2);
    }

    #[tokio::test]
    async fn test_change_after_card_read_is_not_lost() {
        let (store, repo, id) = setup().await;
        let (tx, _rx) = notice::channel();
        let board = BoardSession::open(repo.clone(), &id, tx).await.unwrap();
        let reads = store.card_reads();

        store.park_card_reads();
        let first = tokio::spawn({
            let board = board.clone();
            async move { board.reload().await }
        });
        while store.card_reads() == reads {
            tokio::task::yield_now().await;
        }

        // Lands after the in-flight fetch took its rows
        repo.add_card(&id, Category::ToImprove, "late arrival").await.unwrap();
        assert!(!board.reload().await);

        store.release();
        assert!(first.await.unwrap());
        assert_eq!(board.state(), SyncState::Ready);
        assert_eq!(board.project().unwrap().cards.to_improve.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_local_copy() {
        let (store, repo, id) = setup().await;
        let (tx, mut rx) = notice::channel();
        let board = BoardSession::open(repo.clone(), &id, tx).await.unwrap();
        repo.add_card(&id, Category::ToImprove, "arrives later").await.unwrap();

        store.fail_next("network unreachable").await;
        assert!(board.reload().await);

        assert!(matches!(board.state(), SyncState::Error(_)));
        assert!(board.project().unwrap().cards.is_empty());
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("network unreachable"));

        // The next reload recovers
        assert!(board.reload().await);
        assert_eq!(board.state(), SyncState::Ready);
        assert_eq!(board.project().unwrap().cards.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_of_deleted_project_marks_gone() {
        let (_, repo, id) = setup().await;
        let (tx, mut rx) = notice::channel();
        let board = BoardSession::open(repo.clone(), &id, tx).await.unwrap();

        repo.delete(&id).await.unwrap();
        board.reload().await;

        assert!(board.is_gone());
        assert_eq!(rx.try_recv().unwrap().level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_add_card_shows_stored_card() {
        let (_, repo, id) = setup().await;
        let (tx, _rx) = notice::channel();
        let board = BoardSession::open(repo.clone(), &id, tx).await.unwrap();

        let card = board.add_card(Category::ActionItems, " Book the room ").await.unwrap();

        let local = board.project().unwrap();
        assert_eq!(local.cards.action_items.len(), 1);
        assert_eq!(local.cards.action_items[0].id, card.id);
        assert_eq!(local.cards.action_items[0].text, "Book the room");
    }

    #[tokio::test]
    async fn test_add_blank_card_is_rejected_without_local_change() {
        let (_, repo, id) = setup().await;
        let (tx, _rx) = notice::channel();
        let board = BoardSession::open(repo, &id, tx).await.unwrap();

        assert!(board.add_card(Category::ToImprove, "   ").await.is_err());
        assert!(board.project().unwrap().cards.is_empty());
    }

    #[tokio::test]
    async fn test_failed_add_rolls_back_through_reload() {
        let (store, repo, id) = setup().await;
        let (tx, mut rx) = notice::channel();
        let board = BoardSession::open(repo, &id, tx).await.unwrap();

        store.fail_next("insert refused").await;
        assert!(board.add_card(Category::ToImprove, "lost").await.is_err());

        assert!(board.project().unwrap().cards.is_empty());
        assert_eq!(board.state(), SyncState::Ready);
        assert!(rx.try_recv().unwrap().message.contains("insert refused"));
    }

    #[tokio::test]
    async fn test_increment_matches_store() {
        let (store, repo, id) = setup().await;
        let (tx, _rx) = notice::channel();
        let card = repo.add_card(&id, Category::WhatWentWell, "Good demo").await.unwrap();
        let board = BoardSession::open(repo, &id, tx).await.unwrap();
        // Someone else voted since we loaded
        store.set_card_counter(&card.id, Counter::Like, 3).await.unwrap();

        let likes = board.increment(&card.id, Counter::Like).await.unwrap();

        assert_eq!(likes, 4);
        assert_eq!(board.project().unwrap().cards.what_went_well[0].likes, 4);
    }

    #[tokio::test]
    async fn test_increment_missing_card_notifies() {
        let (_, repo, id) = setup().await;
        let (tx, mut rx) = notice::channel();
        let board = BoardSession::open(repo, &id, tx).await.unwrap();

        assert!(board.increment("missing", Counter::Dislike).await.unwrap_err().is_not_found());
        assert_eq!(rx.try_recv().unwrap().level, NoticeLevel::Error);
    }
}
