//! Hosted REST Store
//!
//! `RemoteStore` over a PostgREST-style table API (`/rest/v1/<table>`), the shape
//! exposed by hosted Postgres backends. The hosted side owns id and timestamp
//! defaults and the `ON DELETE CASCADE` from projects to cards. Atomic counter
//! increments go through the `increment_card_counter` RPC.
//!
//! There is no push channel here, so subscriptions poll the project's rows and
//! report a change whenever their fingerprint moves.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use super::changes::{ChangeEvent, ChangeHub, ChangeKind, ChangeSubscription};
use super::traits::RemoteStore;
use crate::domain::{CardRow, Counter, DomainError, DomainResult, ProjectRow};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

impl From<reqwest::Error> for DomainError {
    fn from(e: reqwest::Error) -> Self {
        DomainError::Store(e.to_string())
    }
}

struct RestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> DomainResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::Store(format!("{}: {}", status, body.trim())));
        }
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> DomainResult<()> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::Store(format!("{}: {}", status, body.trim())));
        }
        Ok(())
    }

    async fn returning<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        filter: Option<(&str, String)>,
        body: &B,
    ) -> DomainResult<Vec<T>> {
        let mut builder = self
            .request(method, path)
            .header("Prefer", "return=representation")
            .json(body);
        if let Some((column, value)) = filter {
            builder = builder.query(&[(column, value)]);
        }
        self.send(builder).await
    }

    async fn project_fingerprint(&self, project_id: &str) -> DomainResult<u64> {
        let projects: Vec<ProjectRow> = self
            .send(
                self.request(Method::GET, "projects")
                    .query(&[("select", "*".to_string()), ("id", eq(project_id))]),
            )
            .await?;
        let cards: Vec<CardRow> = self
            .send(self.request(Method::GET, "cards").query(&[
                ("select", "*".to_string()),
                ("project_id", eq(project_id)),
                ("order", "id.asc".to_string()),
            ]))
            .await?;

        let mut hasher = DefaultHasher::new();
        projects.first().map(|p| p.name.as_str()).hash(&mut hasher);
        for card in &cards {
            (&card.id, &card.text, card.likes, card.dislikes, &card.swimlane).hash(&mut hasher);
        }
        Ok(hasher.finish())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Store backed by a hosted PostgREST endpoint
pub struct RestStore {
    client: Arc<RestClient>,
    hub: ChangeHub,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client: Arc::new(RestClient {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
            }),
            hub: ChangeHub::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn spawn_poller(&self, project_id: String) -> tokio::task::JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let hub = self.hub.clone();
        let interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last: Option<u64> = None;
            loop {
                ticker.tick().await;
                match client.project_fingerprint(&project_id).await {
                    Ok(fingerprint) => {
                        if last.is_some_and(|prev| prev != fingerprint) {
                            hub.publish(ChangeEvent::external(Some(&project_id)));
                        }
                        last = Some(fingerprint);
                    }
                    Err(e) => log::warn!("poll of project {} failed: {}", project_id, e),
                }
            }
        })
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    async fn select_projects(&self) -> DomainResult<Vec<ProjectRow>> {
        self.client
            .send(
                self.client
                    .request(Method::GET, "projects")
                    .query(&[("select", "*"), ("order", "created_at.desc")]),
            )
            .await
    }

    async fn select_project(&self, id: &str) -> DomainResult<Option<ProjectRow>> {
        let rows: Vec<ProjectRow> = self
            .client
            .send(
                self.client
                    .request(Method::GET, "projects")
                    .query(&[("select", "*".to_string()), ("id", eq(id))]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_project(&self, name: &str) -> DomainResult<ProjectRow> {
        let rows: Vec<ProjectRow> = self
            .client
            .returning(Method::POST, "projects", None, &json!({ "name": name }))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Store("insert returned no project row".into()))?;
        self.hub.publish(ChangeEvent::project(&row.id, ChangeKind::Insert));
        Ok(row)
    }

    async fn update_project_name(&self, id: &str, name: &str) -> DomainResult<()> {
        let rows: Vec<ProjectRow> = self
            .client
            .returning(Method::PATCH, "projects", Some(("id", eq(id))), &json!({ "name": name }))
            .await?;
        if rows.is_empty() {
            return Err(DomainError::NotFound(format!("project {}", id)));
        }
        self.hub.publish(ChangeEvent::project(id, ChangeKind::Update));
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> DomainResult<()> {
        self.client
            .send_empty(self.client.request(Method::DELETE, "projects").query(&[("id", eq(id))]))
            .await?;
        self.hub.publish(ChangeEvent::cards(id, ChangeKind::Delete));
        Ok(())
    }

    async fn select_cards(&self, project_id: Option<&str>) -> DomainResult<Vec<CardRow>> {
        let mut query = vec![("select", "*".to_string()), ("order", "created_at.asc".to_string())];
        if let Some(pid) = project_id {
            query.push(("project_id", eq(pid)));
        }
        self.client
            .send(self.client.request(Method::GET, "cards").query(&query))
            .await
    }

    async fn select_card(&self, id: &str) -> DomainResult<Option<CardRow>> {
        let rows: Vec<CardRow> = self
            .client
            .send(
                self.client
                    .request(Method::GET, "cards")
                    .query(&[("select", "*".to_string()), ("id", eq(id))]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_card(&self, row: &CardRow) -> DomainResult<CardRow> {
        let rows: Vec<CardRow> = self.client.returning(Method::POST, "cards", None, row).await?;
        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Store("insert returned no card row".into()))?;
        self.hub.publish(ChangeEvent::cards(&created.project_id, ChangeKind::Insert));
        Ok(created)
    }

    async fn update_card(&self, row: &CardRow) -> DomainResult<()> {
        let body = json!({
            "text": row.text,
            "likes": row.likes,
            "dislikes": row.dislikes,
            "swimlane": row.swimlane,
        });
        let rows: Vec<CardRow> = self
            .client
            .returning(Method::PATCH, "cards", Some(("id", eq(&row.id))), &body)
            .await?;
        let updated = rows
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(format!("card {}", row.id)))?;
        self.hub.publish(ChangeEvent::cards(&updated.project_id, ChangeKind::Update));
        Ok(())
    }

    async fn set_card_counter(&self, id: &str, counter: Counter, value: u32) -> DomainResult<()> {
        let body = json!({ counter.column(): value });
        let rows: Vec<CardRow> = self
            .client
            .returning(Method::PATCH, "cards", Some(("id", eq(id))), &body)
            .await?;
        let updated = rows
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(format!("card {}", id)))?;
        self.hub.publish(ChangeEvent::cards(&updated.project_id, ChangeKind::Update));
        Ok(())
    }

    async fn increment_card_counter(&self, id: &str, counter: Counter) -> DomainResult<u32> {
        let body = json!({ "card_id": id, "counter": counter.column() });
        let rows: Vec<CardRow> = self
            .client
            .send(self.client.request(Method::POST, "rpc/increment_card_counter").json(&body))
            .await?;
        let updated = rows
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(format!("card {}", id)))?;
        self.hub.publish(ChangeEvent::cards(&updated.project_id, ChangeKind::Update));
        Ok(updated.counter(counter))
    }

    async fn delete_card(&self, id: &str) -> DomainResult<()> {
        let rows: Vec<CardRow> = self
            .client
            .send(
                self.client
                    .request(Method::DELETE, "cards")
                    .header("Prefer", "return=representation")
                    .query(&[("id", eq(id))]),
            )
            .await?;
        if let Some(card) = rows.first() {
            self.hub.publish(ChangeEvent::cards(&card.project_id, ChangeKind::Delete));
        }
        Ok(())
    }

    async fn subscribe(&self, project_id: &str) -> DomainResult<ChangeSubscription> {
        Ok(self
            .hub
            .subscribe(project_id)
            .with_watcher(self.spawn_poller(project_id.to_string())))
    }
}
