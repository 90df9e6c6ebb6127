//! REST implementation of [`SuperKanbanApi`].
//!
//! One `SuperKanbanClient` is created at startup and reused for the
//! process lifetime; the underlying `reqwest::Client` keeps a connection
//! pool. Every request is bounded by the configured timeout budget and
//! classified into the shared error taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sk_domain::config::SkClientConfig;
use sk_domain::error::{Error, Result};
use sk_keys::EntityType;

use crate::api::SuperKanbanApi;
use crate::auth::{normalize_base_url, AuthScope, AuthScopes};
use crate::types::{
    AttachSessionRequest, EntityRef, Envelope, EventRequest, RecordMessageRequest,
    RecordToolCallRequest, SessionSummary, TaskStatus, UpsertProjectRequest, UpsertTaskRequest,
    UpsertWorkItemRequest,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SuperKanbanClient {
    http: Client,
    base_url: String,
    scopes: AuthScopes,
    timeout: Duration,
    attach_path: String,
    messages_path: String,
    tool_calls_path: String,
}

impl SuperKanbanClient {
    /// Build a client from config. Fails fast on a missing base URL or
    /// unresolvable credentials so misconfiguration surfaces at startup,
    /// not on the first spool tick.
    pub fn new(config: &SkClientConfig) -> Result<Self> {
        let raw = config
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("super-kanban base URL is not configured".into()))?;
        let base_url = normalize_base_url(raw)?;

        let scopes = AuthScopes::from_config(config)?;
        scopes.check()?;

        let http = Client::builder()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            scopes,
            timeout: Duration::from_millis(config.effective_timeout_ms()),
            attach_path: config.paths.attach.clone(),
            messages_path: config.paths.messages.clone(),
            tool_calls_path: config.paths.tool_calls.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn entity_segment(entity_type: EntityType) -> &'static str {
        match entity_type {
            EntityType::Project => "projects",
            EntityType::WorkItem => "work-items",
            EntityType::Task => "tasks",
        }
    }

    // ── request engine ───────────────────────────────────────────────

    /// Run one request under the timeout budget and surface non-2xx as
    /// [`Error::Protocol`]. The caller picks apart special statuses
    /// (404 resolve, 409/423 lock) before this classification.
    async fn execute(&self, method: Method, path: &str, rb: RequestBuilder) -> Result<Response> {
        let (header, value) = self.scopes.resolve(AuthScope::for_method(&method))?;
        let rb = rb.header(header, value);

        let resp = tokio::time::timeout(self.timeout, rb.send())
            .await
            .map_err(|_| Error::Timeout(format!("{method} {path} exceeded {:?}", self.timeout)))?
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else {
                    Error::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.ok().filter(|b| !b.is_empty());
        Err(Error::Protocol {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let rb = self.http.post(self.url(path)).json(body);
        self.execute(Method::POST, path, rb).await
    }

    async fn post_json_data<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self.post_json(path, body).await?;
        let envelope: Envelope<T> = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        Ok(envelope.data)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let rb = self.http.get(self.url(path));
        let resp = self.execute(Method::GET, path, rb).await?;
        let envelope: Envelope<T> = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        Ok(envelope.data)
    }

    async fn patch_json<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let rb = self.http.patch(self.url(path)).json(body);
        self.execute(Method::PATCH, path, rb).await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl SuperKanbanApi for SuperKanbanClient {
    async fn upsert_project(&self, req: UpsertProjectRequest) -> Result<EntityRef> {
        self.post_json_data("/integrations/openclaw/projects/upsert", &req)
            .await
    }

    async fn upsert_work_item(&self, req: UpsertWorkItemRequest) -> Result<EntityRef> {
        self.post_json_data("/integrations/openclaw/work-items/upsert", &req)
            .await
    }

    async fn upsert_task(&self, req: UpsertTaskRequest) -> Result<EntityRef> {
        self.post_json_data("/integrations/openclaw/tasks/upsert", &req)
            .await
    }

    async fn attach_session(&self, req: AttachSessionRequest) -> Result<()> {
        let path = self.attach_path.clone();
        self.post_json(&path, &req).await?;
        Ok(())
    }

    async fn record_message(&self, req: RecordMessageRequest) -> Result<()> {
        let path = self.messages_path.clone();
        self.post_json(&path, &req).await?;
        Ok(())
    }

    async fn record_tool_call(&self, req: RecordToolCallRequest) -> Result<()> {
        let path = self.tool_calls_path.clone();
        self.post_json(&path, &req).await?;
        Ok(())
    }

    async fn post_event(&self, req: EventRequest) -> Result<()> {
        self.post_json("/integrations/openclaw/events", &req).await?;
        Ok(())
    }

    async fn lock_task(&self, task_id: &str, owner: &str, ttl_seconds: u64) -> Result<()> {
        let path = format!("/integrations/openclaw/tasks/{task_id}/lock");
        let body = crate::types::LockTaskRequest {
            owner: owner.to_owned(),
            ttl_seconds,
        };
        match self.post_json(&path, &body).await {
            Ok(_) => Ok(()),
            Err(Error::Protocol { status, .. })
                if status == StatusCode::CONFLICT.as_u16() || status == StatusCode::LOCKED.as_u16() =>
            {
                Err(Error::Conflict {
                    reason: "task_locked".into(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn unlock_task(&self, task_id: &str, owner: &str) -> Result<()> {
        let path = format!("/integrations/openclaw/tasks/{task_id}/unlock");
        let body = crate::types::UnlockTaskRequest {
            owner: owner.to_owned(),
        };
        self.post_json(&path, &body).await?;
        Ok(())
    }

    async fn patch_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.patch_json(
            &format!("/tasks/{task_id}"),
            &serde_json::json!({ "status": status }),
        )
        .await
    }

    async fn patch_entity_archived(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        archived: bool,
    ) -> Result<()> {
        let seg = Self::entity_segment(entity_type);
        self.patch_json(
            &format!("/{seg}/{entity_id}"),
            &serde_json::json!({ "archived": archived }),
        )
        .await
    }

    async fn list_projects(&self, include_archived: bool) -> Result<Vec<EntityRef>> {
        let path = if include_archived {
            "/projects?includeArchived=true".to_owned()
        } else {
            "/projects".to_owned()
        };
        self.get_data(&path).await
    }

    async fn get_entity(&self, entity_type: EntityType, entity_id: &str) -> Result<EntityRef> {
        let seg = Self::entity_segment(entity_type);
        self.get_data(&format!("/{seg}/{entity_id}")).await
    }

    async fn list_project_work_items(&self, project_id: &str) -> Result<Vec<EntityRef>> {
        self.get_data(&format!("/projects/{project_id}/work-items"))
            .await
    }

    async fn list_work_item_tasks(&self, work_item_id: &str) -> Result<Vec<EntityRef>> {
        self.get_data(&format!("/work-items/{work_item_id}/tasks"))
            .await
    }

    async fn list_entity_sessions(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        limit: u32,
    ) -> Result<Vec<SessionSummary>> {
        let seg = Self::entity_segment(entity_type);
        self.get_data(&format!("/{seg}/{entity_id}/sessions?limit={limit}"))
            .await
    }

    async fn resolve_session(&self, session_key: &str) -> Result<Option<SessionSummary>> {
        let encoded = urlencoding::encode(session_key);
        let path = format!("/sessions/resolve?sessionKey={encoded}");
        match self.get_data::<SessionSummary>(&path).await {
            Ok(summary) => Ok(Some(summary)),
            Err(Error::Protocol { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(base: &str) -> SkClientConfig {
        let mut cfg = SkClientConfig::default();
        cfg.base_url = Some(base.into());
        cfg.api_key = Some("key".into());
        cfg
    }

    #[test]
    fn construction_normalizes_base_url() {
        let client =
            SuperKanbanClient::new(&config_with("https://sk.example.com/api/integrations/openclaw"))
                .unwrap();
        assert_eq!(client.url("/projects"), "https://sk.example.com/api/projects");
    }

    #[test]
    fn construction_fails_without_credentials() {
        let mut cfg = SkClientConfig::default();
        cfg.base_url = Some("https://sk.example.com".into());
        assert!(matches!(
            SuperKanbanClient::new(&cfg),
            Err(Error::AuthMissing(_))
        ));
    }

    #[test]
    fn construction_fails_without_base_url() {
        let mut cfg = SkClientConfig::default();
        cfg.api_key = Some("key".into());
        assert!(matches!(SuperKanbanClient::new(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn timeout_floor_applies() {
        let mut cfg = config_with("https://sk.example.com");
        cfg.timeout_ms = 1;
        let client = SuperKanbanClient::new(&cfg).unwrap();
        assert_eq!(client.timeout, Duration::from_millis(500));
    }
}
