//! The [`SuperKanbanApi`] trait — the seam between the integration core
//! and the Super-Kanban service. The exporter, reconciler, and session
//! controller all program against this trait; tests substitute a
//! recording mock.

use async_trait::async_trait;
use sk_domain::error::Result;
use sk_keys::EntityType;

use crate::types::{
    AttachSessionRequest, EntityRef, EventRequest, RecordMessageRequest, RecordToolCallRequest,
    SessionSummary, TaskStatus, UpsertProjectRequest, UpsertTaskRequest, UpsertWorkItemRequest,
};

#[async_trait]
pub trait SuperKanbanApi: Send + Sync {
    // ── integration writes ───────────────────────────────────────────

    async fn upsert_project(&self, req: UpsertProjectRequest) -> Result<EntityRef>;
    async fn upsert_work_item(&self, req: UpsertWorkItemRequest) -> Result<EntityRef>;
    async fn upsert_task(&self, req: UpsertTaskRequest) -> Result<EntityRef>;

    /// Idempotent per `session_key`; repeated Attach-RUNNING is a no-op
    /// server-side.
    async fn attach_session(&self, req: AttachSessionRequest) -> Result<()>;

    async fn record_message(&self, req: RecordMessageRequest) -> Result<()>;
    async fn record_tool_call(&self, req: RecordToolCallRequest) -> Result<()>;

    /// Idempotent comment event, deduped on `event_id`.
    async fn post_event(&self, req: EventRequest) -> Result<()>;

    /// Returns `Err(Error::Conflict)` when the lock is already held.
    async fn lock_task(&self, task_id: &str, owner: &str, ttl_seconds: u64) -> Result<()>;
    async fn unlock_task(&self, task_id: &str, owner: &str) -> Result<()>;

    async fn patch_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()>;
    async fn patch_entity_archived(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        archived: bool,
    ) -> Result<()>;

    // ── UI reads ─────────────────────────────────────────────────────

    async fn list_projects(&self, include_archived: bool) -> Result<Vec<EntityRef>>;
    async fn get_entity(&self, entity_type: EntityType, entity_id: &str) -> Result<EntityRef>;
    async fn list_project_work_items(&self, project_id: &str) -> Result<Vec<EntityRef>>;
    async fn list_work_item_tasks(&self, work_item_id: &str) -> Result<Vec<EntityRef>>;

    /// Sessions attached to an entity, newest first.
    async fn list_entity_sessions(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        limit: u32,
    ) -> Result<Vec<SessionSummary>>;

    /// `Ok(None)` when the session key is unknown (server 404).
    async fn resolve_session(&self, session_key: &str) -> Result<Option<SessionSummary>>;
}
