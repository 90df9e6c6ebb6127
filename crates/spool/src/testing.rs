//! Shared recording mock of [`SuperKanbanApi`] for this crate's tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use sk_client::{
    AttachSessionRequest, EntityRef, EventRequest, RecordMessageRequest, RecordToolCallRequest,
    SessionSummary, SuperKanbanApi, TaskStatus, UpsertProjectRequest, UpsertTaskRequest,
    UpsertWorkItemRequest,
};
use sk_domain::error::Error;
use sk_keys::EntityType;

#[derive(Default)]
pub(crate) struct MockSk {
    pub calls: Mutex<Vec<String>>,
    pub fail_sends: Mutex<bool>,
}

#[async_trait]
impl SuperKanbanApi for MockSk {
    async fn upsert_project(&self, req: UpsertProjectRequest) -> sk_domain::Result<EntityRef> {
        self.calls.lock().push(format!("upsert_project {}", req.external_id));
        Ok(EntityRef {
            id: "p1".into(),
            external_id: Some(req.external_id),
            status: None,
            archived: None,
        })
    }

    async fn upsert_work_item(&self, req: UpsertWorkItemRequest) -> sk_domain::Result<EntityRef> {
        self.calls.lock().push(format!("upsert_work_item {}", req.external_id));
        Ok(EntityRef {
            id: "w1".into(),
            external_id: Some(req.external_id),
            status: None,
            archived: None,
        })
    }

    async fn upsert_task(&self, req: UpsertTaskRequest) -> sk_domain::Result<EntityRef> {
        self.calls.lock().push(format!("upsert_task {}", req.external_id));
        Ok(EntityRef {
            id: "t1".into(),
            external_id: Some(req.external_id),
            status: None,
            archived: None,
        })
    }

    async fn attach_session(&self, req: AttachSessionRequest) -> sk_domain::Result<()> {
        self.calls
            .lock()
            .push(format!("attach {} {:?}", req.session_key, req.state));
        Ok(())
    }

    async fn record_message(&self, req: RecordMessageRequest) -> sk_domain::Result<()> {
        if *self.fail_sends.lock() {
            return Err(Error::Http("connection refused".into()));
        }
        self.calls.lock().push(format!("message {}", req.message_key));
        Ok(())
    }

    async fn record_tool_call(&self, req: RecordToolCallRequest) -> sk_domain::Result<()> {
        if *self.fail_sends.lock() {
            return Err(Error::Http("connection refused".into()));
        }
        self.calls
            .lock()
            .push(format!("toolCall {} {}", req.tool_call_key, req.status));
        Ok(())
    }

    async fn post_event(&self, req: EventRequest) -> sk_domain::Result<()> {
        self.calls.lock().push(format!("event {}", req.event_id));
        Ok(())
    }

    async fn lock_task(&self, task_id: &str, _owner: &str, _ttl: u64) -> sk_domain::Result<()> {
        self.calls.lock().push(format!("lock {task_id}"));
        Ok(())
    }

    async fn unlock_task(&self, task_id: &str, _owner: &str) -> sk_domain::Result<()> {
        self.calls.lock().push(format!("unlock {task_id}"));
        Ok(())
    }

    async fn patch_task_status(&self, task_id: &str, status: TaskStatus) -> sk_domain::Result<()> {
        self.calls
            .lock()
            .push(format!("patch_task {task_id} {status:?}"));
        Ok(())
    }

    async fn patch_entity_archived(
        &self,
        _entity_type: EntityType,
        entity_id: &str,
        archived: bool,
    ) -> sk_domain::Result<()> {
        self.calls.lock().push(format!("archive {entity_id} {archived}"));
        Ok(())
    }

    async fn list_projects(&self, _include_archived: bool) -> sk_domain::Result<Vec<EntityRef>> {
        Ok(Vec::new())
    }

    async fn get_entity(&self, _t: EntityType, _id: &str) -> sk_domain::Result<EntityRef> {
        Err(Error::Protocol { status: 404, body: None })
    }

    async fn list_project_work_items(&self, _id: &str) -> sk_domain::Result<Vec<EntityRef>> {
        Ok(Vec::new())
    }

    async fn list_work_item_tasks(&self, _id: &str) -> sk_domain::Result<Vec<EntityRef>> {
        Ok(Vec::new())
    }

    async fn list_entity_sessions(
        &self,
        _t: EntityType,
        _id: &str,
        _limit: u32,
    ) -> sk_domain::Result<Vec<SessionSummary>> {
        Ok(Vec::new())
    }

    async fn resolve_session(&self, _key: &str) -> sk_domain::Result<Option<SessionSummary>> {
        Ok(None)
    }
}
