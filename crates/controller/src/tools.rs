//! Direct Super-Kanban tools exposed next to the spawn tool.
//!
//! Thin, read-mostly passthroughs the agent can call without going
//! through a spawn: board listing, entity drill-down, and idempotent
//! comment events.

use serde_json::json;
use sk_client::EventRequest;
use sk_domain::error::Result;
use sk_keys::EntityType;

use crate::controller::SkSyncController;

impl SkSyncController {
    /// List projects, optionally including archived ones.
    pub async fn tool_list_projects(&self, include_archived: bool) -> Result<serde_json::Value> {
        let projects = self.api().list_projects(include_archived).await?;
        Ok(json!({
            "projects": projects
                .iter()
                .map(|p| json!({
                    "id": p.id,
                    "externalId": p.external_id,
                    "status": p.status,
                    "archived": p.archived,
                }))
                .collect::<Vec<_>>()
        }))
    }

    /// One entity plus its direct children and recent sessions.
    pub async fn tool_entity_overview(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<serde_json::Value> {
        let entity = self.api().get_entity(entity_type, entity_id).await?;
        let children = match entity_type {
            EntityType::Project => self.api().list_project_work_items(entity_id).await?,
            EntityType::WorkItem => self.api().list_work_item_tasks(entity_id).await?,
            EntityType::Task => Vec::new(),
        };
        let sessions = self
            .api()
            .list_entity_sessions(entity_type, entity_id, self.session_list_limit())
            .await?;

        Ok(json!({
            "entity": { "id": entity.id, "externalId": entity.external_id, "status": entity.status },
            "children": children
                .iter()
                .map(|c| json!({ "id": c.id, "externalId": c.external_id, "status": c.status }))
                .collect::<Vec<_>>(),
            "sessions": sessions
                .iter()
                .map(|s| json!({
                    "id": s.id,
                    "sessionKey": s.session_key,
                    "state": s.state.as_str(),
                }))
                .collect::<Vec<_>>(),
        }))
    }

    /// Post an idempotent comment event on an entity. The caller-supplied
    /// `event_id` is the dedupe key server-side.
    pub async fn tool_post_comment(
        &self,
        event_id: &str,
        entity_type: EntityType,
        entity_external_id: &str,
        body: &str,
    ) -> Result<()> {
        self.api()
            .post_event(EventRequest {
                event_id: event_id.to_owned(),
                entity_type,
                entity_external_id: entity_external_id.to_owned(),
                kind: "comment".into(),
                body: body.to_owned(),
            })
            .await
    }
}
