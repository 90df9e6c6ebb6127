//! Spawn tool + lifecycle reconciliation.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use sk_client::{
    AttachSessionRequest, SessionState, SuperKanbanApi, UpsertProjectRequest, UpsertTaskRequest,
    UpsertWorkItemRequest,
};
use sk_domain::config::ControllerConfig;
use sk_domain::error::{Error, Result};
use sk_domain::TraceEvent;
use sk_keys::{
    canonicalize_project_external_id, canonicalize_task_external_id,
    canonicalize_work_item_external_id, clamp_session_label, make_sk_task_hash_label, EntityType,
    MAX_LABEL_CHARS,
};

use crate::outcome::map_outcome;
use crate::tracker::{RunEntry, RunTracker};
use crate::traits::{GatewayRpc, SessionsApi, SpawnSessionRequest, WakeDeliver, WakeRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Spawn tool surface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hierarchy level a spawn binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpawnLevel {
    Orion,
    Atlas,
    Worker,
}

fn d_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    pub level: SpawnLevel,
    /// Instruction text forwarded to the child (or reused) session.
    pub task: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Project external id or bare key.
    pub project: String,
    #[serde(default)]
    pub project_name: Option<String>,
    /// Work-item external id or bare key (required for ATLAS/WORKER).
    #[serde(default)]
    pub work_item: Option<String>,
    #[serde(default)]
    pub work_item_title: Option<String>,
    /// Task external id or bare key (required for WORKER).
    #[serde(default)]
    pub task_key: Option<String>,
    #[serde(default)]
    pub task_title: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default = "d_true")]
    pub wake_parent_on_end: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub run_timeout_seconds: Option<u64>,
}

/// Structured tool result. Lock conflicts are a first-class outcome, not
/// an error.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status")]
pub enum SpawnResponse {
    #[serde(rename = "spawned", rename_all = "camelCase")]
    Spawned {
        run_id: String,
        child_session_key: String,
        entity_type: EntityType,
        entity_external_id: String,
    },
    #[serde(rename = "reused", rename_all = "camelCase")]
    Reused {
        session_key: String,
        entity_type: EntityType,
        entity_external_id: String,
    },
    #[serde(rename = "conflict", rename_all = "camelCase")]
    Conflict {
        reason: String,
        entity_type: EntityType,
    },
}

/// Lifecycle hook payload from the agent runtime.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentEvent {
    #[serde(default)]
    pub run_id: Option<String>,
    /// Child session key.
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub requester_session_key: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Controller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SkSyncController {
    api: Arc<dyn SuperKanbanApi>,
    sessions: Arc<dyn SessionsApi>,
    gateway: Arc<dyn GatewayRpc>,
    config: ControllerConfig,
    tracker: RunTracker,
}

struct BoundEntity {
    entity_type: EntityType,
    entity_external_id: String,
    entity_id: String,
    task_id: Option<String>,
}

impl SkSyncController {
    pub fn new(
        api: Arc<dyn SuperKanbanApi>,
        sessions: Arc<dyn SessionsApi>,
        gateway: Arc<dyn GatewayRpc>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            api,
            sessions,
            gateway,
            config,
            tracker: RunTracker::new(),
        }
    }

    pub fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    pub(crate) fn api(&self) -> &Arc<dyn SuperKanbanApi> {
        &self.api
    }

    pub(crate) fn session_list_limit(&self) -> u32 {
        self.config.session_list_limit
    }

    // ── spawn ────────────────────────────────────────────────────────

    /// The agent-callable spawn tool.
    pub async fn spawn(
        &self,
        ctx_session_key: &str,
        req: SpawnRequest,
    ) -> Result<SpawnResponse> {
        // Canonicalize everything before the first network call so a bad
        // id fails deterministically with nothing half-created.
        let entity = self.upsert_entities(&req).await?;

        if req.level == SpawnLevel::Worker {
            let task_id = entity
                .task_id
                .as_deref()
                .expect("worker level always has a task");
            match self
                .api
                .lock_task(
                    task_id,
                    ctx_session_key,
                    self.config.effective_lock_ttl_seconds(),
                )
                .await
            {
                Ok(()) => {}
                Err(Error::Conflict { reason }) => {
                    return Ok(SpawnResponse::Conflict {
                        reason,
                        entity_type: entity.entity_type,
                    });
                }
                Err(e) => return Err(e),
            }
        } else {
            // ORION/ATLAS prefer joining an existing execution session.
            if let Some(reused) = self.try_reuse(&entity, &req).await? {
                return Ok(reused);
            }
        }

        self.spawn_child(ctx_session_key, &req, entity).await
    }

    async fn upsert_entities(&self, req: &SpawnRequest) -> Result<BoundEntity> {
        let project_external = canonicalize_project_external_id(&req.project)?;
        let project_key = last_segment(&project_external);

        let needs_work_item = matches!(req.level, SpawnLevel::Atlas | SpawnLevel::Worker);
        let work_item = if needs_work_item {
            let input = req.work_item.as_deref().ok_or_else(|| {
                Error::Config("workItem is required for ATLAS/WORKER spawns".into())
            })?;
            Some(canonicalize_work_item_external_id(input, &project_key)?)
        } else {
            None
        };

        let task = if req.level == SpawnLevel::Worker {
            let input = req.task_key.as_deref().ok_or_else(|| {
                Error::Config("task is required for WORKER spawns".into())
            })?;
            let work_item_key = last_segment(work_item.as_deref().expect("checked above"));
            Some(canonicalize_task_external_id(input, &project_key, &work_item_key)?)
        } else {
            None
        };

        // Upsert bottom-up relative to the level; IN_PROGRESS by default.
        let project_ref = self
            .api
            .upsert_project(UpsertProjectRequest {
                external_id: project_external.clone(),
                name: req.project_name.clone().unwrap_or_else(|| project_key.clone()),
                status: Some("IN_PROGRESS".into()),
            })
            .await?;

        let mut entity = BoundEntity {
            entity_type: EntityType::Project,
            entity_external_id: project_external.clone(),
            entity_id: project_ref.id,
            task_id: None,
        };

        if let Some(work_item_external) = &work_item {
            let work_item_ref = self
                .api
                .upsert_work_item(UpsertWorkItemRequest {
                    external_id: work_item_external.clone(),
                    project_external_id: project_external.clone(),
                    title: req
                        .work_item_title
                        .clone()
                        .unwrap_or_else(|| last_segment(work_item_external)),
                    status: Some("IN_PROGRESS".into()),
                })
                .await?;
            if req.level == SpawnLevel::Atlas {
                entity = BoundEntity {
                    entity_type: EntityType::WorkItem,
                    entity_external_id: work_item_external.clone(),
                    entity_id: work_item_ref.id,
                    task_id: None,
                };
            }

            if let Some(task_external) = &task {
                let task_ref = self
                    .api
                    .upsert_task(UpsertTaskRequest {
                        external_id: task_external.clone(),
                        work_item_external_id: work_item_external.clone(),
                        title: req
                            .task_title
                            .clone()
                            .unwrap_or_else(|| last_segment(task_external)),
                        status: Some("IN_PROGRESS".into()),
                    })
                    .await?;
                entity = BoundEntity {
                    entity_type: EntityType::Task,
                    entity_external_id: task_external.clone(),
                    entity_id: task_ref.id.clone(),
                    task_id: Some(task_ref.id),
                };
            }
        }

        Ok(entity)
    }

    async fn try_reuse(
        &self,
        entity: &BoundEntity,
        req: &SpawnRequest,
    ) -> Result<Option<SpawnResponse>> {
        let sessions = self
            .api
            .list_entity_sessions(
                entity.entity_type,
                &entity.entity_id,
                self.config.session_list_limit,
            )
            .await?;

        let existing = sessions
            .iter()
            .find(|s| s.state == SessionState::Running)
            .or_else(|| sessions.first());
        let Some(existing) = existing else {
            return Ok(None);
        };

        self.api
            .attach_session(AttachSessionRequest {
                session_key: existing.session_key.clone(),
                entity_type: entity.entity_type,
                entity_id: Some(entity.entity_id.clone()),
                entity_external_id: Some(entity.entity_external_id.clone()),
                state: SessionState::Running,
                started_at: None,
                ended_at: None,
            })
            .await?;
        self.sessions
            .sessions_send(&existing.session_key, &req.task)
            .await?;

        tracing::info!(
            session_key = %existing.session_key,
            entity_external_id = %entity.entity_external_id,
            "reusing existing session"
        );
        Ok(Some(SpawnResponse::Reused {
            session_key: existing.session_key.clone(),
            entity_type: entity.entity_type,
            entity_external_id: entity.entity_external_id.clone(),
        }))
    }

    async fn spawn_child(
        &self,
        ctx_session_key: &str,
        req: &SpawnRequest,
        entity: BoundEntity,
    ) -> Result<SpawnResponse> {
        let label = match &req.label {
            Some(label) => clamp_session_label(label),
            None => derive_session_label(entity.entity_type, &entity.entity_external_id)?,
        };

        let result = self
            .sessions
            .sessions_spawn(SpawnSessionRequest {
                task: req.task.clone(),
                label: Some(label),
                agent_id: req.agent_id.clone(),
                model: req.model.clone(),
                thinking: req.thinking.clone(),
                cwd: req.cwd.clone(),
                run_timeout_seconds: req.run_timeout_seconds,
                mode: "run".into(),
                cleanup: "keep".into(),
            })
            .await?;

        if !result.accepted {
            if let Some(task_id) = &entity.task_id {
                // The lock would otherwise dangle until its TTL.
                if let Err(e) = self.api.unlock_task(task_id, ctx_session_key).await {
                    tracing::warn!(task_id = %task_id, error = %e, "best-effort unlock failed");
                }
            }
            return Err(Error::Other(format!(
                "session spawn rejected: {}",
                result.error.as_deref().unwrap_or("no reason given")
            )));
        }

        let run_id = result
            .run_id
            .ok_or_else(|| Error::Other("spawn accepted without a runId".into()))?;
        let child_session_key = result
            .session_key
            .ok_or_else(|| Error::Other("spawn accepted without a sessionKey".into()))?;

        self.tracker.track(
            &run_id,
            RunEntry {
                parent_session_key: ctx_session_key.to_owned(),
                child_session_key: child_session_key.clone(),
                wake_parent_on_end: req.wake_parent_on_end,
                entity_type: entity.entity_type,
                entity_external_id: entity.entity_external_id.clone(),
                task_id: entity.task_id.clone(),
                lock_owner: entity.task_id.as_ref().map(|_| ctx_session_key.to_owned()),
            },
        );

        // Attach the child eagerly so SK shows it RUNNING before the
        // first transcript line flows. Best-effort: the exporter's
        // attach-before-post covers a miss here.
        if let Err(e) = self
            .api
            .attach_session(AttachSessionRequest {
                session_key: child_session_key.clone(),
                entity_type: entity.entity_type,
                entity_id: Some(entity.entity_id.clone()),
                entity_external_id: Some(entity.entity_external_id.clone()),
                state: SessionState::Running,
                started_at: Some(now_iso()),
                ended_at: None,
            })
            .await
        {
            tracing::warn!(child = %child_session_key, error = %e, "child attach failed");
        }

        Ok(SpawnResponse::Spawned {
            run_id,
            child_session_key,
            entity_type: entity.entity_type,
            entity_external_id: entity.entity_external_id,
        })
    }

    // ── lifecycle hooks ──────────────────────────────────────────────

    /// `subagent_spawned`: remember who asked for this child so later
    /// unlocks can be attributed to the requester.
    pub fn subagent_spawned(&self, event: &SubagentEvent) {
        if let (Some(child), Some(requester)) =
            (&event.session_key, &event.requester_session_key)
        {
            self.tracker.map_requester(child, requester);
        }
    }

    /// `agent_end`: fast path, only for sessions this controller spawned.
    pub async fn agent_end(&self, event: &SubagentEvent) {
        let Some(child) = event.session_key.as_deref() else {
            return;
        };
        let Some((_, entry)) = self.tracker.find_by_child(child) else {
            return;
        };
        let outcome = event.outcome.as_deref().unwrap_or("error");
        self.close_run(&entry, outcome).await;
    }

    /// `subagent_ended`: fallback close with identical semantics, plus
    /// the wake-parent tracker.
    pub async fn subagent_ended(&self, event: &SubagentEvent) {
        let outcome = event
            .outcome
            .as_deref()
            .unwrap_or("error")
            .to_owned();

        let located = event
            .run_id
            .clone()
            .and_then(|run_id| self.tracker.get(&run_id).map(|e| (run_id, e)))
            .or_else(|| {
                event
                    .session_key
                    .as_deref()
                    .and_then(|child| self.tracker.find_by_child(child))
            });

        let Some((run_id, entry)) = located else {
            if let Some(child) = event.session_key.as_deref() {
                self.tracker.forget_requester(child);
            }
            return;
        };

        self.close_run(&entry, &outcome).await;
        self.wake_parent(&run_id, &outcome).await;
        self.tracker.forget_requester(&entry.child_session_key);
    }

    /// Close out a run: terminal attach (unless SK already shows a
    /// terminal state) and, for TASK runs, status + unlock. Task status
    /// and unlock are re-applied even on replays; SESSION_ENDED is not.
    async fn close_run(&self, entry: &RunEntry, outcome: &str) {
        let (state, task_status) = map_outcome(outcome);

        let already_terminal = matches!(
            self.api.resolve_session(&entry.child_session_key).await,
            Ok(Some(summary)) if summary.state.is_terminal()
        );

        if !already_terminal {
            if let Err(e) = self
                .api
                .attach_session(AttachSessionRequest {
                    session_key: entry.child_session_key.clone(),
                    entity_type: entry.entity_type,
                    entity_id: None,
                    entity_external_id: Some(entry.entity_external_id.clone()),
                    state,
                    started_at: None,
                    ended_at: Some(now_iso()),
                })
                .await
            {
                tracing::warn!(
                    child = %entry.child_session_key,
                    error = %e,
                    "terminal attach failed"
                );
            }
        }

        if entry.entity_type == EntityType::Task {
            if let Some(task_id) = &entry.task_id {
                if let Err(e) = self.api.patch_task_status(task_id, task_status).await {
                    tracing::warn!(task_id = %task_id, error = %e, "task status patch failed");
                }
                if let Some(owner) = &entry.lock_owner {
                    if let Err(e) = self.api.unlock_task(task_id, owner).await {
                        tracing::warn!(task_id = %task_id, error = %e, "task unlock failed");
                    }
                }
            }
        }
    }

    /// At most one wake per run id: the tracker entry is removed before
    /// the RPC is attempted, success or not.
    async fn wake_parent(&self, run_id: &str, outcome: &str) {
        let Some(entry) = self.tracker.take(run_id) else {
            return;
        };
        if !entry.wake_parent_on_end {
            return;
        }

        let (state, _) = map_outcome(outcome);
        let message = format!(
            "Sub-agent run finished: status={} outcome={outcome} child={} run={run_id}",
            state.as_str(),
            entry.child_session_key
        );

        let req = WakeRequest {
            session_key: entry.parent_session_key.clone(),
            deliver: if self.config.wake_deliver {
                WakeDeliver::LastChannel
            } else {
                WakeDeliver::Suppressed
            },
            lane: "sk-sync-wake".into(),
            idempotency_key: uuid::Uuid::new_v4().to_string(),
            message,
        };

        if let Err(e) = self.gateway.agent_wake(req).await {
            tracing::warn!(run_id = %run_id, error = %e, "parent wake failed");
        }
        TraceEvent::ParentWake {
            run_id: run_id.to_owned(),
            parent_session_key: entry.parent_session_key,
            outcome: outcome.to_owned(),
        }
        .emit();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn last_segment(external_id: &str) -> String {
    external_id
        .rsplit(':')
        .next()
        .unwrap_or(external_id)
        .to_owned()
}

/// Routing label for a freshly spawned session. Tasks with overlong
/// external ids fall back to the hashed form so the label still binds;
/// other levels reject instead of producing an unparseable label.
fn derive_session_label(entity_type: EntityType, entity_external_id: &str) -> Result<String> {
    let direct = match entity_type {
        EntityType::Project => format!("SK:PROJECT:{entity_external_id}"),
        EntityType::WorkItem => format!("SK:WORK_ITEM:{entity_external_id}"),
        EntityType::Task => format!("SK:TASK:{entity_external_id}"),
    };
    if direct.chars().count() <= MAX_LABEL_CHARS {
        return Ok(direct);
    }
    if entity_type == EntityType::Task {
        return Ok(make_sk_task_hash_label(entity_external_id));
    }
    Err(Error::InvalidExternalId(format!(
        "label for {entity_external_id:?} exceeds {MAX_LABEL_CHARS} characters"
    )))
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
