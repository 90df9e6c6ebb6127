//! End-to-end reconciler flows over a seeded state directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sk_client::{
    AttachSessionRequest, EntityRef, EventRequest, RecordMessageRequest, RecordToolCallRequest,
    SessionSummary, SuperKanbanApi, TaskStatus, UpsertProjectRequest, UpsertTaskRequest,
    UpsertWorkItemRequest,
};
use sk_domain::error::Error;
use sk_keys::{make_sk_task_hash_label, EntityType};
use sk_reconcile::{ReconcileMode, ReconcileOptions, Reconciler};
use sk_spool::{BindingResolver, LabelMap};

// ── recording mock ───────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSk {
    requests: Mutex<Vec<String>>,
}

#[async_trait]
impl SuperKanbanApi for RecordingSk {
    async fn upsert_project(&self, _r: UpsertProjectRequest) -> sk_domain::Result<EntityRef> {
        unimplemented!("reconciler never upserts entities")
    }
    async fn upsert_work_item(&self, _r: UpsertWorkItemRequest) -> sk_domain::Result<EntityRef> {
        unimplemented!("reconciler never upserts entities")
    }
    async fn upsert_task(&self, _r: UpsertTaskRequest) -> sk_domain::Result<EntityRef> {
        unimplemented!("reconciler never upserts entities")
    }
    async fn attach_session(&self, r: AttachSessionRequest) -> sk_domain::Result<()> {
        self.requests.lock().push(format!("attach {}", r.session_key));
        Ok(())
    }
    async fn record_message(&self, r: RecordMessageRequest) -> sk_domain::Result<()> {
        self.requests.lock().push(format!("message {}", r.message_key));
        Ok(())
    }
    async fn record_tool_call(&self, r: RecordToolCallRequest) -> sk_domain::Result<()> {
        self.requests
            .lock()
            .push(format!("toolCall {} {}", r.tool_call_key, r.status));
        Ok(())
    }
    async fn post_event(&self, _r: EventRequest) -> sk_domain::Result<()> {
        Ok(())
    }
    async fn lock_task(&self, _t: &str, _o: &str, _ttl: u64) -> sk_domain::Result<()> {
        Ok(())
    }
    async fn unlock_task(&self, _t: &str, _o: &str) -> sk_domain::Result<()> {
        Ok(())
    }
    async fn patch_task_status(&self, _t: &str, _s: TaskStatus) -> sk_domain::Result<()> {
        Ok(())
    }
    async fn patch_entity_archived(
        &self,
        _t: EntityType,
        _id: &str,
        _a: bool,
    ) -> sk_domain::Result<()> {
        Ok(())
    }
    async fn list_projects(&self, _a: bool) -> sk_domain::Result<Vec<EntityRef>> {
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
        _l: u32,
    ) -> sk_domain::Result<Vec<SessionSummary>> {
        Ok(Vec::new())
    }
    async fn resolve_session(&self, _k: &str) -> sk_domain::Result<Option<SessionSummary>> {
        Ok(None)
    }
}

// ── fixtures ─────────────────────────────────────────────────────────

const LINES: [&str; 3] = [
    r#"{"type":"message","id":"m1","timestamp":1000,"message":{"role":"user","content":"hello"}}"#,
    r#"{"type":"message","id":"m2","timestamp":2000,"message":{"role":"assistant","content":[{"type":"text","text":"ok"},{"type":"toolCall","id":"tc1","name":"functions.read","arguments":{"path":"/tmp/file"}}]}}"#,
    r#"{"type":"message","id":"m3","timestamp":3000,"message":{"role":"toolResult","toolCallId":"tc1","content":"done"}}"#,
];

fn seed_state(dir: &Path, label: &str) -> PathBuf {
    let sessions = dir.join("agents/work/sessions");
    std::fs::create_dir_all(&sessions).unwrap();
    std::fs::write(
        sessions.join("sessions.json"),
        format!(r#"{{"agent:work:sk": {{"sessionId": "s-1", "label": "{label}"}}}}"#),
    )
    .unwrap();
    let transcript = sessions.join("s-1.jsonl");
    std::fs::write(&transcript, format!("{}\n", LINES.join("\n"))).unwrap();
    transcript
}

fn resolver(dir: &Path) -> BindingResolver {
    let map = Arc::new(LabelMap::load(dir.join("Exports/label-map.json")));
    BindingResolver::new(dir.to_path_buf(), map)
}

// ── tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_counts_without_posting() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), "SK:TASK:task:p:w:t1");

    let options = ReconcileOptions::new(ReconcileMode::DryRun, dir.path().to_path_buf());
    let reconciler = Reconciler::new(options, resolver(dir.path()), None).unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.sessions_scanned, 1);
    assert_eq!(report.sessions_matched, 1);
    assert_eq!(report.sessions_skipped, 0);
    assert_eq!(report.messages, 3);
    assert_eq!(report.tool_calls, 2);
    assert_eq!(report.requests_posted, 0);

    let session = &report.sessions[0];
    assert_eq!(session.first_occurred_at.as_deref(), Some("1970-01-01T00:00:01.000Z"));
    assert_eq!(session.last_occurred_at.as_deref(), Some("1970-01-01T00:00:03.000Z"));
    assert!(!session.message_key_preview.is_empty());
}

#[tokio::test]
async fn fix_posts_attach_plus_messages_plus_tool_calls() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), "SK:TASK:task:p:w:t1");

    let api = Arc::new(RecordingSk::default());
    let options = ReconcileOptions::new(ReconcileMode::Fix, dir.path().to_path_buf());
    let reconciler = Reconciler::new(
        options,
        resolver(dir.path()),
        Some(api.clone() as Arc<dyn SuperKanbanApi>),
    )
    .unwrap();
    let report = reconciler.run().await.unwrap();

    // 1 attach + 3 messages + 2 tool calls.
    assert_eq!(report.requests_posted, 6);

    let requests = api.requests.lock().clone();
    assert_eq!(requests[0], "attach agent:work:sk");
    let tool_calls: Vec<_> = requests.iter().filter(|r| r.starts_with("toolCall")).collect();
    assert_eq!(
        tool_calls,
        vec!["toolCall agent:work:sk:tc1 STARTED", "toolCall agent:work:sk:tc1 SUCCEEDED"]
    );
}

#[tokio::test]
async fn fix_replay_is_idempotent_in_keys() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), "SK:TASK:task:p:w:t1");

    let run = |api: Arc<RecordingSk>| {
        let options = ReconcileOptions::new(ReconcileMode::Fix, dir.path().to_path_buf());
        let reconciler = Reconciler::new(
            options,
            resolver(dir.path()),
            Some(api as Arc<dyn SuperKanbanApi>),
        )
        .unwrap();
        async move { reconciler.run().await.unwrap() }
    };

    let api1 = Arc::new(RecordingSk::default());
    let api2 = Arc::new(RecordingSk::default());
    run(api1.clone()).await;
    run(api2.clone()).await;

    assert_eq!(*api1.requests.lock(), *api2.requests.lock());
}

#[tokio::test]
async fn hashed_label_resolved_and_mapped_in_fix_mode() {
    let dir = tempfile::tempdir().unwrap();
    let external_id = "task:alpha:w1:t9";
    let label = make_sk_task_hash_label(external_id);
    let transcript = seed_state(dir.path(), &label);

    // Mention the external id in the transcript prefix, as spawn prompts do.
    let prefix =
        r#"{"type":"message","id":"m0","message":{"role":"user","content":"work on task:alpha:w1:t9"}}"#;
    let existing = std::fs::read_to_string(&transcript).unwrap();
    std::fs::write(&transcript, format!("{prefix}\n{existing}")).unwrap();

    let api = Arc::new(RecordingSk::default());
    let options = ReconcileOptions::new(ReconcileMode::Fix, dir.path().to_path_buf());
    let binding_resolver = resolver(dir.path());
    let reconciler = Reconciler::new(
        options,
        binding_resolver,
        Some(api.clone() as Arc<dyn SuperKanbanApi>),
    )
    .unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.sessions_matched, 1);
    assert_eq!(report.label_mappings_added, 1);
    assert_eq!(report.sessions[0].entity_external_id, external_id);

    // The mapping persisted: a fresh resolver finds it without a scan.
    let fresh = resolver(dir.path());
    let binding = fresh.binding_from_label("agent:work:sk", &label).unwrap();
    assert_eq!(binding.entity_external_id, external_id);
}

#[tokio::test]
async fn dry_run_with_unbound_label_skips() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), "weekly planning");

    let options = ReconcileOptions::new(ReconcileMode::DryRun, dir.path().to_path_buf());
    let reconciler = Reconciler::new(options, resolver(dir.path()), None).unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.sessions_scanned, 1);
    assert_eq!(report.sessions_matched, 0);
    assert_eq!(report.sessions_skipped, 1);
}

#[tokio::test]
async fn filters_narrow_the_traversal() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), "SK:TASK:task:p:w:t1");

    let mut options = ReconcileOptions::new(ReconcileMode::DryRun, dir.path().to_path_buf());
    options.agent_id = Some("other".into());
    let reconciler = Reconciler::new(options, resolver(dir.path()), None).unwrap();
    let report = reconciler.run().await.unwrap();
    assert_eq!(report.sessions_scanned, 0);

    let mut options = ReconcileOptions::new(ReconcileMode::DryRun, dir.path().to_path_buf());
    options.agent_allowlist = vec!["work".into()];
    let reconciler = Reconciler::new(options, resolver(dir.path()), None).unwrap();
    let report = reconciler.run().await.unwrap();
    assert_eq!(report.sessions_matched, 1);
}
