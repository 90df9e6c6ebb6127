//! Spool draining: one event at a time, attach-before-post, exponential
//! backoff on failure, truncate-on-drain.

use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;
use sk_client::{AttachSessionRequest, SessionState, SuperKanbanApi};
use sk_domain::error::Result;
use sk_domain::TraceEvent;

use crate::meta::MetaFile;
use crate::spool_file::{self, LineAt, SpoolEvent};

/// Backoff for the k-th consecutive failure:
/// `min(30_000, round(500 · 2^min(10,k) · jitter))`, jitter ∈ [0.8, 1.2).
pub fn backoff_ms(consecutive_failures: u32) -> u64 {
    let exp = consecutive_failures.min(10);
    let base = 500f64 * 2f64.powi(exp as i32);
    let jitter = rand::thread_rng().gen_range(0.8f64..1.2f64);
    (base * jitter).round().min(30_000f64) as u64
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Drains `spool.jsonl` into Super-Kanban, cursors persisted in meta.
pub struct SpoolSender {
    api: Arc<dyn SuperKanbanApi>,
    meta_path: PathBuf,
    spool_path: PathBuf,
}

impl SpoolSender {
    pub fn new(api: Arc<dyn SuperKanbanApi>, meta_path: PathBuf, spool_path: PathBuf) -> Self {
        Self {
            api,
            meta_path,
            spool_path,
        }
    }

    /// One sender tick. Processes events until the spool is drained, a
    /// send fails (backoff armed), or a partial trailing line is hit.
    pub async fn process_spool(&self, meta: &mut MetaFile) -> Result<()> {
        if let Some(next) = meta.next_send_at_ms {
            if now_ms() < next {
                return Ok(());
            }
        }

        loop {
            let size = spool_file::file_size(&self.spool_path);
            if meta.spool_offset >= size {
                if size > 0 {
                    spool_file::truncate(&self.spool_path)?;
                    meta.spool_offset = 0;
                    meta.store(&self.meta_path)?;
                    TraceEvent::SpoolDrained {
                        reclaimed_bytes: size,
                    }
                    .emit();
                }
                return Ok(());
            }

            let Some(LineAt { next_offset, event }) =
                spool_file::read_event_at(&self.spool_path, meta.spool_offset)?
            else {
                // Trailing line without its newline yet.
                return Ok(());
            };

            let Some(event) = event else {
                TraceEvent::SpoolLineSkipped {
                    offset: meta.spool_offset,
                    reason: "unparseable".into(),
                }
                .emit();
                meta.spool_offset = next_offset;
                meta.store(&self.meta_path)?;
                continue;
            };

            // A payload that cannot identify its entity can never be
            // routed; discarding is the only non-blocking option.
            if !event_has_entity(&event) {
                tracing::warn!(
                    key = event.key(),
                    kind = event.kind(),
                    "dropping spool event without entity identity"
                );
                TraceEvent::SpoolLineSkipped {
                    offset: meta.spool_offset,
                    reason: "missing entity identity".into(),
                }
                .emit();
                meta.spool_offset = next_offset;
                meta.store(&self.meta_path)?;
                continue;
            }

            match self.send_one(meta, &event).await {
                Ok(()) => {
                    meta.spool_offset = next_offset;
                    meta.consecutive_failures = 0;
                    meta.next_send_at_ms = None;
                    meta.store(&self.meta_path)?;
                    TraceEvent::SpoolSent {
                        kind: event.kind().into(),
                        key: event.key().into(),
                        session_key: event.session_key().into(),
                    }
                    .emit();
                }
                Err(e) => {
                    meta.consecutive_failures += 1;
                    let delay = backoff_ms(meta.consecutive_failures);
                    meta.next_send_at_ms = Some(now_ms() + delay);
                    meta.store(&self.meta_path)?;
                    tracing::warn!(
                        error = %e,
                        consecutive_failures = meta.consecutive_failures,
                        next_send_in_ms = delay,
                        "spool send failed, backing off"
                    );
                    TraceEvent::SpoolBackoff {
                        consecutive_failures: meta.consecutive_failures,
                        next_send_in_ms: delay,
                    }
                    .emit();
                    return Ok(());
                }
            }
        }
    }

    async fn send_one(&self, meta: &mut MetaFile, event: &SpoolEvent) -> Result<()> {
        self.ensure_attached(meta, event).await?;
        match event {
            SpoolEvent::Message { payload } => self.api.record_message(payload.clone()).await,
            SpoolEvent::ToolCall { payload } => self.api.record_tool_call(payload.clone()).await,
        }
    }

    /// Attach-RUNNING at most once per session key. The flag is persisted
    /// immediately on first success; replays after a restart rely on the
    /// server treating repeated Attach-RUNNING as a no-op.
    async fn ensure_attached(&self, meta: &mut MetaFile, event: &SpoolEvent) -> Result<()> {
        let session_key = event.session_key();
        if meta.is_attached(session_key) {
            return Ok(());
        }

        let (entity_type, entity_external_id) = match event {
            SpoolEvent::Message { payload } => {
                (payload.entity_type, payload.entity_external_id.clone())
            }
            SpoolEvent::ToolCall { payload } => {
                (payload.entity_type, payload.entity_external_id.clone())
            }
        };

        self.api
            .attach_session(AttachSessionRequest {
                session_key: session_key.to_owned(),
                entity_type,
                entity_id: None,
                entity_external_id: Some(entity_external_id),
                state: SessionState::Running,
                started_at: None,
                ended_at: None,
            })
            .await?;

        meta.mark_attached(session_key);
        meta.store(&self.meta_path)?;
        TraceEvent::SessionAttached {
            session_key: session_key.to_owned(),
            entity_type: entity_type.as_str().into(),
        }
        .emit();
        Ok(())
    }
}

fn event_has_entity(event: &SpoolEvent) -> bool {
    let external_id = match event {
        SpoolEvent::Message { payload } => &payload.entity_external_id,
        SpoolEvent::ToolCall { payload } => &payload.entity_external_id,
    };
    !external_id.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spool_file::append_events;
    use crate::testing::MockSk;
    use sk_client::RecordMessageRequest;
    use sk_keys::EntityType;

    fn message_event(key: &str) -> SpoolEvent {
        SpoolEvent::Message {
            payload: RecordMessageRequest {
                session_key: "agent:work:sk:1".into(),
                entity_type: EntityType::Task,
                entity_external_id: "task:p:w:t".into(),
                message_key: key.into(),
                role: "user".into(),
                content: "hi".into(),
                occurred_at: None,
                metadata: None,
            },
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        meta_path: PathBuf,
        spool_path: PathBuf,
        api: Arc<MockSk>,
        sender: SpoolSender,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = dir.path().join("meta.json");
        let spool_path = dir.path().join("spool.jsonl");
        let api = Arc::new(MockSk::default());
        let sender = SpoolSender::new(api.clone(), meta_path.clone(), spool_path.clone());
        Fixture {
            _dir: dir,
            meta_path,
            spool_path,
            api,
            sender,
        }
    }

    #[tokio::test]
    async fn attach_happens_before_first_post_and_only_once() {
        let fx = fixture();
        append_events(&fx.spool_path, &[message_event("k1"), message_event("k2")]).unwrap();

        let mut meta = MetaFile::default();
        fx.sender.process_spool(&mut meta).await.unwrap();

        let calls = fx.api.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                "attach agent:work:sk:1 Running",
                "message k1",
                "message k2",
            ]
        );
        assert!(meta.is_attached("agent:work:sk:1"));
        // Drained spool was truncated and the offset reset.
        assert_eq!(meta.spool_offset, 0);
        assert_eq!(spool_file::file_size(&fx.spool_path), 0);
    }

    #[tokio::test]
    async fn failure_arms_backoff_and_keeps_offset() {
        let fx = fixture();
        append_events(&fx.spool_path, &[message_event("k1")]).unwrap();
        *fx.api.fail_sends.lock() = true;

        let mut meta = MetaFile::default();
        fx.sender.process_spool(&mut meta).await.unwrap();

        assert_eq!(meta.spool_offset, 0);
        assert_eq!(meta.consecutive_failures, 1);
        assert!(meta.next_send_at_ms.is_some());

        // Within the backoff window nothing is attempted.
        let calls_before = fx.api.calls.lock().len();
        fx.sender.process_spool(&mut meta).await.unwrap();
        assert_eq!(fx.api.calls.lock().len(), calls_before);

        // After the window clears, the same event is retried and succeeds.
        *fx.api.fail_sends.lock() = false;
        meta.next_send_at_ms = Some(0);
        fx.sender.process_spool(&mut meta).await.unwrap();
        assert_eq!(meta.consecutive_failures, 0);
        assert!(fx.api.calls.lock().iter().any(|c| c == "message k1"));
    }

    #[tokio::test]
    async fn malformed_line_skipped_without_retry() {
        let fx = fixture();
        std::fs::write(&fx.spool_path, "{ garbage\n").unwrap();
        append_events(&fx.spool_path, &[message_event("k1")]).unwrap();

        let mut meta = MetaFile::default();
        fx.sender.process_spool(&mut meta).await.unwrap();
        assert!(fx.api.calls.lock().iter().any(|c| c == "message k1"));
    }

    #[tokio::test]
    async fn event_without_entity_identity_dropped() {
        let fx = fixture();
        let mut bad = message_event("k-bad");
        if let SpoolEvent::Message { payload } = &mut bad {
            payload.entity_external_id = String::new();
        }
        append_events(&fx.spool_path, &[bad, message_event("k-good")]).unwrap();

        let mut meta = MetaFile::default();
        fx.sender.process_spool(&mut meta).await.unwrap();

        let calls = fx.api.calls.lock().clone();
        assert!(!calls.iter().any(|c| c.contains("k-bad")));
        assert!(calls.iter().any(|c| c == "message k-good"));
    }

    #[tokio::test]
    async fn restart_does_not_reattach() {
        let fx = fixture();
        append_events(&fx.spool_path, &[message_event("k1")]).unwrap();

        let mut meta = MetaFile::default();
        meta.mark_attached("agent:work:sk:1");
        fx.sender.process_spool(&mut meta).await.unwrap();

        let calls = fx.api.calls.lock().clone();
        assert!(!calls.iter().any(|c| c.starts_with("attach")));
        assert!(calls.iter().any(|c| c == "message k1"));
        drop(fx.meta_path);
    }

    #[test]
    fn backoff_bounds() {
        for k in 0..20 {
            let ms = backoff_ms(k);
            assert!(ms <= 30_000, "k={k} gave {ms}");
        }
        // k=1 → base 1000, jitter [0.8, 1.2) → [800, 1200] after rounding.
        for _ in 0..50 {
            let ms = backoff_ms(1);
            assert!((800..=1200).contains(&ms), "got {ms}");
        }
        // Saturates at the exponent cap.
        for _ in 0..50 {
            assert_eq!(backoff_ms(10), 30_000);
            assert_eq!(backoff_ms(15), 30_000);
        }
    }
}
