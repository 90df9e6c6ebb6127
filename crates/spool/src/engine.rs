//! The spool engine — one owning task per plugin instance.
//!
//! Two periodic ticks drive the pipeline: the tailer scans transcripts
//! for appended bytes and stages normalized events in memory, and the
//! sender (every 250 ms) flushes staged events to the spool file after a
//! debounce window, then drains the spool toward Super-Kanban. All meta
//! mutation happens on this task, which is what makes the file cursors
//! and the spool offset safe without cross-task locking.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use sk_client::SuperKanbanApi;
use sk_domain::config::ExporterConfig;
use sk_domain::error::Result;
use sk_domain::TraceEvent;
use sk_keys::parse_session_file_context;
use sk_transcript::{parse_line, Redactor};

use crate::bindings::BindingResolver;
use crate::convert::build_spool_events;
use crate::meta::MetaFile;
use crate::sender::SpoolSender;
use crate::spool_file::{self, SpoolEvent};
use crate::tailer::{discover_transcripts, read_new_lines, MAX_LINES_PER_TICK};

const SENDER_TICK: Duration = Duration::from_millis(250);

/// Filesystem locations owned by one exporter instance.
#[derive(Debug, Clone)]
pub struct SpoolPaths {
    pub meta: PathBuf,
    pub spool: PathBuf,
}

impl SpoolPaths {
    pub fn for_plugin(state_dir: &std::path::Path, plugin_id: &str) -> Self {
        let base = state_dir.join("plugins").join(plugin_id);
        Self {
            meta: base.join("meta.json"),
            spool: base.join("spool.jsonl"),
        }
    }
}

pub struct SpoolEngine {
    config: ExporterConfig,
    paths: SpoolPaths,
    meta: MetaFile,
    resolver: BindingResolver,
    redactor: Redactor,
    sender: SpoolSender,
    pending: Vec<SpoolEvent>,
    flush_due_at: Option<Instant>,
}

impl SpoolEngine {
    pub fn new(
        config: ExporterConfig,
        api: Arc<dyn SuperKanbanApi>,
        resolver: BindingResolver,
    ) -> Self {
        let paths = SpoolPaths::for_plugin(&config.state_dir, &config.plugin_id);
        let meta = MetaFile::load(&paths.meta);
        let redactor = Redactor::new(&config.redaction);
        let sender = SpoolSender::new(api, paths.meta.clone(), paths.spool.clone());

        Self {
            config,
            paths,
            meta,
            resolver,
            redactor,
            sender,
            pending: Vec::new(),
            flush_due_at: None,
        }
    }

    /// Stage already-normalized events and arm a single-shot flush.
    pub fn enqueue_events(&mut self, events: Vec<SpoolEvent>) {
        if events.is_empty() {
            return;
        }
        self.pending.extend(events);
        if self.flush_due_at.is_none() {
            self.flush_due_at =
                Some(Instant::now() + Duration::from_millis(self.config.debounce_ms));
        }
    }

    /// One tailer pass over every known transcript.
    ///
    /// Cursors advance for every consumed line, bound or not; only bound
    /// lines produce events. Per-file errors are logged and skipped so a
    /// single bad file cannot stall the rest.
    pub fn tailer_tick(&mut self) {
        let mut cursors_changed = false;

        for path in discover_transcripts(&self.config.state_dir) {
            let path_str = path.to_string_lossy().into_owned();

            let cursor = match self.meta.cursor(&path_str) {
                Some(offset) => offset,
                None => {
                    // First sighting: start at end-of-file unless backfill
                    // was requested.
                    let start = if self.config.backfill {
                        0
                    } else {
                        spool_file::file_size(&path)
                    };
                    self.meta.set_cursor(&path_str, start);
                    cursors_changed = true;
                    start
                }
            };

            let batch = match read_new_lines(&path, cursor, MAX_LINES_PER_TICK) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "tailer read failed");
                    continue;
                }
            };

            if batch.new_offset != cursor {
                self.meta.set_cursor(&path_str, batch.new_offset);
                cursors_changed = true;
            }
            if batch.lines.is_empty() {
                continue;
            }

            let Some(ctx) = parse_session_file_context(&path) else {
                continue;
            };
            let Some(agent_id) = ctx.agent_id.as_deref() else {
                continue;
            };
            // Binding gate: unbound sessions are skipped silently.
            let Some(binding) = self.resolver.resolve(agent_id, &ctx.session_id) else {
                continue;
            };

            let mut events = Vec::new();
            for line in &batch.lines {
                if let Some(parsed) = parse_line(&ctx, line) {
                    events.extend(build_spool_events(&binding, &parsed, &self.redactor));
                }
            }
            self.enqueue_events(events);
        }

        // Cursor movement with nothing staged still needs to reach disk;
        // otherwise a crash would replay far more than one debounce worth.
        if cursors_changed && self.pending.is_empty() {
            if let Err(e) = self.meta.store(&self.paths.meta) {
                tracing::warn!(error = %e, "failed to persist cursors");
            }
        }
    }

    /// Append all staged events to the spool, then persist meta (which
    /// captures any cursor movement from the producing ticks).
    pub fn flush(&mut self) -> Result<()> {
        self.flush_due_at = None;
        if self.pending.is_empty() {
            return Ok(());
        }
        let events = std::mem::take(&mut self.pending);
        let spool_bytes = spool_file::append_events(&self.paths.spool, &events)?;
        self.meta.store(&self.paths.meta)?;
        TraceEvent::SpoolFlush {
            events: events.len(),
            spool_bytes,
        }
        .emit();
        Ok(())
    }

    /// One sender pass: flush if the debounce window elapsed, then drain.
    pub async fn sender_tick(&mut self) {
        if let Some(due) = self.flush_due_at {
            if Instant::now() >= due {
                if let Err(e) = self.flush() {
                    tracing::warn!(error = %e, "spool flush failed");
                }
            }
        }
        if let Err(e) = self.sender.process_spool(&mut self.meta).await {
            tracing::warn!(error = %e, "spool processing failed");
        }
    }

    /// Drive the engine until `shutdown` flips. A final flush captures
    /// staged events and cursors on the way out.
    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut tail = tokio::time::interval(Duration::from_millis(
            self.config.effective_poll_interval_ms(),
        ));
        let mut send = tokio::time::interval(SENDER_TICK);
        tail.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        send.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            state_dir = %self.config.state_dir.display(),
            spool = %self.paths.spool.display(),
            "spool engine started"
        );

        loop {
            tokio::select! {
                _ = tail.tick() => self.tailer_tick(),
                _ = send.tick() => self.sender_tick().await,
                _ = shutdown.changed() => {
                    if let Err(e) = self.flush() {
                        tracing::warn!(error = %e, "final flush failed");
                    }
                    tracing::info!("spool engine stopped");
                    return;
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn meta(&self) -> &MetaFile {
        &self.meta
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label_map::LabelMap;
    use crate::testing::MockSk;
    use std::io::Write;
    use std::path::Path;

    struct Fixture {
        dir: tempfile::TempDir,
        api: Arc<MockSk>,
        engine: SpoolEngine,
    }

    fn fixture(backfill: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ExporterConfig::default();
        config.state_dir = dir.path().to_path_buf();
        config.backfill = backfill;

        let api = Arc::new(MockSk::default());
        let label_map = Arc::new(LabelMap::load(dir.path().join("Exports/label-map.json")));
        let resolver = BindingResolver::new(dir.path().to_path_buf(), label_map);
        let engine = SpoolEngine::new(config, api.clone(), resolver);
        Fixture { dir, api, engine }
    }

    fn seed_session(dir: &Path, agent: &str, session: &str, label: &str) -> PathBuf {
        let sessions = dir.join("agents").join(agent).join("sessions");
        std::fs::create_dir_all(&sessions).unwrap();
        std::fs::write(
            sessions.join("sessions.json"),
            format!(
                r#"{{"agent:{agent}:sk": {{"sessionId": "{session}", "label": "{label}"}}}}"#
            ),
        )
        .unwrap();
        sessions.join(format!("{session}.jsonl"))
    }

    fn append(path: &Path, lines: &[&str]) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
    }

    const USER_LINE: &str =
        r#"{"type":"message","id":"m1","timestamp":1000,"message":{"role":"user","content":"hello"}}"#;

    #[tokio::test]
    async fn end_to_end_tail_flush_send() {
        let mut fx = fixture(true);
        let transcript = seed_session(fx.dir.path(), "work", "s-1", "SK:TASK:task:p:w:t1");
        append(&transcript, &[USER_LINE]);

        fx.engine.tailer_tick();
        assert_eq!(fx.engine.pending_len(), 1);

        fx.engine.flush().unwrap();
        fx.engine.sender_tick().await;

        let calls = fx.api.calls.lock().clone();
        assert_eq!(calls[0], "attach agent:work:sk Running");
        assert!(calls[1].starts_with("message agent:work:sk:m1"));
        // Drained: spool truncated, offset reset, cursor persisted.
        let meta = fx.engine.meta();
        assert_eq!(meta.spool_offset, 0);
        assert!(meta.cursor(&transcript.to_string_lossy()).unwrap() > 0);
    }

    #[tokio::test]
    async fn unbound_sessions_skip_but_cursors_advance() {
        let mut fx = fixture(true);
        let transcript = seed_session(fx.dir.path(), "work", "s-1", "not an sk label");
        append(&transcript, &[USER_LINE]);

        fx.engine.tailer_tick();
        assert_eq!(fx.engine.pending_len(), 0);
        assert!(fx.engine.meta().cursor(&transcript.to_string_lossy()).unwrap() > 0);
    }

    #[tokio::test]
    async fn new_files_start_at_eof_without_backfill() {
        let mut fx = fixture(false);
        let transcript = seed_session(fx.dir.path(), "work", "s-1", "SK:TASK:task:p:w:t1");
        append(&transcript, &[USER_LINE]);

        // Pre-existing content is skipped.
        fx.engine.tailer_tick();
        assert_eq!(fx.engine.pending_len(), 0);

        // Appended-after-discovery content is exported.
        append(&transcript, &[USER_LINE]);
        fx.engine.tailer_tick();
        assert_eq!(fx.engine.pending_len(), 1);
    }

    #[tokio::test]
    async fn replay_after_restart_is_idempotent_by_key() {
        let mut fx = fixture(true);
        let transcript = seed_session(fx.dir.path(), "work", "s-1", "SK:TASK:task:p:w:t1");
        append(&transcript, &[USER_LINE]);

        fx.engine.tailer_tick();
        fx.engine.flush().unwrap();
        fx.engine.sender_tick().await;
        let first: Vec<String> = fx.api.calls.lock().clone();

        // Simulate a restart that lost meta: same line re-exported.
        let api2 = Arc::new(MockSk::default());
        let label_map = Arc::new(LabelMap::load(fx.dir.path().join("Exports/label-map.json")));
        let resolver = BindingResolver::new(fx.dir.path().to_path_buf(), label_map);
        let mut config = ExporterConfig::default();
        config.state_dir = fx.dir.path().to_path_buf();
        config.backfill = true;
        config.plugin_id = "replay".into();
        let mut engine2 = SpoolEngine::new(config, api2.clone(), resolver);

        engine2.tailer_tick();
        engine2.flush().unwrap();
        engine2.sender_tick().await;

        let second = api2.calls.lock().clone();
        // Identical message keys: the server-side upsert dedupes.
        assert_eq!(
            first.iter().filter(|c| c.starts_with("message")).collect::<Vec<_>>(),
            second.iter().filter(|c| c.starts_with("message")).collect::<Vec<_>>()
        );
    }
}
