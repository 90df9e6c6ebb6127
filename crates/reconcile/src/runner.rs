//! The reconciler runner.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use sk_client::SuperKanbanApi;
use sk_client::{AttachSessionRequest, SessionState};
use sk_domain::config::RedactionConfig;
use sk_domain::error::{Error, Result};
use sk_keys::{parse_session_file_context, parse_sk_routing_label, EntityType, RoutingLabel};
use sk_spool::{
    build_spool_events, discover_transcripts, BindingResolver, LabelMapEntry, SessionBinding,
    SpoolEvent,
};
use sk_transcript::{parse_line, Redactor};

use crate::report::{ReconcileReport, SessionReport};
use crate::scan::scan_for_external_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    DryRun,
    Fix,
}

impl ReconcileMode {
    fn as_str(&self) -> &'static str {
        match self {
            ReconcileMode::DryRun => "dry-run",
            ReconcileMode::Fix => "fix",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub mode: ReconcileMode,
    pub state_dir: PathBuf,
    /// Empty = all agents.
    pub agent_allowlist: Vec<String>,
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
    pub session_key: Option<String>,
    pub max_sessions: Option<usize>,
    pub preview: usize,
    pub hash_scan_lines: usize,
    pub redaction: RedactionConfig,
}

impl ReconcileOptions {
    pub fn new(mode: ReconcileMode, state_dir: PathBuf) -> Self {
        Self {
            mode,
            state_dir,
            agent_allowlist: Vec::new(),
            agent_id: None,
            session_id: None,
            session_key: None,
            max_sessions: None,
            preview: 5,
            hash_scan_lines: crate::scan::HASH_SCAN_MAX_LINES,
            redaction: RedactionConfig::default(),
        }
    }
}

/// Offline replay engine. Shares binding resolution and payload
/// conversion with the live exporter so both derive identical keys.
pub struct Reconciler {
    options: ReconcileOptions,
    resolver: BindingResolver,
    redactor: Redactor,
    api: Option<Arc<dyn SuperKanbanApi>>,
}

impl Reconciler {
    pub fn new(
        options: ReconcileOptions,
        resolver: BindingResolver,
        api: Option<Arc<dyn SuperKanbanApi>>,
    ) -> Result<Self> {
        if options.mode == ReconcileMode::Fix && api.is_none() {
            return Err(Error::Config(
                "reconcile --fix requires a configured Super-Kanban client".into(),
            ));
        }
        let redactor = Redactor::new(&options.redaction);
        Ok(Self {
            options,
            resolver,
            redactor,
            api,
        })
    }

    pub async fn run(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport {
            mode: self.options.mode.as_str().into(),
            ..Default::default()
        };

        for path in discover_transcripts(&self.options.state_dir) {
            let Some(ctx) = parse_session_file_context(&path) else {
                continue;
            };
            let Some(agent_id) = ctx.agent_id.clone() else {
                continue;
            };

            if !self.options.agent_allowlist.is_empty()
                && !self.options.agent_allowlist.contains(&agent_id)
            {
                continue;
            }
            if let Some(filter) = &self.options.agent_id {
                if filter != &agent_id {
                    continue;
                }
            }
            if let Some(filter) = &self.options.session_id {
                if filter != &ctx.session_id {
                    continue;
                }
            }

            let Some((session_key, label)) =
                self.resolver.session_key_and_label(&agent_id, &ctx.session_id)
            else {
                continue;
            };
            if let Some(filter) = &self.options.session_key {
                if filter != &session_key {
                    continue;
                }
            }

            report.sessions_scanned += 1;

            let Some(label) = label else {
                report.sessions_skipped += 1;
                continue;
            };
            let Some(binding) =
                self.resolve_binding(&path, &session_key, &label, &mut report)
            else {
                report.sessions_skipped += 1;
                continue;
            };

            if let Some(max) = self.options.max_sessions {
                if report.sessions_matched >= max {
                    break;
                }
            }
            report.sessions_matched += 1;

            let session_report = self
                .replay_session(&path, &ctx.session_id, &agent_id, &binding, &mut report)
                .await?;
            report.sessions.push(session_report);
        }

        Ok(report)
    }

    /// Resolve a binding; hashed labels fall back to the transcript
    /// prefix scan, and `fix` mode records the discovered mapping.
    fn resolve_binding(
        &self,
        path: &std::path::Path,
        session_key: &str,
        label: &str,
        report: &mut ReconcileReport,
    ) -> Option<SessionBinding> {
        if let Some(binding) = self.resolver.binding_from_label(session_key, label) {
            return Some(binding);
        }

        let Some(RoutingLabel::TaskHash { label, hash }) = parse_sk_routing_label(label) else {
            return None;
        };

        let external_id = scan_for_external_id(path, &hash, self.options.hash_scan_lines)?;
        tracing::info!(
            session_key = %session_key,
            hash = %hash,
            external_id = %external_id,
            "resolved hashed label from transcript prefix"
        );

        if self.options.mode == ReconcileMode::Fix {
            let appended = self
                .resolver
                .label_map()
                .append_dedup(LabelMapEntry {
                    external_id: external_id.clone(),
                    label: label.clone(),
                    hash: hash.clone(),
                })
                .unwrap_or(false);
            if appended {
                report.label_mappings_added += 1;
            }
        }

        Some(SessionBinding {
            session_key: session_key.to_owned(),
            label,
            entity_type: EntityType::Task,
            entity_external_id: external_id,
        })
    }

    async fn replay_session(
        &self,
        path: &std::path::Path,
        session_id: &str,
        agent_id: &str,
        binding: &SessionBinding,
        report: &mut ReconcileReport,
    ) -> Result<SessionReport> {
        let ctx = parse_session_file_context(path).ok_or_else(|| {
            Error::Other(format!("unparseable transcript path {}", path.display()))
        })?;

        let file = std::fs::File::open(path).map_err(Error::Io)?;
        let reader = BufReader::new(file);

        let mut events: Vec<SpoolEvent> = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(Error::Io)?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(parsed) = parse_line(&ctx, &line) {
                events.extend(build_spool_events(binding, &parsed, &self.redactor));
            }
        }

        let mut session_report = SessionReport {
            agent_id: agent_id.to_owned(),
            session_id: session_id.to_owned(),
            session_key: binding.session_key.clone(),
            entity_type: binding.entity_type.as_str().into(),
            entity_external_id: binding.entity_external_id.clone(),
            messages: 0,
            tool_calls: 0,
            first_occurred_at: None,
            last_occurred_at: None,
            message_key_preview: Vec::new(),
            tool_call_key_preview: Vec::new(),
        };

        for event in &events {
            let (key, occurred_at) = match event {
                SpoolEvent::Message { payload } => {
                    session_report.messages += 1;
                    report.messages += 1;
                    (payload.message_key.clone(), payload.occurred_at.clone())
                }
                SpoolEvent::ToolCall { payload } => {
                    session_report.tool_calls += 1;
                    report.tool_calls += 1;
                    (payload.tool_call_key.clone(), payload.occurred_at.clone())
                }
            };

            if let Some(at) = &occurred_at {
                // RFC 3339 Z-times order lexicographically.
                if session_report
                    .first_occurred_at
                    .as_ref()
                    .map(|f| at < f)
                    .unwrap_or(true)
                {
                    session_report.first_occurred_at = Some(at.clone());
                }
                if session_report
                    .last_occurred_at
                    .as_ref()
                    .map(|l| at > l)
                    .unwrap_or(true)
                {
                    session_report.last_occurred_at = Some(at.clone());
                }
            }

            match event {
                SpoolEvent::Message { .. }
                    if session_report.message_key_preview.len() < self.options.preview =>
                {
                    session_report.message_key_preview.push((key, occurred_at));
                }
                SpoolEvent::ToolCall { .. }
                    if session_report.tool_call_key_preview.len() < self.options.preview =>
                {
                    session_report.tool_call_key_preview.push((key, occurred_at));
                }
                _ => {}
            }
        }

        if self.options.mode == ReconcileMode::Fix {
            self.post_session(binding, &events, &session_report, report)
                .await?;
        }

        Ok(session_report)
    }

    async fn post_session(
        &self,
        binding: &SessionBinding,
        events: &[SpoolEvent],
        session_report: &SessionReport,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let api = self
            .api
            .as_ref()
            .expect("fix mode constructed with a client");

        api.attach_session(AttachSessionRequest {
            session_key: binding.session_key.clone(),
            entity_type: binding.entity_type,
            entity_id: None,
            entity_external_id: Some(binding.entity_external_id.clone()),
            state: SessionState::Running,
            started_at: session_report.first_occurred_at.clone(),
            ended_at: None,
        })
        .await?;
        report.requests_posted += 1;

        for event in events {
            match event {
                SpoolEvent::Message { payload } => api.record_message(payload.clone()).await?,
                SpoolEvent::ToolCall { payload } => api.record_tool_call(payload.clone()).await?,
            }
            report.requests_posted += 1;
        }
        Ok(())
    }
}
