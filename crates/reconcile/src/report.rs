//! Reconcile reports: a serializable structure plus a deterministic
//! human rendering.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub agent_id: String,
    pub session_id: String,
    pub session_key: String,
    pub entity_type: String,
    pub entity_external_id: String,
    pub messages: usize,
    pub tool_calls: usize,
    pub first_occurred_at: Option<String>,
    pub last_occurred_at: Option<String>,
    /// Bounded preview of `(key, occurredAt)` pairs.
    pub message_key_preview: Vec<(String, Option<String>)>,
    pub tool_call_key_preview: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub mode: String,
    pub sessions_scanned: usize,
    pub sessions_matched: usize,
    pub sessions_skipped: usize,
    pub messages: usize,
    pub tool_calls: usize,
    /// HTTP requests issued (always 0 in dry-run).
    pub requests_posted: usize,
    pub label_mappings_added: usize,
    pub sessions: Vec<SessionReport>,
}

impl ReconcileReport {
    /// Deterministic human-readable rendering; sessions are emitted in
    /// the order they were scanned (path-sorted upstream).
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("reconcile ({})\n", self.mode));
        out.push_str(&format!(
            "sessions: scanned={} matched={} skipped={}\n",
            self.sessions_scanned, self.sessions_matched, self.sessions_skipped
        ));
        out.push_str(&format!(
            "events: messages={} toolCalls={} requestsPosted={} labelMappingsAdded={}\n",
            self.messages, self.tool_calls, self.requests_posted, self.label_mappings_added
        ));

        for session in &self.sessions {
            out.push_str(&format!(
                "\n{} / {} → {} [{} {}]\n",
                session.agent_id,
                session.session_id,
                session.session_key,
                session.entity_type,
                session.entity_external_id
            ));
            out.push_str(&format!(
                "  messages={} toolCalls={} first={} last={}\n",
                session.messages,
                session.tool_calls,
                session.first_occurred_at.as_deref().unwrap_or("-"),
                session.last_occurred_at.as_deref().unwrap_or("-")
            ));
            for (key, at) in &session.message_key_preview {
                out.push_str(&format!("  msg  {key} @ {}\n", at.as_deref().unwrap_or("-")));
            }
            for (key, at) in &session.tool_call_key_preview {
                out.push_str(&format!("  tool {key} @ {}\n", at.as_deref().unwrap_or("-")));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_deterministic() {
        let report = ReconcileReport {
            mode: "dry-run".into(),
            sessions_scanned: 2,
            sessions_matched: 1,
            sessions_skipped: 1,
            messages: 3,
            tool_calls: 2,
            requests_posted: 0,
            label_mappings_added: 0,
            sessions: vec![SessionReport {
                agent_id: "work".into(),
                session_id: "s-1".into(),
                session_key: "agent:work:sk".into(),
                entity_type: "TASK".into(),
                entity_external_id: "task:p:w:t1".into(),
                messages: 3,
                tool_calls: 2,
                first_occurred_at: Some("2026-01-15T03:00:00.000Z".into()),
                last_occurred_at: Some("2026-01-15T03:01:00.000Z".into()),
                message_key_preview: vec![("agent:work:sk:m1".into(), None)],
                tool_call_key_preview: vec![("agent:work:sk:tc1".into(), None)],
            }],
        };

        let rendered = report.render();
        assert_eq!(rendered, report.render());
        assert!(rendered.contains("scanned=2 matched=1 skipped=1"));
        assert!(rendered.contains("messages=3 toolCalls=2"));
        assert!(rendered.contains("msg  agent:work:sk:m1"));
    }
}
