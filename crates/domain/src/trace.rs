use serde::Serialize;

/// Structured trace events emitted across the integration core.
///
/// Serialized as a single JSON object on the `trace_event` field so log
/// pipelines can filter on the `event` tag without parsing free text.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    #[serde(rename = "spool.flush")]
    SpoolFlush { events: usize, spool_bytes: u64 },

    #[serde(rename = "spool.sent")]
    SpoolSent {
        kind: String,
        key: String,
        session_key: String,
    },

    #[serde(rename = "spool.backoff")]
    SpoolBackoff {
        consecutive_failures: u32,
        next_send_in_ms: u64,
    },

    #[serde(rename = "spool.drained")]
    SpoolDrained { reclaimed_bytes: u64 },

    #[serde(rename = "spool.line_skipped")]
    SpoolLineSkipped { offset: u64, reason: String },

    #[serde(rename = "session.attached")]
    SessionAttached {
        session_key: String,
        entity_type: String,
    },

    #[serde(rename = "bindings.reloaded")]
    BindingsReloaded { agent_id: String, sessions: usize },

    #[serde(rename = "label_map.appended")]
    LabelMapAppended {
        external_id: String,
        hash: String,
    },

    #[serde(rename = "controller.wake")]
    ParentWake {
        run_id: String,
        parent_session_key: String,
        outcome: String,
    },

    #[serde(rename = "ws.closed")]
    WsClosed {
        conn_id: String,
        cause: String,
        duration_ms: u64,
        last_frame_type: Option<String>,
        last_frame_method: Option<String>,
    },

    #[serde(rename = "ws.presence")]
    PresenceBroadcast { version: u64, clients: usize },

    #[serde(rename = "telegram.http.fetch")]
    TelegramHttpFetch {
        delivery_id: Option<String>,
        http_method: String,
        api_method: String,
        path: String,
        payload_hash: String,
    },

    #[serde(rename = "telegram.voice_deduped")]
    VoiceDeduped { chat_key: String },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sk_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_event_tag() {
        let event = TraceEvent::TelegramHttpFetch {
            delivery_id: Some("d1".into()),
            http_method: "POST".into(),
            api_method: "sendVoice".into(),
            path: "/bot<redacted>/sendVoice".into(),
            payload_hash: "abc".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "telegram.http.fetch");
        assert_eq!(json["api_method"], "sendVoice");
    }
}
