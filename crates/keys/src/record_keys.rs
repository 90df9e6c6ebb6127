//! Deterministic record keys for message and tool-call upserts.
//!
//! Super-Kanban dedupes on these keys, so the exporter and the offline
//! reconciler must derive byte-identical values for the same transcript.

use crate::hash::sha1_hex;

/// Key for a message record.
///
/// An explicit message ID wins; otherwise the key falls back to a content
/// digest over `role|occurredAtMs|content` so replays of the same line
/// land on the same row.
pub fn build_message_key(
    session_key: &str,
    message_id: Option<&str>,
    role: &str,
    occurred_at_ms: Option<i64>,
    content: &str,
) -> String {
    if let Some(id) = message_id.filter(|id| !id.is_empty()) {
        return format!("{session_key}:{id}");
    }
    let ms = occurred_at_ms.map(|v| v.to_string()).unwrap_or_default();
    let digest = sha1_hex(&format!("{role}|{ms}|{content}"));
    format!("{session_key}:msg:{digest}")
}

/// Key for a tool-call record: `<sessionKey>:<toolCallId>`.
pub fn build_tool_call_key(session_key: &str, tool_call_id: &str) -> String {
    format!("{session_key}:{tool_call_id}")
}
