use serde::{Deserialize, Serialize};

/// Normalized message role in exported records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Tool-call lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCallStatus {
    Started,
    Succeeded,
    Failed,
}

/// One exportable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub session_id: String,
    pub agent_id: Option<String>,
    pub topic_id: Option<String>,
    pub message_id: Option<String>,
    pub timestamp_ms: Option<i64>,
    pub role: Role,
    pub text: String,
}

/// One exportable tool-call state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub session_id: String,
    pub agent_id: Option<String>,
    pub topic_id: Option<String>,
    pub message_id: Option<String>,
    pub tool_call_id: String,
    pub tool_name: Option<String>,
    pub status: ToolCallStatus,
    pub timestamp_ms: Option<i64>,
    pub params_text: Option<String>,
    pub result_text: Option<String>,
    pub error_text: Option<String>,
}

/// Everything extracted from a single transcript line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLine {
    /// Whether this line implies the session must be attached upstream.
    pub attach: bool,
    pub messages: Vec<MessageRecord>,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.tool_calls.is_empty()
    }
}
