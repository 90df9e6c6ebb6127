//! Transcript line parser.
//!
//! One JSONL line in, at most one [`ParsedLine`] out. Unparseable lines
//! and non-message records yield `None` and are skipped by the caller;
//! the byte cursor still advances past them.

use serde_json::Value;
use sk_keys::SessionFileContext;

use crate::records::{MessageRecord, ParsedLine, Role, ToolCallRecord, ToolCallStatus};
use crate::timestamp::parse_timestamp_ms;

const TOOL_CALL_ALIASES: [&str; 3] = ["toolcall", "tool_call", "tool_use"];
const TOOL_RESULT_ALIASES: [&str; 3] = ["tool_result", "tool_result_error", "toolresult"];

/// Parse one transcript line into exportable records.
pub fn parse_line(ctx: &SessionFileContext, line: &str) -> Option<ParsedLine> {
    let record: Value = serde_json::from_str(line).ok()?;
    if record.get("type").and_then(Value::as_str) != Some("message") {
        return None;
    }
    let message = record.get("message")?.as_object()?;
    let role = message.get("role").and_then(Value::as_str)?;

    let message_id = record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned);
    let timestamp_ms = parse_timestamp_ms(record.get("timestamp"));
    let content = message.get("content");

    let mut parsed = ParsedLine::default();

    match role {
        "user" | "assistant" => {
            let text = join_text_blocks(content);
            if !text.is_empty() {
                parsed.messages.push(MessageRecord {
                    session_id: ctx.session_id.clone(),
                    agent_id: ctx.agent_id.clone(),
                    topic_id: ctx.topic_id.clone(),
                    message_id: message_id.clone(),
                    timestamp_ms,
                    role: if role == "user" { Role::User } else { Role::Assistant },
                    text,
                });
            }

            if role == "assistant" {
                if let Some(blocks) = content.and_then(Value::as_array) {
                    collect_assistant_tool_blocks(
                        ctx,
                        blocks,
                        message_id.as_deref(),
                        timestamp_ms,
                        &mut parsed,
                    );
                }
            }
        }
        "toolResult" | "tool_result" => {
            parse_tool_result_message(ctx, message, message_id, timestamp_ms, &mut parsed)?;
        }
        _ => return None,
    }

    if parsed.is_empty() {
        return None;
    }
    parsed.attach = true;
    Some(parsed)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assistant tool blocks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn collect_assistant_tool_blocks(
    ctx: &SessionFileContext,
    blocks: &[Value],
    message_id: Option<&str>,
    timestamp_ms: Option<i64>,
    parsed: &mut ParsedLine,
) {
    for (index, block) in blocks.iter().enumerate() {
        let Some(block_type) = block.get("type").and_then(Value::as_str) else {
            continue;
        };
        let tag = block_type.to_ascii_lowercase();

        if TOOL_CALL_ALIASES.contains(&tag.as_str()) {
            let tool_call_id = block_tool_call_id(block)
                .unwrap_or_else(|| fallback_tool_call_id(ctx, message_id, timestamp_ms, index));
            parsed.tool_calls.push(ToolCallRecord {
                session_id: ctx.session_id.clone(),
                agent_id: ctx.agent_id.clone(),
                topic_id: ctx.topic_id.clone(),
                message_id: message_id.map(str::to_owned),
                tool_call_id,
                tool_name: block_tool_name(block),
                status: ToolCallStatus::Started,
                timestamp_ms,
                params_text: block_params_text(block),
                result_text: None,
                error_text: None,
            });
        } else if TOOL_RESULT_ALIASES.contains(&tag.as_str()) {
            // Embedded results must carry an id to correlate with a STARTED.
            let Some(tool_call_id) = block_tool_call_id(block) else {
                continue;
            };
            let failed = tag == "tool_result_error" || is_truthy(block.get("is_error")) || is_truthy(block.get("isError"));
            let text = join_text_blocks(block.get("content").or_else(|| block.get("text")));
            parsed.tool_calls.push(ToolCallRecord {
                session_id: ctx.session_id.clone(),
                agent_id: ctx.agent_id.clone(),
                topic_id: ctx.topic_id.clone(),
                message_id: message_id.map(str::to_owned),
                tool_call_id,
                tool_name: block_tool_name(block),
                status: if failed { ToolCallStatus::Failed } else { ToolCallStatus::Succeeded },
                timestamp_ms,
                params_text: None,
                result_text: non_empty(text.clone()),
                error_text: if failed { non_empty(text) } else { None },
            });
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// toolResult-role messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_tool_result_message(
    ctx: &SessionFileContext,
    message: &serde_json::Map<String, Value>,
    message_id: Option<String>,
    timestamp_ms: Option<i64>,
    parsed: &mut ParsedLine,
) -> Option<()> {
    let tool_call_id = message
        .get("toolCallId")
        .or_else(|| message.get("tool_call_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())?
        .to_owned();

    let failed = is_truthy(message.get("isError")) || is_truthy(message.get("is_error"));
    let text = join_text_blocks(message.get("content"));

    parsed.tool_calls.push(ToolCallRecord {
        session_id: ctx.session_id.clone(),
        agent_id: ctx.agent_id.clone(),
        topic_id: ctx.topic_id.clone(),
        message_id: message_id.clone(),
        tool_call_id,
        tool_name: message
            .get("toolName")
            .or_else(|| message.get("tool_name"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        status: if failed { ToolCallStatus::Failed } else { ToolCallStatus::Succeeded },
        timestamp_ms,
        params_text: None,
        result_text: non_empty(text.clone()),
        error_text: if failed { non_empty(text.clone()) } else { None },
    });

    if !text.is_empty() {
        parsed.messages.push(MessageRecord {
            session_id: ctx.session_id.clone(),
            agent_id: ctx.agent_id.clone(),
            topic_id: ctx.topic_id.clone(),
            message_id,
            timestamp_ms,
            role: Role::Tool,
            text,
        });
    }
    Some(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Join the text blocks of a content value with newlines.
///
/// A bare string counts as a single text block; arrays contribute every
/// block of type `text` with non-empty text.
fn join_text_blocks(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn block_tool_call_id(block: &Value) -> Option<String> {
    ["id", "toolCallId", "tool_call_id"]
        .iter()
        .filter_map(|k| block.get(*k))
        .filter_map(Value::as_str)
        .find(|id| !id.is_empty())
        .map(str::to_owned)
}

fn block_tool_name(block: &Value) -> Option<String> {
    ["name", "toolName", "tool_name"]
        .iter()
        .filter_map(|k| block.get(*k))
        .filter_map(Value::as_str)
        .find(|n| !n.is_empty())
        .map(str::to_owned)
}

/// Stringified tool parameters, preferring the structured fields.
fn block_params_text(block: &Value) -> Option<String> {
    let value = ["arguments", "args", "params", "input"]
        .iter()
        .find_map(|k| block.get(*k))?;
    match value {
        Value::String(s) => Some(s.clone()),
        other => serde_json::to_string(other).ok(),
    }
}

/// Fallback tool-call id: `<messageId|sessionId:ts>:<blockIndex>`.
fn fallback_tool_call_id(
    ctx: &SessionFileContext,
    message_id: Option<&str>,
    timestamp_ms: Option<i64>,
    index: usize,
) -> String {
    match message_id {
        Some(id) => format!("{id}:{index}"),
        None => {
            let ts = timestamp_ms.map(|v| v.to_string()).unwrap_or_default();
            format!("{}:{ts}:{index}", ctx.session_id)
        }
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        _ => false,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
