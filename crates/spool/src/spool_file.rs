//! The spool file: one JSON event per line, single producer (flush),
//! single consumer (sender), serialized through the meta offsets.

use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sk_client::{RecordMessageRequest, RecordToolCallRequest};
use sk_domain::error::{Error, Result};

/// One spooled event, tagged the way it lands on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SpoolEvent {
    #[serde(rename = "message")]
    Message { payload: RecordMessageRequest },
    #[serde(rename = "toolCall")]
    ToolCall { payload: RecordToolCallRequest },
}

impl SpoolEvent {
    pub fn session_key(&self) -> &str {
        match self {
            SpoolEvent::Message { payload } => &payload.session_key,
            SpoolEvent::ToolCall { payload } => &payload.session_key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SpoolEvent::Message { .. } => "message",
            SpoolEvent::ToolCall { .. } => "toolCall",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            SpoolEvent::Message { payload } => &payload.message_key,
            SpoolEvent::ToolCall { payload } => &payload.tool_call_key,
        }
    }
}

/// Append events as JSONL in one write.
pub fn append_events(path: &Path, events: &[SpoolEvent]) -> Result<u64> {
    if events.is_empty() {
        return Ok(file_size(path));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }

    let mut buf = String::new();
    for event in events {
        buf.push_str(&serde_json::to_string(event)?);
        buf.push('\n');
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::Io)?;
    file.write_all(buf.as_bytes()).map_err(Error::Io)?;
    file.flush().map_err(Error::Io)?;
    Ok(file.metadata().map_err(Error::Io)?.len())
}

/// One raw line read from the spool at a given offset.
#[derive(Debug)]
pub struct LineAt {
    /// Offset of the byte after this line's newline.
    pub next_offset: u64,
    /// Parsed event; `None` when the line is malformed (skip it).
    pub event: Option<SpoolEvent>,
}

/// Read the single event starting at `offset`. `Ok(None)` when the
/// offset is at or past end-of-file.
pub fn read_event_at(path: &Path, offset: u64) -> Result<Option<LineAt>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    let len = file.metadata().map_err(Error::Io)?.len();
    if offset >= len {
        return Ok(None);
    }

    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset)).map_err(Error::Io)?;

    let mut raw = Vec::new();
    let read = reader.read_until(b'\n', &mut raw).map_err(Error::Io)?;
    if read == 0 {
        return Ok(None);
    }
    // A line still being appended has no newline yet; wait for it.
    if raw.last() != Some(&b'\n') {
        return Ok(None);
    }

    let next_offset = offset + read as u64;
    let text = String::from_utf8_lossy(&raw);
    let event = serde_json::from_str::<SpoolEvent>(text.trim_end()).ok();
    Ok(Some(LineAt { next_offset, event }))
}

pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Rewrite the spool file empty (truncate-on-drain).
pub fn truncate(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::write(path, b"").map_err(Error::Io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_keys::EntityType;

    fn message(key: &str) -> SpoolEvent {
        SpoolEvent::Message {
            payload: RecordMessageRequest {
                session_key: "agent:a:s1".into(),
                entity_type: EntityType::Task,
                entity_external_id: "task:p:w:t".into(),
                message_key: key.into(),
                role: "user".into(),
                content: "hello".into(),
                occurred_at: None,
                metadata: None,
            },
        }
    }

    #[test]
    fn append_then_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");

        append_events(&path, &[message("k1"), message("k2")]).unwrap();

        let first = read_event_at(&path, 0).unwrap().unwrap();
        assert_eq!(first.event.as_ref().unwrap().key(), "k1");

        let second = read_event_at(&path, first.next_offset).unwrap().unwrap();
        assert_eq!(second.event.as_ref().unwrap().key(), "k2");

        assert!(read_event_at(&path, second.next_offset).unwrap().is_none());
    }

    #[test]
    fn malformed_line_reads_as_skippable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");
        std::fs::write(&path, "{ garbage\n").unwrap();

        let line = read_event_at(&path, 0).unwrap().unwrap();
        assert!(line.event.is_none());
        assert_eq!(line.next_offset, 10);
    }

    #[test]
    fn partial_trailing_line_not_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");
        std::fs::write(&path, r#"{"kind":"message""#).unwrap();
        assert!(read_event_at(&path, 0).unwrap().is_none());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_event_at(&dir.path().join("none.jsonl"), 0).unwrap().is_none());
        assert_eq!(file_size(&dir.path().join("none.jsonl")), 0);
    }

    #[test]
    fn wire_shape_is_kind_plus_payload() {
        let json = serde_json::to_value(message("k1")).unwrap();
        assert_eq!(json["kind"], "message");
        assert_eq!(json["payload"]["messageKey"], "k1");
    }
}
