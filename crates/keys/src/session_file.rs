//! Transcript-path context extraction.
//!
//! Canonical transcript paths look like
//! `…/agents/<agentId>/sessions/<sessionId>[-topic-<urlEncodedTopic>].jsonl`.
//! The session ID is always recoverable from the file stem; the agent ID
//! only when the surrounding directories match the canonical shape.

use std::path::Path;

/// Identity extracted from a transcript file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFileContext {
    pub session_id: String,
    pub agent_id: Option<String>,
    pub topic_id: Option<String>,
}

/// Parse a transcript path. Returns `None` when no non-empty session ID
/// can be extracted.
pub fn parse_session_file_context(path: &Path) -> Option<SessionFileContext> {
    if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }

    let (session_id, topic_id) = match stem.split_once("-topic-") {
        Some((session, encoded)) if !session.is_empty() => {
            let decoded = urlencoding::decode(encoded)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| encoded.to_owned());
            (session.to_owned(), Some(decoded))
        }
        _ => (stem.to_owned(), None),
    };

    // agents/<agentId>/sessions/<file> — agent_id only for the canonical shape.
    let mut ancestors = path.ancestors().skip(1);
    let sessions_dir = ancestors.next().and_then(|p| p.file_name()).and_then(|n| n.to_str());
    let agent_dir = ancestors.next().and_then(|p| p.file_name()).and_then(|n| n.to_str());
    let agents_dir = ancestors.next().and_then(|p| p.file_name()).and_then(|n| n.to_str());

    let agent_id = match (sessions_dir, agent_dir, agents_dir) {
        (Some("sessions"), Some(agent), Some("agents")) if !agent.is_empty() => {
            Some(agent.to_owned())
        }
        _ => None,
    };

    Some(SessionFileContext {
        session_id,
        agent_id,
        topic_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn canonical_path_with_topic() {
        let path = PathBuf::from("/state/agents/work/sessions/abc-123-topic-my%2Ftopic.jsonl");
        let ctx = parse_session_file_context(&path).unwrap();
        assert_eq!(ctx.agent_id.as_deref(), Some("work"));
        assert_eq!(ctx.session_id, "abc-123");
        assert_eq!(ctx.topic_id.as_deref(), Some("my/topic"));
    }

    #[test]
    fn canonical_path_without_topic() {
        let path = PathBuf::from("/state/agents/main/sessions/s-9.jsonl");
        let ctx = parse_session_file_context(&path).unwrap();
        assert_eq!(ctx.agent_id.as_deref(), Some("main"));
        assert_eq!(ctx.session_id, "s-9");
        assert_eq!(ctx.topic_id, None);
    }

    #[test]
    fn non_canonical_shape_keeps_session_only() {
        let path = PathBuf::from("/tmp/scratch/s-9.jsonl");
        let ctx = parse_session_file_context(&path).unwrap();
        assert_eq!(ctx.agent_id, None);
        assert_eq!(ctx.session_id, "s-9");
    }

    #[test]
    fn non_jsonl_rejected() {
        assert_eq!(
            parse_session_file_context(&PathBuf::from("/state/agents/a/sessions/x.json")),
            None
        );
    }
}
