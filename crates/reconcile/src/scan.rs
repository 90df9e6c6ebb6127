//! Hashed-label resolution by transcript prefix scan.
//!
//! `SK:TASKH:<hash16>` labels do not carry the task external ID. The
//! transcript usually mentions it near the top (the spawn prompt embeds
//! it), so a bounded prefix scan extracts candidates and checks their
//! sha256 prefix against the hash. The 500-line bound is a defense
//! against pathological files and must not be raised.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use sk_keys::sha256_prefix;

pub const HASH_SCAN_MAX_LINES: usize = 500;

fn external_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bexternalId\b\s*[:=]?\s*(\S+)"#).unwrap())
}

fn task_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\btask:\S+").unwrap())
}

fn trim_candidate(raw: &str) -> &str {
    raw.trim_matches(|c| matches!(c, '"' | '\'' | ',' | '}' | ']' | ')' | '\\'))
}

/// Scan up to `max_lines` (hard-capped at [`HASH_SCAN_MAX_LINES`]) of the
/// transcript for a candidate whose `sha256[0:16]` equals `hash`.
pub fn scan_for_external_id(path: &Path, hash: &str, max_lines: usize) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let reader = BufReader::new(file);
    let limit = max_lines.min(HASH_SCAN_MAX_LINES);

    for line in reader.lines().take(limit) {
        let Ok(line) = line else { break };

        for caps in external_id_re().captures_iter(&line) {
            let candidate = trim_candidate(&caps[1]);
            if !candidate.is_empty() && sha256_prefix(candidate, 16) == hash {
                return Some(candidate.to_owned());
            }
        }
        for m in task_id_re().find_iter(&line) {
            let candidate = trim_candidate(m.as_str());
            if sha256_prefix(candidate, 16) == hash {
                return Some(candidate.to_owned());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_keys::make_sk_task_hash_label;
    use std::io::Write;

    fn hash_of(external_id: &str) -> String {
        make_sk_task_hash_label(external_id)
            .strip_prefix("SK:TASKH:")
            .unwrap()
            .to_owned()
    }

    #[test]
    fn finds_external_id_field_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        std::fs::write(
            &path,
            r#"{"type":"message","message":{"role":"user","content":"spawn with \"externalId\": \"task:p:w:t1\", please"}}"#,
        )
        .unwrap();

        let found = scan_for_external_id(&path, &hash_of("task:p:w:t1"), 500);
        assert_eq!(found.as_deref(), Some("task:p:w:t1"));
    }

    #[test]
    fn finds_bare_task_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        std::fs::write(&path, "work on task:alpha:w1:t9 today\n").unwrap();

        let found = scan_for_external_id(&path, &hash_of("task:alpha:w1:t9"), 500);
        assert_eq!(found.as_deref(), Some("task:alpha:w1:t9"));
    }

    #[test]
    fn no_match_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        std::fs::write(&path, "nothing relevant here\n").unwrap();
        assert_eq!(scan_for_external_id(&path, "0123456789abcdef", 500), None);
    }

    #[test]
    fn scan_respects_the_hard_line_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for _ in 0..HASH_SCAN_MAX_LINES {
            writeln!(f, "filler").unwrap();
        }
        writeln!(f, "task:late:w:t").unwrap();

        // The candidate sits past the cap even when the caller asks for more.
        assert_eq!(
            scan_for_external_id(&path, &hash_of("task:late:w:t"), 10_000),
            None
        );
    }
}
