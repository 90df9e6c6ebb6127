//! Redaction patterns and code-point-safe truncation.

use regex::Regex;
use sk_domain::config::{RedactionConfig, RedactionMode};

const REDACTED: &str = "[redacted]";
const TRUNCATION_MARKER: char = '…';

/// Applies the configured sensitive-data patterns and per-field caps.
///
/// Built once per exporter instance; invalid patterns are dropped with a
/// warning rather than disabling the whole redactor.
pub struct Redactor {
    mode: RedactionMode,
    patterns: Vec<Regex>,
    max_message_chars: usize,
    max_tool_input_chars: usize,
    max_tool_output_chars: usize,
}

impl Redactor {
    pub fn new(config: &RedactionConfig) -> Self {
        let patterns = config
            .patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "dropping invalid redaction pattern");
                    None
                }
            })
            .collect();

        Self {
            mode: config.mode,
            patterns,
            max_message_chars: config.max_message_chars,
            max_tool_input_chars: config.max_tool_input_chars,
            max_tool_output_chars: config.max_tool_output_chars,
        }
    }

    fn apply_patterns(&self, text: &str) -> String {
        if self.mode == RedactionMode::Off {
            return text.to_owned();
        }
        let mut out = text.to_owned();
        for re in &self.patterns {
            out = re.replace_all(&out, REDACTED).into_owned();
        }
        out
    }

    /// Normalize message content: redact, then cap.
    pub fn message_text(&self, text: &str) -> String {
        truncate_chars(&self.apply_patterns(text), self.max_message_chars)
    }

    /// Normalize tool input (params).
    pub fn tool_input(&self, text: &str) -> String {
        truncate_chars(&self.apply_patterns(text), self.max_tool_input_chars)
    }

    /// Normalize tool output and error strings.
    pub fn tool_output(&self, text: &str) -> String {
        truncate_chars(&self.apply_patterns(text), self.max_tool_output_chars)
    }
}

/// Truncate to at most `max_chars` code points, appending `…` when a cut
/// happens. Never splits a multi-byte code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: RedactionMode, patterns: &[&str]) -> RedactionConfig {
        RedactionConfig {
            mode,
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn patterns_apply_in_tools_mode() {
        let redactor = Redactor::new(&config(RedactionMode::Tools, &[r"sk-[a-z0-9]+"]));
        assert_eq!(
            redactor.tool_output("token sk-abc123 leaked"),
            "token [redacted] leaked"
        );
    }

    #[test]
    fn off_mode_passes_through() {
        let redactor = Redactor::new(&config(RedactionMode::Off, &[r"sk-[a-z0-9]+"]));
        assert_eq!(redactor.tool_output("sk-abc"), "sk-abc");
    }

    #[test]
    fn invalid_pattern_dropped_not_fatal() {
        let redactor = Redactor::new(&config(RedactionMode::Tools, &["[unclosed", "secret"]));
        assert_eq!(redactor.message_text("a secret here"), "a [redacted] here");
    }

    #[test]
    fn truncation_respects_code_points() {
        // Multi-byte code points must survive the cut intact.
        let text = "日本語のテキストです";
        let out = truncate_chars(text, 5);
        assert_eq!(out.chars().count(), 5);
        assert!(out.ends_with('…'));
        assert!(out.starts_with("日本語の"));
    }

    #[test]
    fn short_text_gets_no_marker() {
        assert_eq!(truncate_chars("short", 8_000), "short");
    }

    #[test]
    fn caps_differ_per_field() {
        let mut cfg = config(RedactionMode::Tools, &[]);
        cfg.max_message_chars = 10;
        cfg.max_tool_input_chars = 4;
        cfg.max_tool_output_chars = 6;
        let redactor = Redactor::new(&cfg);

        let long = "abcdefghijklmnop";
        assert_eq!(redactor.message_text(long).chars().count(), 10);
        assert_eq!(redactor.tool_input(long).chars().count(), 4);
        assert_eq!(redactor.tool_output(long).chars().count(), 6);
    }
}
