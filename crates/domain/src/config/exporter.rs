use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transcript exporter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the transcript exporter (tailer + spool + sender).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Root state directory holding `agents/<id>/sessions/*.jsonl`.
    #[serde(default = "d_state_dir")]
    pub state_dir: PathBuf,
    /// Plugin instance id; meta + spool live under `plugins/<plugin_id>/`.
    #[serde(default = "d_plugin_id")]
    pub plugin_id: String,
    /// Tailer tick interval. Clamped to a 250 ms floor at load.
    #[serde(default = "d_1000")]
    pub poll_interval_ms: u64,
    /// Debounce window before the first flush of an in-memory burst.
    #[serde(default = "d_250")]
    pub debounce_ms: u64,
    /// Export lines present before the file was first seen (off by default:
    /// new files start tailing at end-of-file).
    #[serde(default)]
    pub backfill: bool,
    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
            plugin_id: d_plugin_id(),
            poll_interval_ms: 1_000,
            debounce_ms: 250,
            backfill: false,
            redaction: RedactionConfig::default(),
        }
    }
}

impl ExporterConfig {
    /// Effective tailer interval with the 250 ms floor applied.
    pub fn effective_poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.max(250)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Redaction & truncation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    Off,
    #[default]
    Tools,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default)]
    pub mode: RedactionMode,
    /// Regex patterns replaced with `[redacted]` before truncation.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Cap on message content characters.
    #[serde(default = "d_8000")]
    pub max_message_chars: usize,
    /// Cap on tool input (params) characters.
    #[serde(default = "d_4000")]
    pub max_tool_input_chars: usize,
    /// Cap on tool output and error characters.
    #[serde(default = "d_8000")]
    pub max_tool_output_chars: usize,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            mode: RedactionMode::Tools,
            patterns: Vec::new(),
            max_message_chars: 8_000,
            max_tool_input_chars: 4_000,
            max_tool_output_chars: 8_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_state_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn d_plugin_id() -> String {
    "super-kanban".into()
}
fn d_1000() -> u64 {
    1_000
}
fn d_250() -> u64 {
    250
}
fn d_8000() -> usize {
    8_000
}
fn d_4000() -> usize {
    4_000
}
