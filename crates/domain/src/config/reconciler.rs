use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconciler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Agents eligible for replay. Empty = all agents.
    #[serde(default)]
    pub agent_allowlist: Vec<String>,
    /// Keys previewed per session in dry-run reports.
    #[serde(default = "d_5")]
    pub preview: usize,
    /// Upper bound on transcript lines scanned when resolving a hashed
    /// label. Hard-capped at 500.
    #[serde(default = "d_500")]
    pub hash_scan_lines: usize,
    /// Location of `label-map.json`. Overridable via
    /// `SUPER_KANBAN_LABEL_MAP_PATH`.
    #[serde(default)]
    pub label_map_path: Option<PathBuf>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            agent_allowlist: Vec::new(),
            preview: 5,
            hash_scan_lines: 500,
            label_map_path: None,
        }
    }
}

impl ReconcilerConfig {
    /// Scan bound with the 500-line hard cap applied.
    pub fn effective_hash_scan_lines(&self) -> usize {
        self.hash_scan_lines.min(500)
    }

    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("SUPER_KANBAN_LABEL_MAP_PATH") {
            if !path.trim().is_empty() {
                self.label_map_path = Some(PathBuf::from(path));
            }
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_5() -> usize {
    5
}
fn d_500() -> usize {
    500
}
