use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Telegram delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Sliding dedupe window for repeated voice sends.
    #[serde(default = "d_10000")]
    pub voice_dedupe_window_ms: u64,
    /// Voice dedupe is opt-in (`OPENCLAW_TELEGRAM_DEDUP_VOICE=1`).
    #[serde(default)]
    pub dedupe_voice: bool,
    /// Diagnostic fetch tap is opt-in (`OPENCLAW_TELEGRAM_DIAG=1`).
    #[serde(default)]
    pub diagnostics: bool,
    /// Prefer IPv4 fallback when the platform races address families.
    #[serde(default = "d_true")]
    pub auto_select_family: bool,
    /// DNS result order: `ipv4first` or `verbatim`.
    #[serde(default)]
    pub dns_result_order: DnsResultOrder,
    /// Minimum gap between search-lane requests.
    #[serde(default)]
    pub search_min_interval_ms: Option<u64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            voice_dedupe_window_ms: 10_000,
            dedupe_voice: false,
            diagnostics: false,
            auto_select_family: true,
            dns_result_order: DnsResultOrder::default(),
            search_min_interval_ms: None,
        }
    }
}

impl TelegramConfig {
    pub fn apply_env(&mut self) {
        if env_flag("OPENCLAW_TELEGRAM_DIAG") {
            self.diagnostics = true;
        }
        if env_flag("OPENCLAW_TELEGRAM_DEDUP_VOICE") {
            self.dedupe_voice = true;
        }
        if let Ok(ms) = std::env::var("BRAVE_SEARCH_MIN_INTERVAL_MS") {
            if let Ok(parsed) = ms.trim().parse::<u64>() {
                self.search_min_interval_ms = Some(parsed);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DnsResultOrder {
    #[default]
    Ipv4first,
    Verbatim,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10000() -> u64 {
    10_000
}
fn d_true() -> bool {
    true
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}
