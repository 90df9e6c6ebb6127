use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gateway WebSocket core
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_4180")]
    pub port: u16,
    /// Outbound bytes a connection may have queued before it is closed as
    /// a slow consumer (close code 1008).
    #[serde(default = "d_max_buffered")]
    pub max_buffered_bytes: usize,
    /// How long a socket may sit without completing the handshake.
    #[serde(default = "d_10000")]
    pub handshake_timeout_ms: u64,
    /// Connections idle longer than this are pruned from presence.
    #[serde(default = "d_120")]
    pub stale_connection_secs: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4180,
            max_buffered_bytes: 1_500_000,
            handshake_timeout_ms: 10_000,
            stale_connection_secs: 120,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_4180() -> u16 {
    4_180
}
fn d_max_buffered() -> usize {
    1_500_000
}
fn d_10000() -> u64 {
    10_000
}
fn d_120() -> i64 {
    120
}
