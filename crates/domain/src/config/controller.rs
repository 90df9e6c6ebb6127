use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session controller (SK-sync)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// TTL requested when locking a WORKER task. Clamped to a 60 s floor.
    #[serde(default = "d_3600")]
    pub task_lock_ttl_seconds: u64,
    /// Listing window when looking for a reusable ORION/ATLAS session.
    #[serde(default = "d_50")]
    pub session_list_limit: u32,
    /// Deliver mode for the parent-wake RPC. Production keeps this off so
    /// terminal sessions are not bounced back into a channel.
    #[serde(default)]
    pub wake_deliver: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            task_lock_ttl_seconds: 3_600,
            session_list_limit: 50,
            wake_deliver: false,
        }
    }
}

impl ControllerConfig {
    pub fn effective_lock_ttl_seconds(&self) -> u64 {
        self.task_lock_ttl_seconds.max(60)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3600() -> u64 {
    3_600
}
fn d_50() -> u32 {
    50
}
