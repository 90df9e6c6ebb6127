//! Seams to the agent runtime and the gateway.
//!
//! The controller never talks to the OpenClaw runtime directly; spawning
//! and parent-wake RPCs are injected so tests can record them and the
//! production wiring can route in-process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sk_domain::error::Result;

/// Request to the session-spawn API of the agent runtime.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnSessionRequest {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_seconds: Option<u64>,
    /// Always `"run"` — the child executes and terminates.
    pub mode: String,
    /// Always `"keep"` — transcripts must survive for the exporter.
    pub cleanup: String,
}

/// Outcome of a spawn attempt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnSessionResult {
    pub accepted: bool,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait SessionsApi: Send + Sync {
    async fn sessions_spawn(&self, req: SpawnSessionRequest) -> Result<SpawnSessionResult>;

    /// Forward an instruction into an existing session.
    async fn sessions_send(&self, session_key: &str, message: &str) -> Result<()>;
}

/// Delivery mode of the wake RPC. Production suppresses channel delivery
/// so terminal sessions are not bounced back into a chat surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeDeliver {
    Suppressed,
    LastChannel,
}

#[derive(Debug, Clone)]
pub struct WakeRequest {
    pub session_key: String,
    pub deliver: WakeDeliver,
    pub lane: String,
    /// Fresh per logical wake; the gateway dedupes redeliveries on it.
    pub idempotency_key: String,
    pub message: String,
}

#[async_trait]
pub trait GatewayRpc: Send + Sync {
    async fn agent_wake(&self, req: WakeRequest) -> Result<()>;
}
