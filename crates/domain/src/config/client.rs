use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Super-Kanban connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection + credential configuration for the Super-Kanban API.
///
/// Credentials come in two scopes: `read` (UI reads, session resolve) and
/// `write` (any non-GET/HEAD/OPTIONS request). Each scope can be overridden
/// with an explicit header pair; otherwise the bearer token is preferred
/// for reads and the API key for writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkClientConfig {
    /// Base URL; normalized to end in `/api` at client construction.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token (read scope preference).
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// API key (write scope preference), sent as `X-Api-Key`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-scope header override for reads, as `Header-Name: value`.
    #[serde(default)]
    pub read_auth_header: Option<String>,
    /// Per-scope header override for writes, as `Header-Name: value`.
    #[serde(default)]
    pub write_auth_header: Option<String>,
    /// Legacy single header pair, used when neither scope header is set.
    #[serde(default)]
    pub auth_header: Option<String>,
    /// Per-request budget. Clamped to a 500 ms floor.
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    /// Endpoint path overrides (relative to the normalized base URL).
    #[serde(default)]
    pub paths: SkPathsConfig,
}

impl Default for SkClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            api_key: None,
            read_auth_header: None,
            write_auth_header: None,
            auth_header: None,
            timeout_ms: 10_000,
            paths: SkPathsConfig::default(),
        }
    }
}

impl SkClientConfig {
    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout_ms.max(500)
    }

    /// Fold in the `SUPER_KANBAN_*` environment variables. Env wins.
    pub fn apply_env(&mut self) {
        if let Some(url) = first_env(&["SUPER_KANBAN_BASE_URL", "SUPERKANBAN_BASE_URL"]) {
            self.base_url = Some(url);
        }
        if let Some(token) = first_env(&["SUPER_KANBAN_TOKEN", "SUPERKANBAN_BEARER_TOKEN"]) {
            self.bearer_token = Some(token);
        }
        if let Some(key) = first_env(&["SUPERKANBAN_API_KEY", "SUPER_KANBAN_API_KEY"]) {
            self.api_key = Some(key);
        }
        if let Some(header) = first_env(&["SUPER_KANBAN_AUTH_HEADER"]) {
            self.auth_header = Some(header);
        }
    }
}

/// Relative endpoint paths for the integration write surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkPathsConfig {
    #[serde(default = "d_attach_path")]
    pub attach: String,
    #[serde(default = "d_messages_path")]
    pub messages: String,
    #[serde(default = "d_tool_calls_path")]
    pub tool_calls: String,
}

impl Default for SkPathsConfig {
    fn default() -> Self {
        Self {
            attach: d_attach_path(),
            messages: d_messages_path(),
            tool_calls: d_tool_calls_path(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10000() -> u64 {
    10_000
}
fn d_attach_path() -> String {
    "/integrations/openclaw/sessions/attach".into()
}
fn d_messages_path() -> String {
    "/integrations/openclaw/messages".into()
}
fn d_tool_calls_path() -> String {
    "/integrations/openclaw/tool-calls".into()
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| std::env::var(n).ok())
        .find(|v| !v.trim().is_empty())
}
