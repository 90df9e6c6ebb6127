mod client;
mod controller;
mod exporter;
mod gateway;
mod reconciler;
mod telegram;

pub use client::*;
pub use controller::*;
pub use exporter::*;
pub use gateway::*;
pub use reconciler::*;
pub use telegram::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub exporter: ExporterConfig,
    #[serde(default)]
    pub super_kanban: SkClientConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Apply environment overrides on top of file-loaded values.
    ///
    /// Env always wins over the config file so deployments can rotate
    /// credentials without touching persisted config.
    pub fn apply_env(&mut self) {
        self.super_kanban.apply_env();
        self.reconciler.apply_env();
        self.telegram.apply_env();
    }
}
