use std::sync::Arc;

use sk_domain::config::GatewayConfig;

use crate::presence::ClientRegistry;
use crate::readiness::Readiness;

/// Shared state handed to every WebSocket connection task.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ClientRegistry>,
    pub readiness: Arc<Readiness>,
    /// Pre-shared connect token. `None` = dev mode (no auth enforced).
    pub auth_token: Option<Arc<str>>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        let auth_token = std::env::var("OPENCLAW_GATEWAY_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        Self {
            config: Arc::new(config),
            registry: Arc::new(ClientRegistry::new()),
            readiness: Arc::new(Readiness::new()),
            auth_token,
        }
    }
}
