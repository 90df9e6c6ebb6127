//! HTTP server wiring for the gateway WebSocket endpoint.

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::readiness::Phase;
use crate::state::GatewayState;
use crate::ws::gateway_ws;

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/gateway/ws", get(gateway_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Bind and serve until the process is stopped. Readiness advances to
/// `listening` once the port is bound and `ready` when the accept loop
/// starts; a background task prunes connections that stopped ponging.
pub async fn serve(state: GatewayState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    state.readiness.advance(Phase::Listening);
    state.registry.broadcast_health("listening");
    tracing::info!(addr = %addr, "gateway listening");

    {
        let registry = state.registry.clone();
        let stale_secs = state.config.stale_connection_secs;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tick.tick().await;
                if registry.prune_stale(stale_secs) > 0 {
                    registry.broadcast_presence();
                }
            }
        });
    }

    let app = router(state.clone());
    state.readiness.advance(Phase::Ready);
    state.registry.broadcast_health("ready");

    axum::serve(listener, app).await?;
    Ok(())
}
