//! `super-kanban serve` — gateway + transcript exporter under one
//! runtime.

use std::sync::Arc;

use anyhow::Context;
use sk_client::SuperKanbanClient;
use sk_domain::config::Config;
use sk_spool::{BindingResolver, LabelMap, SpoolEngine};

use crate::server;
use crate::state::GatewayState;

pub async fn run(config: Config) -> anyhow::Result<()> {
    // Auth/base-URL problems must surface here, not on the first tick.
    let api = Arc::new(
        SuperKanbanClient::new(&config.super_kanban)
            .context("super-kanban client configuration")?,
    );

    let state_dir = config.exporter.state_dir.clone();
    let label_map_path = config
        .reconciler
        .label_map_path
        .clone()
        .unwrap_or_else(|| LabelMap::default_path(&state_dir));
    let resolver = BindingResolver::new(state_dir, Arc::new(LabelMap::load(label_map_path)));
    let engine = SpoolEngine::new(config.exporter.clone(), api, resolver);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
            // Give the engine a moment for its final flush.
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            std::process::exit(0);
        }
    });

    let state = GatewayState::new(config.gateway.clone());
    let result = server::serve(state).await;

    engine_task.abort();
    result
}
