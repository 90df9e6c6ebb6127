//! `super-kanban reconcile` — offline replay CLI.

use std::sync::Arc;

use sk_client::SuperKanbanClient;
use sk_domain::config::Config;
use sk_reconcile::{ReconcileMode, ReconcileOptions, Reconciler};
use sk_spool::{BindingResolver, LabelMap};

use super::ReconcileArgs;

/// Returns the process exit code: 0 on success, 2 on configuration or
/// auth errors, 1 on runtime failure.
pub async fn run(mut config: Config, args: ReconcileArgs) -> i32 {
    // CLI overrides beat config + env.
    if let Some(url) = args.base_url {
        config.super_kanban.base_url = Some(url);
    }
    if let Some(token) = args.token {
        config.super_kanban.bearer_token = Some(token);
    }
    if let Some(header) = args.auth_header {
        config.super_kanban.auth_header = Some(header);
    }
    if let Some(path) = args.attach_path {
        config.super_kanban.paths.attach = path;
    }
    if let Some(path) = args.messages_path {
        config.super_kanban.paths.messages = path;
    }
    if let Some(path) = args.tool_calls_path {
        config.super_kanban.paths.tool_calls = path;
    }

    let state_dir = args
        .state_dir
        .unwrap_or_else(|| config.exporter.state_dir.clone());
    let mode = if args.fix {
        ReconcileMode::Fix
    } else {
        ReconcileMode::DryRun
    };

    let api = if mode == ReconcileMode::Fix {
        match SuperKanbanClient::new(&config.super_kanban) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn sk_client::SuperKanbanApi>),
            Err(e) => {
                eprintln!("configuration error: {e}");
                return 2;
            }
        }
    } else {
        None
    };

    let label_map_path = config
        .reconciler
        .label_map_path
        .clone()
        .unwrap_or_else(|| LabelMap::default_path(&state_dir));
    let resolver = BindingResolver::new(state_dir.clone(), Arc::new(LabelMap::load(label_map_path)));

    let mut options = ReconcileOptions::new(mode, state_dir);
    options.agent_allowlist = config.reconciler.agent_allowlist.clone();
    options.agent_id = args.agent;
    options.session_id = args.session_id;
    options.session_key = args.session_key;
    options.max_sessions = args.max_sessions;
    options.preview = args.preview.unwrap_or(config.reconciler.preview);
    options.hash_scan_lines = config.reconciler.effective_hash_scan_lines();
    options.redaction = config.exporter.redaction.clone();

    let reconciler = match Reconciler::new(options, resolver, api) {
        Ok(reconciler) => reconciler,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return 2;
        }
    };

    match reconciler.run().await {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("report serialization failed: {e}");
                        return 1;
                    }
                }
            } else {
                print!("{}", report.render());
            }
            0
        }
        Err(e) => {
            eprintln!("reconcile failed: {e}");
            1
        }
    }
}
