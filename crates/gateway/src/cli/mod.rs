pub mod reconcile_cmd;
pub mod serve_cmd;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sk_domain::config::Config;
use sk_domain::error::{Error, Result};

/// OpenClaw ⇄ Super-Kanban integration gateway.
#[derive(Debug, Parser)]
#[command(name = "super-kanban", version, about)]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway and the transcript exporter (default).
    Serve,
    /// Replay archived transcripts into Super-Kanban.
    Reconcile(ReconcileArgs),
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Post the replayed events (default is a dry run).
    #[arg(long, conflicts_with = "dry_run")]
    pub fix: bool,
    /// Count and preview without any HTTP writes.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub state_dir: Option<PathBuf>,
    /// Restrict to one agent id.
    #[arg(long = "agent")]
    pub agent: Option<String>,
    #[arg(long)]
    pub session_id: Option<String>,
    #[arg(long)]
    pub session_key: Option<String>,
    #[arg(long)]
    pub max_sessions: Option<usize>,
    /// Keys previewed per session.
    #[arg(long)]
    pub preview: Option<usize>,
    /// Emit the structured report as JSON.
    #[arg(long)]
    pub json: bool,

    // Connection overrides (else config/env).
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub token: Option<String>,
    #[arg(long)]
    pub auth_header: Option<String>,
    #[arg(long)]
    pub attach_path: Option<String>,
    #[arg(long)]
    pub messages_path: Option<String>,
    #[arg(long)]
    pub tool_calls_path: Option<String>,
}

/// Load the config file (missing file = defaults) and fold in env vars.
pub fn load_config(path: &PathBuf) -> Result<Config> {
    let mut config: Config = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(e) => return Err(Error::Io(e)),
    };
    config.apply_env();
    Ok(config)
}
