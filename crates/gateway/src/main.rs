use clap::Parser;
use tracing_subscriber::EnvFilter;

use sk_gateway::cli::{self, Cli, Command};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tower_http=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing();

    let config = match cli::load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(2);
        }
    };

    match args.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => cli::serve_cmd::run(config).await,
        Some(Command::Reconcile(reconcile_args)) => {
            let code = cli::reconcile_cmd::run(config, reconcile_args).await;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}
