//! HiPlan prediction API server

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use hiplan::config::{self, parse_level};
use hiplan::server;
use hiplan::service::AppState;

#[derive(Parser)]
#[command(name = "hiplan")]
#[command(about = "Weather forecast, hike difficulty and mountain recommendation API")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/hiplan.toml")]
    config: PathBuf,

    /// Logging level, overrides the configuration
    #[arg(long)]
    log_level: Option<String>,

    /// Server host, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("hiplan: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = config::load_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let level = parse_level(&config.general.log_level)?;
    tracing_subscriber::fmt().with_max_level(level).init();
    info!(config = %args.config.display(), "starting HiPlan API");

    let state = Arc::new(AppState::from_config(&config));
    if config.general.eager_load {
        state.preload().await.context("loading artifacts")?;
    }

    server::serve(&config.server, state).await.context("serving")?;
    Ok(())
}
