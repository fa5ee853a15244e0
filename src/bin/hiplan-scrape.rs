//! Downloads the daily weather history of every kecamatan

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use hiplan::config::{self, parse_level};
use hiplan::scraper;

#[derive(Parser)]
#[command(name = "hiplan-scrape")]
#[command(about = "Scrape daily weather per kecamatan into CSV files")]
struct Args {
    /// Scraper configuration file
    #[arg(short, long, default_value = "config/scraper.toml")]
    config: PathBuf,

    /// Logging level, overrides the configuration
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(summary) if summary.aborted => {
            error!("scrape aborted before every region was fetched");
            ExitCode::from(2)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("hiplan-scrape: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<scraper::ScrapeSummary> {
    let mut config = config::load_scraper_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    let level = parse_level(&config.log_level)?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let summary = scraper::run(&config).context("scraping")?;
    info!(?summary, "done");
    Ok(summary)
}
