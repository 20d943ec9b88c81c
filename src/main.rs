//! Pixiv-Frontier main entry point
//!
//! This is the command-line interface for the Pixiv-Frontier crawler.

use anyhow::Context;
use clap::Parser;
use pixiv_frontier::config::{load_config_with_hash, Config};
use pixiv_frontier::crawler::crawl;
use pixiv_frontier::{CrawlError, ItemId, SessionManager};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pixiv-Frontier: an authenticated illustration crawler
///
/// Pixiv-Frontier logs into the platform, downloads the illustration given as
/// the start id and keeps following the related-works feed until the
/// download limit is reached.
#[derive(Parser, Debug)]
#[command(name = "pixiv-frontier")]
#[command(version = "1.0.0")]
#[command(about = "An authenticated frontier-expansion crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Illustration id to start from (overrides start_illust_id and auto_start)
    #[arg(long, value_name = "ID")]
    start: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Restore or establish the session, then exit without crawling
    #[arg(long, conflicts_with = "start")]
    check_login: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let result = if cli.check_login {
        handle_check_login(&config).await
    } else {
        handle_crawl(config, cli.start).await
    };

    match result {
        Ok(()) => Ok(()),
        // A refused login has already been reported; it is not a crash.
        Err(CrawlError::Auth(reason)) => {
            tracing::error!("Giving up, the session could not be authenticated: {}", reason);
            Ok(())
        }
        Err(e) => Err(e).context("crawl failed"),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pixiv_frontier=info,warn"),
            1 => EnvFilter::new("pixiv_frontier=debug,info"),
            2 => EnvFilter::new("pixiv_frontier=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --check-login: only restores or establishes the session
async fn handle_check_login(config: &Config) -> Result<(), CrawlError> {
    let session = SessionManager::new(config)?;
    session.restore_or_login().await?;
    tracing::info!("Session is {}", session.phase());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, start: Option<String>) -> Result<(), CrawlError> {
    let start = start.map(ItemId::new).or_else(|| {
        config
            .system
            .start_illust_id
            .clone()
            .filter(|_| config.system.auto_start)
    });

    match &start {
        Some(id) => tracing::info!(
            "Starting crawl from {} (limit {})",
            id,
            config.system.download_limit
        ),
        None => tracing::info!("auto_start is off and no --start given, logging in only"),
    }

    if let Some(summary) = crawl(config, start).await? {
        tracing::info!(
            "Crawl completed: {} downloaded, {} rejected, {} failed, {} known ids",
            summary.processed,
            summary.rejected,
            summary.failed,
            summary.visited
        );
    }
    Ok(())
}
