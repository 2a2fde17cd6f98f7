use clap::Parser;
use grabbag::{
    Config,
    cli::{self, Cli},
};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() {
    // Parse CLI arguments first to get verbose flag
    let cli = Cli::parse();

    // Set config directory override before anything resolves paths
    if let Some(ref config_dir) = cli.config {
        grabbag::util::paths::set_config_dir_override(Some(config_dir.clone()));
    }

    // Get logs directory (creates if needed)
    let logs_dir = grabbag::util::paths::logs_dir().unwrap_or_else(|_| PathBuf::from(".logs"));
    std::fs::create_dir_all(&logs_dir).ok();

    // Daily rotating JSON log; stdout stays free for the serve protocol
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "grabbag.jsonl");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = if cli.verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                    log_level,
                )),
        )
        .init();

    tracing::info!("Starting grabbag {}", env!("CARGO_PKG_VERSION"));
    if let Some(ref config_dir) = cli.config {
        tracing::info!("Using config directory override: {:?}", config_dir);
    }
    tracing::trace!("CLI arguments: {:?}", cli);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(cli::error::ERROR);
        }
    };
    tracing::debug!("Config loaded: {:?}", config);

    let exit_code = cli::handler::handle_command(cli.command, config).await;

    // Flush the log writer before exiting
    drop(guard);
    std::process::exit(exit_code);
}
