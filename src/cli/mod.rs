use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::download::ConflictAction;

pub mod daemon;
pub mod error;
pub mod handler;
pub mod output;

/// grabbag - bulk media downloader with naming masks
#[derive(Parser, Debug)]
#[command(name = "grabbag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Override config directory path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (TRACE level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a naming mask against URLs
    Mask {
        /// Mask expression, e.g. '${inum|zeropad:3}-${name}.${ext}'
        expression: String,

        /// URLs to name
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download media and wait until the queue drains
    Download {
        /// URLs to download
        urls: Vec<String>,

        /// JSON file with scraper records ('-' for stdin)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Subdirectory below the download root
        #[arg(long, default_value = "")]
        path: String,

        /// What to do when the file already exists (uniquify, overwrite, skip)
        #[arg(long, default_value = "uniquify", value_parser = parse_conflict_action)]
        conflict: ConflictAction,

        /// Remove finished downloads from the host's download list
        #[arg(long)]
        erase_history: bool,

        /// Naming mask applied before enqueueing
        #[arg(long)]
        mask: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve the JSON-lines UI protocol on stdin/stdout
    Serve,

    /// Show or clear the download history
    History {
        /// Remove every history entry
        #[arg(long)]
        clear: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., max_concurrent_downloads, download.directory)
        key: String,
    },

    /// Set configuration value
    Set {
        /// Configuration key
        key: String,

        /// New value
        value: String,
    },

    /// Show all configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the settings file location
    Path,
}

fn parse_conflict_action(value: &str) -> Result<ConflictAction, String> {
    match value.to_ascii_lowercase().as_str() {
        "uniquify" => Ok(ConflictAction::Uniquify),
        "overwrite" => Ok(ConflictAction::Overwrite),
        "skip" => Ok(ConflictAction::Skip),
        other => Err(format!(
            "unknown conflict action '{}' (expected uniquify, overwrite or skip)",
            other
        )),
    }
}
