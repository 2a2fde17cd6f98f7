use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

use super::daemon::{self, QueueService};
use super::{Commands, ConfigAction, error, output};
use crate::app::config::Config;
use crate::app::settings::SettingsError;
use crate::download::{
    ConflictAction, DownloadOptions, FileHistoryStore, HistoryStore, QueueState,
};
use crate::mask::NamingMask;
use crate::media::{MediaItem, MediaSource, RawMedia, prepare_candidates};
use crate::util::paths;

/// Upper bound between queue checks while waiting for downloads
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Handle a CLI command and return exit code
pub async fn handle_command(command: Commands, config: Config) -> i32 {
    let result = match command {
        Commands::Mask {
            expression,
            urls,
            json,
        } => handle_mask(&expression, &urls, json),
        Commands::Download {
            urls,
            input,
            path,
            conflict,
            erase_history,
            mask,
            json,
        } => {
            let options = DownloadOptions {
                download_path: path,
                conflict_action: conflict,
                erase_history,
            };
            handle_download(urls, input, options, mask, json, &config).await
        }
        Commands::Serve => daemon::run_daemon(config).await.map(|_| error::SUCCESS),
        Commands::History { clear, json } => handle_history(clear, json).await,
        Commands::Config { action } => handle_config(action, config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            error::ERROR
        }
    }
}

/// Evaluate a naming mask against each URL
fn handle_mask(expression: &str, urls: &[String], json: bool) -> Result<i32> {
    let mask = NamingMask::new(expression);
    if let Some(e) = mask.error() {
        eprintln!("Warning: {}", e);
    }

    let mut code = error::SUCCESS;
    let mut results = Vec::new();
    for url in urls {
        match MediaItem::from_url(url) {
            Ok(item) => results.push((url.clone(), mask.evaluate(&item))),
            Err(e) => {
                eprintln!("Skipping {}: {}", url, e);
                code = error::INVALID_INPUT;
            }
        }
    }

    println!("{}", output::format_mask_results(&results, json));
    Ok(code)
}

/// Enqueue media and block until every enqueued item is finished
async fn handle_download(
    urls: Vec<String>,
    input: Option<PathBuf>,
    options: DownloadOptions,
    mask: Option<String>,
    json: bool,
    config: &Config,
) -> Result<i32> {
    let options = match options.validated() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(error::INVALID_INPUT);
        }
    };

    let mut records = match input {
        Some(path) => read_records(&path).await?,
        None => Vec::new(),
    };
    records.extend(urls.into_iter().map(|url| RawMedia::new(MediaSource::Link, url)));

    let mut items: Vec<MediaItem> = prepare_candidates(records)
        .into_iter()
        .filter_map(|record| match MediaItem::from_raw(record) {
            Ok(item) => Some(item),
            Err(e) => {
                eprintln!("Skipping candidate: {}", e);
                None
            }
        })
        .collect();

    if items.is_empty() {
        eprintln!("Nothing to download.");
        return Ok(error::INVALID_INPUT);
    }

    if let Some(expression) = mask {
        let mask = NamingMask::new(&expression);
        if let Some(e) = mask.error() {
            eprintln!("Error: Invalid naming mask: {}", e);
            return Ok(error::INVALID_INPUT);
        }
        for item in items.iter_mut() {
            item.selected = true;
        }
        mask.apply(&mut items);
    }

    if options.conflict_action == ConflictAction::Skip {
        tracing::debug!("Existing files will be skipped");
    }

    let service = QueueService::start(config)?;
    let mut summary = service.handle.summary();
    let ids: HashSet<_> = service
        .handle
        .enqueue(items, options)
        .await?
        .into_iter()
        .collect();
    tracing::info!("Enqueued {} item(s)", ids.len());

    let finished = loop {
        let snapshot = service.handle.get_queue().await?;
        let ours: Vec<_> = snapshot
            .items
            .into_iter()
            .filter(|item| ids.contains(&item.id))
            .collect();
        if ours.iter().all(|item| item.is_done()) {
            break ours;
        }

        tokio::select! {
            _ = summary.changed() => {}
            _ = tokio::time::sleep(WAIT_POLL_INTERVAL) => {}
        }
    };

    service.shutdown().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&finished).context("Failed to serialize queue")?
        );
    } else {
        for item in &finished {
            println!("{}", output::format_queue_item(item, false));
        }
        println!("{}", output::format_state_counts(&finished));
    }

    let failed = finished
        .iter()
        .any(|item| matches!(item.state, QueueState::Failed | QueueState::Interrupted));
    Ok(if failed { error::ERROR } else { error::SUCCESS })
}

/// Read a JSON array of scraper records from a file, or stdin for `-`
async fn read_records(path: &Path) -> Result<Vec<RawMedia>> {
    let content = if path.as_os_str() == "-" {
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .context("Failed to read stdin")?;
        content
    } else {
        tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read {:?}", path))?
    };

    serde_json::from_str(&content).context("Input must be a JSON array of media records")
}

async fn handle_history(clear: bool, json: bool) -> Result<i32> {
    let store = FileHistoryStore::new(paths::history_path()?);

    if clear {
        store.clear().await?;
        println!("History cleared.");
        return Ok(error::SUCCESS);
    }

    let history = store.load().await?;
    println!("{}", output::format_history(&history.entries, json));
    Ok(error::SUCCESS)
}

/// Handle configuration commands
fn handle_config(action: ConfigAction, mut config: Config) -> Result<i32> {
    match action {
        ConfigAction::Get { key } => match get_config_value(&config, &key) {
            Ok(value) => {
                println!("{}", value);
                Ok(error::SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                Ok(error::INVALID_INPUT)
            }
        },
        ConfigAction::Set { key, value } => {
            if let Err(e) = set_config_value(&mut config, &key, &value) {
                eprintln!("Error: {}", e);
                return Ok(error::INVALID_INPUT);
            }
            config.save()?;
            println!("Configuration updated: {} = {}", key, value);
            Ok(error::SUCCESS)
        }
        ConfigAction::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(error::SUCCESS)
        }
        ConfigAction::Path => {
            println!("{}", paths::settings_path()?.display());
            Ok(error::SUCCESS)
        }
    }
}

/// Get configuration value by key; queue settings may omit the `settings.` prefix
fn get_config_value(config: &Config, key: &str) -> Result<String, SettingsError> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["download", "directory"] => Ok(config.download.directory.display().to_string()),
        ["download", "user_agent"] => Ok(config.download.user_agent.clone()),
        ["download", "request_timeout_secs"] => {
            Ok(config.download.request_timeout_secs.to_string())
        }
        ["settings", name] | [name] => config.settings.get(name),
        _ => Err(SettingsError::UnknownKey(key.to_string())),
    }
}

/// Set configuration value by key
fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<(), SettingsError> {
    let parts: Vec<&str> = key.split('.').collect();
    let invalid = || SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    match parts.as_slice() {
        ["download", "directory"] => config.download.directory = PathBuf::from(value),
        ["download", "user_agent"] => config.download.user_agent = value.to_string(),
        ["download", "request_timeout_secs"] => {
            config.download.request_timeout_secs = value.trim().parse().map_err(|_| invalid())?
        }
        ["settings", name] | [name] => config.settings.set(name, value)?,
        _ => return Err(SettingsError::UnknownKey(key.to_string())),
    }

    Ok(())
}
