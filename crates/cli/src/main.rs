mod config;

use std::path::PathBuf;

use config::{config_path_from_env, load_or_create_config, resolve_path};
use indexer::{Indexer, ProgressFn, ScanProgress};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    }
    if config.folders.is_empty() {
        warn!("No folders configured in {:?}; nothing to scan", config_path);
        return Ok(());
    }

    let folders: Vec<PathBuf> = config
        .folders
        .iter()
        .map(|folder| resolve_path(&config_path, folder))
        .collect();
    let index_path = resolve_path(&config_path, &config.index_path);

    let indexer = Indexer::open(&index_path)?;

    let on_progress: &ProgressFn = &|progress: ScanProgress| {
        debug!(
            "Indexed {}/{} files ({}%)",
            progress.current, progress.total, progress.percentage
        );
    };
    let report = indexer.scan(&folders, Some(on_progress)).await?;

    info!(
        "Indexed {} beats across {} folders",
        report.beats.len(),
        folders.len()
    );
    for error in &report.errors {
        warn!("Scan warning: {}", error);
    }

    Ok(())
}
