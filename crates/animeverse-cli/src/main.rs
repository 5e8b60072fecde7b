mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use animeverse_api::traits::{CatalogIds, ImageSet};
use animeverse_core::config::AppConfig;
use animeverse_runtime::{Resolution, RuntimeError};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli::log_filter(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "animeverse failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, RuntimeError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(RuntimeError::Config)?;

    match cli.command {
        Command::Resolve { ids, store } => {
            if let Some(store) = store {
                config.store.kind = store.into();
            }
            resolve(&config, ids.catalog_ids()).await
        }
        Command::Lookup { ids } => lookup(&config, ids.catalog_ids()).await,
        Command::Prune => prune(&config).await,
    }
}

async fn resolve(config: &AppConfig, ids: CatalogIds) -> Result<ExitCode, RuntimeError> {
    let cache = animeverse_runtime::build_cache(config)?;

    let outcome = cache.resolve(ids, |images: &ImageSet| print_json(images)).await;

    match outcome {
        Resolution::Resolved { from, report, .. } => {
            tracing::info!(?from, ?report, "Images resolved");
            Ok(ExitCode::SUCCESS)
        }
        Resolution::CacheHit(_) | Resolution::Joined => Ok(ExitCode::SUCCESS),
        Resolution::NoIds => {
            eprintln!("pass --mal-id and/or --anilist-id");
            Ok(ExitCode::from(2))
        }
        Resolution::NotFound { report } => {
            tracing::warn!(?report, "No images found");
            eprintln!("no images found");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn lookup(config: &AppConfig, ids: CatalogIds) -> Result<ExitCode, RuntimeError> {
    if ids.is_empty() {
        eprintln!("pass --mal-id and/or --anilist-id");
        return Ok(ExitCode::from(2));
    }

    let db = animeverse_runtime::open_local_store(config)?;
    let row = db.get_images(ids).await?;

    match row {
        Some(row) => {
            print_json(&row);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("nothing stored");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn prune(config: &AppConfig) -> Result<ExitCode, RuntimeError> {
    let days = config.store.stale_after_days;
    if days == 0 {
        tracing::info!("store.stale_after_days is 0, nothing to prune");
        return Ok(ExitCode::SUCCESS);
    }

    let db = animeverse_runtime::open_local_store(config)?;
    let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(days));
    let removed = db.delete_stale(cutoff).await?;

    tracing::info!(removed, %cutoff, "Pruned stale images");
    println!("{removed}");
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to encode output"),
    }
}
