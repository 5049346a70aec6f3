//! metasift API Server
//!
//! Run with: cargo run --bin metasift-api
//!
//! # Configuration
//!
//! Read from `METASIFT_CONFIG` when set, otherwise from the default
//! locations (`~/.config/metasift/config.toml`, `/etc/metasift/config.toml`,
//! `./config.toml`). Environment variables override file settings:
//! - `METASIFT_DB_PATH`: SQLite database file
//! - `METASIFT_UNKNOWN_FIELDS`: `reject` or `metadata_probe`
//! - `METASIFT_SAMPLER_TIMEOUT_MS`: autocomplete sampling budget
//! - `METASIFT_API_HOST` / `METASIFT_API_PORT`: bind address
//! - `METASIFT_LOG_LEVEL` / `METASIFT_LOG_FORMAT`: logging
//! - `RUST_LOG`: full filter, wins over the configured level

use anyhow::{Context, Result};
use std::path::PathBuf;

use metasift::api::{serve, AppState};
use metasift::config::Config;
use metasift::logging::init_tracing;
use metasift::storage::CatalogStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::var("METASIFT_CONFIG") {
        Ok(path) => Config::load_with_env(&PathBuf::from(path))?,
        Err(_) => Config::load_default(),
    };

    init_tracing(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!("Starting metasift API server v{}", env!("CARGO_PKG_VERSION"));

    let db_path = config.database.resolved_path();
    tracing::info!("Database: {:?}", db_path);

    let store = tokio::task::spawn_blocking({
        let store_config = config.store_config();
        let db_path = db_path.clone();
        move || CatalogStore::open(&db_path, store_config)
    })
    .await?
    .with_context(|| format!("opening database {}", db_path.display()))?;

    let discovery = store.clone();
    let catalog = tokio::task::spawn_blocking(move || discovery.discover_catalog()).await??;
    tracing::info!(
        fields = catalog.len(),
        unknown_fields = ?catalog.unknown_fields(),
        "Catalog discovered"
    );

    let state = AppState::new(store, catalog, config.suggest_options(), config.api.clone());

    serve(state, &config.api).await?;

    tracing::info!("metasift API server stopped");
    Ok(())
}
