//! High Tech Timesheet server
//!
//! Usage: `hightech [config.yaml]`. Without an argument the path is read
//! from `HIGHTECH_CONFIG`, then defaults to `hightech.yaml`.

use anyhow::{Context, Result};
use chrono::Duration;
use hightech::core::invoice::date_key;
use hightech::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "hightech.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hightech=info,tower_http=info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HIGHTECH_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let config = AppConfig::from_yaml_file(&path)
        .with_context(|| format!("loading configuration from {}", path))?;
    tracing::info!(config = %path, baseurl = %config.baseurl, "configuration loaded");

    tokio::fs::create_dir_all(&config.archive_path)
        .await
        .with_context(|| format!("creating archive directory {}", config.archive_path.display()))?;

    bootstrap_invoice(&config).await?;

    ServerBuilder::new(config).serve().await
}

/// Start a fresh period anchored at today when no live document exists
async fn bootstrap_invoice(config: &AppConfig) -> Result<()> {
    let store = JsonFileStore::new(&config.invoice_data);
    if store.exists().await {
        return Ok(());
    }

    let today = SystemClock.today();
    let doc = InvoiceDocument::create(&date_key(today), Duration::zero())?;
    store.save(&doc).await?;

    tracing::info!(
        path = %config.invoice_data.display(),
        start = %today,
        "created a new invoice document"
    );
    Ok(())
}
