//! src/main.rs
//! Offline runner for the local filter/sort engine.
//!
//! Usage: `portal <records.json> [filter.json]`
//!
//! Reads a JSON array of records, applies the filter (or a default first page)
//! and prints the resulting page as JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::fs as TokioFs;
use tracing::{info, warn};

use portal_core::{
    config::Config,
    engine::LocalEngine,
    filter::Filter,
    logging::LoggerBuilder,
    model::DynamicRecord,
};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(records_path) = args.next().map(PathBuf::from) else {
        bail!("usage: portal <records.json> [filter.json]");
    };
    let filter_path = args.next().map(PathBuf::from);

    let config = match Config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Using default config: {e:#}");
            Config::default()
        }
    };

    let _guard = LoggerBuilder::new()
        .with_config(config.logging.clone())
        .build()
        .await
        .context("Failed to initialize logging")?;

    let records: Vec<DynamicRecord> = read_json(&records_path)
        .await
        .context("Failed to read records")?;

    let filter = match filter_path {
        Some(path) => read_json(&path).await.context("Failed to read filter")?,
        None => Filter::new()
            .with_page(0, config.paging.default_take)
            .context("Invalid paging config")?,
    };

    if config.search.fields.is_empty() {
        warn!(
            marker = "SEARCH_FIELDS_EMPTY",
            operation_type = "engine",
            "No search fields configured, free-text search matches nothing"
        );
    }
    let engine = LocalEngine::new(config.search.fields.iter().map(String::as_str));
    let page = engine.apply(&records, &filter);

    info!(
        marker = "ENGINE_APPLIED",
        operation_type = "engine",
        input = records.len(),
        output = page.list.len(),
        count = ?page.count,
        "Local engine applied"
    );

    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = TokioFs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}
