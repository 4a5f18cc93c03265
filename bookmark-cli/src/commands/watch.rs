//! Keep the vault index live until interrupted.

use super::load_renderer;
use anyhow::{Context, Result};
use bookmark_core::spawn_vault_watcher;
use std::path::Path;
use std::sync::Arc;

pub async fn watch_vault(config_path: &Path) -> Result<()> {
    let renderer = Arc::new(load_renderer(config_path)?);
    let content_dir = renderer.config().content_dir();

    let _watcher = spawn_vault_watcher(renderer.clone())
        .with_context(|| format!("Failed to watch {:?}", content_dir))?;

    println!("Watching {:?} for changes (Ctrl+C to stop)...", content_dir);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    let stats = renderer.cache().stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        "Stopped watching"
    );
    Ok(())
}
