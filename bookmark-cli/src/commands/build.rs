//! Build command implementation.

use super::load_renderer;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Render every vault file to `<output>/<path>.html`, the configured index
/// file to `<output>/index.html`, and write `vault.json`
pub async fn build_site(config_path: &Path) -> Result<()> {
    let renderer = load_renderer(config_path)?;
    let config = renderer.config();
    tracing::info!("Building site: {}", config.site.title);

    let output_dir = config.output_dir();
    fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

    let vault = renderer.vault();
    let files = vault.files();
    for path in &files {
        let page = renderer
            .render_page(path)
            .await
            .with_context(|| format!("Failed to render {}", path))?;

        let target = output_dir.join(format!("{}.html", path));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        fs::write(&target, page).with_context(|| format!("Failed to write {:?}", target))?;
        tracing::debug!("Wrote {:?}", target);
    }

    let index_file = config.paths.index_file.trim_start_matches('/');
    if vault.contains_file(index_file) {
        let page = renderer
            .render_page(index_file)
            .await
            .with_context(|| format!("Failed to render {}", index_file))?;
        fs::write(output_dir.join("index.html"), page).context("Failed to write index.html")?;
    } else {
        tracing::warn!(index_file, "Index file not found in vault; skipping index.html");
    }

    let index = vault
        .to_json()
        .context("Failed to serialize vault index")?;
    fs::write(output_dir.join("vault.json"), index).context("Failed to write vault.json")?;

    let stats = renderer.cache().stats();
    tracing::info!(
        cache_entries = stats.entries,
        cache_bytes = stats.size_bytes,
        "✓ Built {} pages",
        files.len()
    );
    tracing::info!("✓ Output written to {:?}", output_dir);

    Ok(())
}
