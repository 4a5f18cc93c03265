//! Render a single vault file to stdout.

use super::load_renderer;
use anyhow::{bail, Result};
use std::path::Path;

pub async fn render_file(config_path: &Path, path: &str, embed: bool) -> Result<()> {
    let renderer = load_renderer(config_path)?;
    let path = path.trim_start_matches('/');

    if !renderer.vault().contains_file(path) {
        bail!("No file {:?} in {:?}", path, renderer.config().content_dir());
    }

    let html = renderer.load_file_to_html(path, embed).await;
    println!("{}", html);
    Ok(())
}
