//! CLI command implementations.

pub mod build;
pub mod render;
pub mod tree;
pub mod watch;

pub use build::build_site;
pub use render::render_file;
pub use tree::print_tree;
pub use watch::watch_vault;

use anyhow::{Context, Result};
use bookmark_core::{Config, Renderer};
use std::path::Path;

/// Load the config (defaults when the file is absent) and index the vault
pub(crate) fn load_renderer(config_path: &Path) -> Result<Renderer> {
    tracing::debug!("Loading config from {:?}", config_path);
    let config =
        Config::from_file_or_default(config_path).context("Failed to load configuration")?;
    Renderer::from_config(config).context("Failed to initialize renderer")
}
