//! Print the vault index.

use anyhow::{Context, Result};
use bookmark_core::{Config, Vault};
use std::path::Path;

pub fn print_tree(config_path: &Path, pretty: bool) -> Result<()> {
    let config =
        Config::from_file_or_default(config_path).context("Failed to load configuration")?;
    let vault = Vault::build(config.content_dir());

    let json = if pretty {
        vault.to_json_pretty()
    } else {
        vault.to_json()
    }
    .context("Failed to serialize vault index")?;

    println!("{}", json);
    Ok(())
}
