//! # bookmark CLI
//!
//! Command-line interface for rendering a markdown vault.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bookmark")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "bookmark.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the HTML fragment for one vault file
    Render {
        /// Vault-relative path of the file
        path: String,

        /// Render as an embed (no title heading)
        #[arg(long)]
        embed: bool,
    },

    /// Print the vault index as JSON
    Tree {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Render every vault file into the output directory
    Build,

    /// Keep the vault index live and report rebuilds
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Render { path, embed } => commands::render_file(&cli.config, &path, embed).await,
        Commands::Tree { pretty } => commands::print_tree(&cli.config, pretty),
        Commands::Build => commands::build_site(&cli.config).await,
        Commands::Watch => commands::watch_vault(&cli.config).await,
    }
}
