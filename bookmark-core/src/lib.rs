//! # bookmark-core
//!
//! Core library for publishing a markdown vault as a website.
//!
//! This crate indexes the content directory, resolves `[[wiki links]]` and
//! `![[embeds]]` against that index, and renders vault files (and remote
//! resources they embed) into HTML fragments.

/// Emit a recoverable-problem warning when `log_warnings` is on
macro_rules! warn_if {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            ::tracing::warn!($($arg)+);
        }
    };
}

pub mod cache;
pub mod config;
pub mod embed;
pub mod fetch;
pub mod html;
pub mod markdown;
pub mod render;
pub mod resolver;
pub mod slug;
pub mod vault;
pub mod watch;

pub use cache::RenderCache;
pub use config::{Config, ConfigError};
pub use embed::EmbedProperties;
pub use fetch::FetchError;
pub use render::{RenderError, RenderKind, Renderer};
pub use resolver::{DocumentSource, LinkResolver, LinkToken, ResolvedTarget};
pub use slug::slugify;
pub use vault::{SharedVault, Vault, VaultNode};
pub use watch::spawn_vault_watcher;
