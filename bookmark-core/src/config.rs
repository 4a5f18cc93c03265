//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Main configuration struct matching the bookmark.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    /// Rendering kind -> glob patterns (relative to the content dir)
    #[serde(default = "default_render_overrides")]
    pub render_overrides: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    /// Embeds nested deeper than this are left as literal text
    #[serde(default = "default_max_embed_depth")]
    pub max_embed_depth: usize,

    #[serde(default = "default_true")]
    pub log_warnings: bool,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_max_embed_depth() -> usize {
    2
}

fn default_render_overrides() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("iframe".to_string(), Vec::new()),
        ("codeblock".to_string(), vec!["**/*.html".to_string()]),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_description")]
    pub description: String,
}

fn default_title() -> String {
    "Bookmark".to_string()
}

fn default_description() -> String {
    "A dynamic markdown webserver and file explorer".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: default_description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_content")]
    pub content: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Page template with `$PLACEHOLDER-CONTENT` / `$PLACEHOLDER-TITLE` slots
    #[serde(default)]
    pub template: Option<PathBuf>,
}

fn default_content() -> PathBuf {
    PathBuf::from("content")
}

fn default_output() -> PathBuf {
    PathBuf::from("site")
}

fn default_index_file() -> String {
    "index.md".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content: default_content(),
            output: default_output(),
            index_file: default_index_file(),
            template: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_render_budget_kb")]
    pub render_budget_kb: usize,
}

fn default_render_budget_kb() -> usize {
    10 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            render_budget_kb: default_render_budget_kb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            paths: PathsConfig::default(),
            render_overrides: default_render_overrides(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            max_embed_depth: default_max_embed_depth(),
            log_warnings: true,
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Load the config file if it exists, otherwise fall back to defaults
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Builder-style override of the content directory
    pub fn with_content_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.paths.content = dir.into();
        self
    }

    /// Get the content (vault) directory, resolved relative to config file
    pub fn content_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.content)
    }

    /// Get the output directory, resolved relative to config file
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.output)
    }

    /// Get the page template path, if one is configured
    pub fn template_path(&self) -> Option<PathBuf> {
        self.paths.template.as_ref().map(|p| self.resolve_path(p))
    }

    /// Render cache budget in bytes
    pub fn render_budget_bytes(&self) -> usize {
        self.cache.render_budget_kb.saturating_mul(1024)
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(config_path) = &self.config_path {
            if let Some(parent) = config_path.parent() {
                parent.join(path)
            } else {
                path.to_path_buf()
            }
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.paths.content, PathBuf::from("content"));
        assert_eq!(config.paths.index_file, "index.md");
        assert_eq!(config.render_budget_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(15));
        assert_eq!(
            config.render_overrides.get("codeblock"),
            Some(&vec!["**/*.html".to_string()])
        );
        assert!(config.log_warnings);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
site:
  title: "Notes"
paths:
  content: "vault"
cache:
  render_budget_kb: 64
"#
        )
        .unwrap();

        let config = Config::from_file(tmp.path()).unwrap();
        assert_eq!(config.site.title, "Notes");
        assert_eq!(config.render_budget_bytes(), 64 * 1024);
        assert_eq!(config.max_embed_depth, 2);

        let parent = tmp.path().parent().unwrap();
        assert_eq!(config.content_dir(), parent.join("vault"));
        assert_eq!(config.output_dir(), parent.join("site"));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let config = Config::default().with_content_dir("/srv/vault");
        assert_eq!(config.content_dir(), PathBuf::from("/srv/vault"));
    }
}
