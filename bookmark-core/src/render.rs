//! Rendering of vault files into HTML fragments and pages.

use crate::cache::{cache_key, RenderCache};
use crate::config::{Config, SiteConfig};
use crate::embed::process_embed;
use crate::fetch::{FetchError, Fetcher};
use crate::html::escape_html;
use crate::markdown::{
    extract_embeds, fenced_code, preprocess, substitute_embeds, with_title, MarkdownProcessor,
};
use crate::resolver::DocumentSource;
use crate::vault::{split_extension, title_case, SharedVault, Vault};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Template slot replaced by the rendered fragment
pub const CONTENT_PLACEHOLDER: &str = "$PLACEHOLDER-CONTENT";

/// Template slot replaced by the page title
pub const TITLE_PLACEHOLDER: &str = "$PLACEHOLDER-TITLE";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("File not found in vault: {0}")]
    NotFound(String),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read page template {path:?}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// How a vault file is turned into HTML
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    Markdown,
    Plaintext,
    Codeblock,
    Image,
    Video,
    Audio,
    Literal,
    Iframe,
    Download,
}

impl RenderKind {
    /// Kind named in a `render_overrides` key
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_lowercase().as_str() {
            "markdown" => Self::Markdown,
            "plaintext" => Self::Plaintext,
            "codeblock" => Self::Codeblock,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "literal" => Self::Literal,
            "iframe" | "pdf" => Self::Iframe,
            "download" => Self::Download,
            _ => return None,
        })
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Some(match ext.to_lowercase().as_str() {
            "md" => Self::Markdown,
            "html" | "htm" | "xhtml" | "pdf" => Self::Iframe,
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "ico" | "apng" => {
                Self::Image
            }
            "mp4" | "webm" | "mov" | "av1" => Self::Video,
            "mp3" | "wav" | "ogg" | "oga" | "m4a" | "flac" => Self::Audio,
            "txt" => Self::Plaintext,
            _ => return None,
        })
    }

    /// Binary content becomes a download card, anything else a code block
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.contains(&0) || std::str::from_utf8(bytes).is_err() {
            Self::Download
        } else {
            Self::Codeblock
        }
    }
}

/// MIME type by file extension, for `<source type>` and download cards
pub fn content_type(ext: &str) -> Option<&'static str> {
    Some(match ext.to_lowercase().as_str() {
        "md" => "text/markdown",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "apng" => "image/apng",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "av1" => "video/av1",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        _ => return None,
    })
}

/// Human readable size: three significant digits below 100, whole numbers above
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if value < 10.0 {
        format!("{:.2} {}", value, UNITS[unit])
    } else if value < 100.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{} {}", value.round(), UNITS[unit])
    }
}

/// URL under which the raw bytes of a vault file are served
pub fn raw_url(path: &str) -> String {
    format!("/!/{}", path.trim_start_matches('/'))
}

/// Renders vault files, memoizing results in a bounded cache.
///
/// Markdown documents have their embeds rendered concurrently and spliced
/// back in; nesting stops at `max_embed_depth`.
pub struct Renderer {
    config: Config,
    vault: Arc<SharedVault>,
    cache: RenderCache<String>,
    fetcher: Fetcher,
    processor: MarkdownProcessor,
    overrides: Vec<(RenderKind, String)>,
}

impl Renderer {
    pub fn new(config: Config, vault: Arc<SharedVault>) -> Result<Self, RenderError> {
        let fetcher = Fetcher::new(config.fetch.timeout())?;
        let cache = RenderCache::new(config.render_budget_bytes());

        let mut overrides = Vec::new();
        for (name, patterns) in &config.render_overrides {
            match RenderKind::from_name(name) {
                Some(kind) => overrides.extend(patterns.iter().map(|p| (kind, p.clone()))),
                None => tracing::warn!(kind = %name, "Unknown render override kind"),
            }
        }

        Ok(Self {
            config,
            vault,
            cache,
            fetcher,
            processor: MarkdownProcessor::new(),
            overrides,
        })
    }

    /// Index the configured content directory and build a renderer over it
    pub fn from_config(config: Config) -> Result<Self, RenderError> {
        let vault = Vault::build(config.content_dir());
        Self::new(config, Arc::new(SharedVault::new(vault)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shared_vault(&self) -> &Arc<SharedVault> {
        &self.vault
    }

    /// Current vault snapshot
    pub fn vault(&self) -> Arc<Vault> {
        self.vault.snapshot()
    }

    pub fn cache(&self) -> &RenderCache<String> {
        &self.cache
    }

    pub(crate) fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Kind from `render_overrides` (last matching pattern wins), then from
    /// the extension. `None` means the content decides.
    pub fn kind_for(&self, path: &str) -> Option<RenderKind> {
        let path = path.trim_start_matches('/');
        let overridden = self
            .overrides
            .iter()
            .rev()
            .find(|(_, pattern)| glob_match::glob_match(pattern, path))
            .map(|(kind, _)| *kind);

        overridden.or_else(|| {
            let name = path.rsplit('/').next().unwrap_or(path);
            split_extension(name).1.and_then(RenderKind::from_extension)
        })
    }

    /// HTML fragment for a vault file; failures render a "File not found."
    /// paragraph
    pub async fn load_file_to_html(&self, path: &str, is_embed: bool) -> String {
        match self.try_load(path, is_embed, 0).await {
            Ok(html) => html,
            Err(err) => {
                tracing::error!(file = path, "Error rendering file: {}", err);
                "<p>File not found.</p>".to_string()
            }
        }
    }

    /// Cached render of `path` at embed nesting `depth`
    pub(crate) fn try_load<'a>(
        &'a self,
        path: &'a str,
        is_embed: bool,
        depth: usize,
    ) -> BoxFuture<'a, Result<String, RenderError>> {
        async move {
            let path = path.trim_start_matches('/');
            let remaining = self.config.max_embed_depth.saturating_sub(depth);
            let key = cache_key([path.to_string(), is_embed.to_string(), remaining.to_string()]);

            self.cache
                .try_get_or_insert_with(key, move || self.render_file(path, is_embed, depth))
                .await
        }
        .boxed()
    }

    async fn render_file(
        &self,
        path: &str,
        is_embed: bool,
        depth: usize,
    ) -> Result<String, RenderError> {
        let vault = self.vault();
        if !vault.contains_file(path) {
            return Err(RenderError::NotFound(path.to_string()));
        }

        let absolute = vault.absolute(path);
        let bytes = tokio::fs::read(&absolute)
            .await
            .map_err(|source| RenderError::Io {
                path: absolute.clone(),
                source,
            })?;

        let kind = self.kind_for(path).unwrap_or_else(|| RenderKind::sniff(&bytes));
        let name = path.rsplit('/').next().unwrap_or(path);
        let ext = split_extension(name).1.unwrap_or_default();
        let src = escape_html(&raw_url(path));
        let label = escape_html(name);
        let text = || String::from_utf8_lossy(&bytes).into_owned();

        let html = match kind {
            RenderKind::Markdown => {
                let title = (!is_embed).then(|| title_case(name));
                let source = DocumentSource::vault(path);
                self.render_markdown_at(&text(), &source, title.as_deref(), depth)
                    .await
            }
            RenderKind::Codeblock => {
                let lang = if ext.is_empty() { "plaintext" } else { ext };
                let code = fenced_code(lang, text().trim_end());
                self.render_markdown_at(&code, &DocumentSource::vault(path), None, depth)
                    .await
            }
            RenderKind::Plaintext => format!(
                "<pre class=\"whitespace-pre-wrap break-words\">{}</pre>",
                escape_html(text().trim_end())
            ),
            RenderKind::Literal => text(),
            RenderKind::Image => format!(
                "<div class=\"image-container\"><img src=\"{src}\" alt=\"{label}\" class=\"lightbox-image\"/></div>"
            ),
            RenderKind::Video => format!(
                "<video controls><source src=\"{src}\" type=\"{}\"></video>",
                content_type(ext).unwrap_or("video/mp4")
            ),
            RenderKind::Audio => format!(
                "<audio controls><source src=\"{src}\" type=\"{}\"></audio>",
                content_type(ext).unwrap_or("audio/mpeg")
            ),
            RenderKind::Iframe => format!(
                "<iframe src=\"{src}\" class=\"w-full h-full border-none\" title=\"Embedded content for {label}\"></iframe>"
            ),
            RenderKind::Download => format!(
                "<div class=\"download-card\"><h2>{label}</h2><p>Media type: <i>{}</i></p><p>File size: <strong>{}</strong></p><a href=\"{src}\" download=\"{label}\" class=\"download-button\">Download File</a></div>",
                content_type(ext).unwrap_or("unknown"),
                format_bytes(bytes.len() as u64)
            ),
        };

        tracing::debug!(file = path, ?kind, depth, "Rendered file");
        Ok(html)
    }

    /// Render a markdown document of the vault as a top-level page
    pub fn render_markdown<'a>(
        &'a self,
        markdown: &'a str,
        source: &'a DocumentSource,
        title: Option<&'a str>,
    ) -> BoxFuture<'a, String> {
        self.render_markdown_at(markdown, source, title, 0)
    }

    /// Render markdown found at embed nesting `depth`.
    ///
    /// `title` is prepended as a level-1 heading unless the document has one.
    /// Embeds are rendered concurrently while `depth < max_embed_depth`;
    /// deeper ones stay literal.
    pub fn render_markdown_at<'a>(
        &'a self,
        markdown: &'a str,
        source: &'a DocumentSource,
        title: Option<&'a str>,
        depth: usize,
    ) -> BoxFuture<'a, String> {
        async move {
            let log_warnings = self.config.log_warnings;
            let mut text = preprocess(markdown);

            if let Some(title) = title {
                if self.processor.count_top_headings(&text) > 1 {
                    warn_if!(log_warnings, file = %source, "Multiple top-level headers found");
                }
                text = with_title(&text, title);
            }

            let (text, embeds) = if depth < self.config.max_embed_depth {
                let extracted = extract_embeds(&text, self.processor.options());
                (extracted.markdown, extracted.embeds)
            } else {
                (text, Vec::new())
            };

            let fragments = join_all(
                embeds
                    .iter()
                    .map(|token| process_embed(self, token, source, depth)),
            )
            .await;

            let vault = self.vault();
            let html = self.processor.convert(&text, &vault, source, log_warnings);
            substitute_embeds(&html, &fragments)
        }
        .boxed()
    }

    /// Full HTML page for a vault file, using the configured template when
    /// there is one
    pub async fn render_page(&self, path: &str) -> Result<String, RenderError> {
        let content = self.load_file_to_html(path, false).await;
        let name = path.rsplit('/').next().unwrap_or(path);
        let title = title_case(name);

        let template = match self.config.template_path() {
            Some(template_path) => tokio::fs::read_to_string(&template_path)
                .await
                .map(Some)
                .map_err(|source| RenderError::Template {
                    path: template_path,
                    source,
                })?,
            None => None,
        };

        Ok(apply_template(template.as_deref(), &title, &self.config.site, &content))
    }
}

/// Fill the page template slots, or lay out a minimal page
pub fn apply_template(
    template: Option<&str>,
    title: &str,
    site: &SiteConfig,
    content: &str,
) -> String {
    match template {
        Some(template) => template
            .replace(TITLE_PLACEHOLDER, &escape_html(title))
            .replace(CONTENT_PLACEHOLDER, content),
        None => format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<meta name=\"description\" content=\"{}\">\n<title>{} | {}</title>\n</head>\n<body>\n<main>\n{}\n</main>\n</body>\n</html>\n",
            escape_html(&site.description),
            escape_html(title),
            escape_html(&site.title),
            content
        ),
    }
}
