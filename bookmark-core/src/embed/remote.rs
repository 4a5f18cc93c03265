//! Remote embeds: video providers and content-type classification.

use super::{assemble, error_fragment, EmbedContext};
use crate::embed::properties::EmbedProperties;
use crate::fetch::Probe;
use crate::html::escape_html;
use crate::markdown::fenced_code;
use crate::render::Renderer;
use crate::resolver::DocumentSource;
use crate::vault::title_case;
use url::Url;

/// A page on a video platform that offers an embeddable player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoHost {
    YouTube(String),
    Vimeo(String),
}

impl VideoHost {
    /// Recognize YouTube (`youtu.be/<id>`, `watch?v=<id>`, `/embed/<id>`,
    /// `/shorts/<id>`) and Vimeo (final path segment) links
    pub fn detect(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_lowercase();

        if host.contains("youtu.be") {
            let id = url.path_segments()?.find(|s| !s.is_empty())?;
            return Some(Self::YouTube(id.to_string()));
        }

        if host.contains("youtube.com") {
            if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
                return Some(Self::YouTube(v.into_owned()));
            }
            let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
            return match (segments.next(), segments.next()) {
                (Some("embed" | "shorts" | "live"), Some(id)) => Some(Self::YouTube(id.to_string())),
                _ => None,
            };
        }

        if host.contains("vimeo.com") {
            let id = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
            return Some(Self::Vimeo(id.to_string()));
        }

        None
    }

    pub fn embed_src(&self) -> String {
        match self {
            Self::YouTube(id) => format!("https://www.youtube.com/embed/{id}"),
            Self::Vimeo(id) => format!("https://player.vimeo.com/video/{id}"),
        }
    }

    pub fn iframe(&self, title: &str) -> String {
        format!(
            "<iframe title=\"{}\" src=\"{}\" frameborder=\"0\" style=\"padding:0px\" allowfullscreen></iframe>",
            escape_html(title),
            escape_html(&self.embed_src())
        )
    }
}

/// How a remote resource is presented, decided from its MIME type and
/// URL extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    Image,
    Video,
    Audio,
    Pdf,
    Markdown,
    PlainText,
    Html,
    Code,
}

impl RemoteKind {
    pub fn classify(probe: &Probe, extension: Option<&str>) -> Self {
        let major = probe.major_type();
        let mime = probe.mime.as_str();
        let ext = extension.map(str::to_lowercase);
        let ext = ext.as_deref();

        match (major, mime) {
            ("image", _) => Self::Image,
            ("video", _) => Self::Video,
            ("audio", _) => Self::Audio,
            (_, "application/pdf") => Self::Pdf,
            (_, "text/markdown" | "text/x-markdown") => Self::Markdown,
            _ if matches!(ext, Some("md" | "markdown")) => Self::Markdown,
            (_, "text/plain") if matches!(ext, None | Some("txt")) => Self::PlainText,
            (_, "text/html") => Self::Html,
            _ => Self::Code,
        }
    }
}

/// Extension of the URL's final path segment
pub fn url_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.last()?;
    match last.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < last.len() => Some(last[idx + 1..].to_string()),
        _ => None,
    }
}

/// Human title from a URL's final path segment: `.../my_chart-v2.png` -> `My Chart V2`
pub fn title_from_url(link: &str) -> String {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    let decoded = percent_encoding::percent_decode_str(last).decode_utf8_lossy();
    let stem = decoded.split('.').next().unwrap_or_default();
    title_case(stem)
}

pub(crate) async fn render_remote(
    renderer: &Renderer,
    ctx: &EmbedContext<'_>,
    link: &str,
    props: EmbedProperties,
) -> String {
    let Ok(url) = Url::parse(link) else {
        warn_if!(ctx.log_warnings, url = link, file = %ctx.source, "Invalid embed URL");
        return error_fragment(link);
    };

    if let Some(video) = VideoHost::detect(&url) {
        let title = ctx.title(&props);
        return assemble(ctx, video.iframe(&title), props);
    }

    let probe = match renderer.fetcher().probe(link).await {
        Ok(probe) => probe,
        Err(err) => {
            warn_if!(ctx.log_warnings, url = link, file = %ctx.source, "Error processing embed: {}", err);
            return error_fragment(link);
        }
    };

    let ext = url_extension(&url);
    let title = escape_html(&ctx.title(&props));
    let src = escape_html(link);
    let mime = escape_html(&probe.mime);

    let content = match RemoteKind::classify(&probe, ext.as_deref()) {
        RemoteKind::Image => format!(
            "<img src=\"{src}\" alt=\"{title}\" style=\"padding:0px\" class=\"lightbox-image\"/>"
        ),
        RemoteKind::Video => format!(
            "<video controls title=\"{title}\" style=\"padding:0px\"><source src=\"{src}\" type=\"{mime}\"></video>"
        ),
        RemoteKind::Audio => format!(
            "<audio controls title=\"{title}\" style=\"padding:0px\"><source src=\"{src}\" type=\"{mime}\"></audio>"
        ),
        RemoteKind::Pdf => format!(
            "<iframe title=\"{title}\" src=\"{src}\" type=\"application/pdf\" style=\"padding:0px\"></iframe>"
        ),
        RemoteKind::Html => format!(
            "<iframe title=\"{title}\" src=\"{src}\" frameborder=\"0\" style=\"padding:0px\"></iframe>"
        ),
        kind => match fetch_and_render(renderer, ctx, &url, kind, ext.as_deref()).await {
            Some(content) => content,
            None => return error_fragment(link),
        },
    };

    assemble(ctx, content, props)
}

/// Kinds that need the body: markdown, plain text and code
async fn fetch_and_render(
    renderer: &Renderer,
    ctx: &EmbedContext<'_>,
    url: &Url,
    kind: RemoteKind,
    ext: Option<&str>,
) -> Option<String> {
    let body = match renderer.fetcher().fetch_text(url.as_str()).await {
        Ok(body) => body,
        Err(err) => {
            warn_if!(ctx.log_warnings, url = %url, file = %ctx.source, "Error loading embed content: {}", err);
            return None;
        }
    };

    let source = DocumentSource::Remote(url.clone());
    Some(match kind {
        RemoteKind::Markdown => {
            let title = title_from_url(url.as_str());
            let rendered = renderer
                .render_markdown_at(&body, &source, Some(&title), ctx.depth)
                .await;
            format!("<div class=\"embed-wrapper\">{rendered}</div>")
        }
        RemoteKind::PlainText => format!(
            "<pre class=\"whitespace-pre-wrap break-words\">{}</pre>",
            escape_html(body.trim_end())
        ),
        _ => {
            let code = fenced_code(ext.unwrap_or("plaintext"), body.trim_end());
            renderer.render_markdown_at(&code, &source, None, ctx.depth).await
        }
    })
}
