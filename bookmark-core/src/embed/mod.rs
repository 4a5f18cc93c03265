//! Embed content processing: resolve an `![[...]]` reference, load or fetch
//! its content and shape it into an `<md-embed>` fragment.
//!
//! Every failure degrades to a visible error fragment plus a warning; an
//! embed never fails the surrounding render.

pub mod properties;
pub mod remote;

pub use properties::EmbedProperties;
pub use remote::{RemoteKind, VideoHost};

use crate::html::{
    add_line_numbers, append_to_src, escape_html, extract_header_section, extract_line_range,
    parse_start_tag, split_wrappers, StartTag,
};
use crate::render::Renderer;
use crate::resolver::{DocumentSource, LinkResolver, LinkSyntax, LinkToken, ResolvedTarget};

/// Per-embed state shared by the local and remote paths
pub(crate) struct EmbedContext<'a> {
    pub source: &'a DocumentSource,
    pub token: &'a LinkToken,
    pub display: String,
    pub log_warnings: bool,
    /// Depth at which the embedded content itself is rendered
    pub depth: usize,
}

impl EmbedContext<'_> {
    /// Explicit title property wins (an empty one suppresses the title);
    /// otherwise the display text
    pub fn title(&self, props: &EmbedProperties) -> String {
        props
            .explicit_title()
            .map(str::to_string)
            .unwrap_or_else(|| self.display.clone())
    }
}

/// Text shown as an embed's title when no explicit title is given.
///
/// Wikilinks use their target, bracket embeds their bracket text; URL-like
/// text is humanized from its final path segment.
pub fn embed_display_text(token: &LinkToken) -> String {
    let text = match &token.syntax {
        LinkSyntax::Bracket {
            text,
            target: Some(_),
        } if !text.trim().is_empty() => text.trim().to_string(),
        _ => token.target().to_string(),
    };

    if text.is_empty() {
        "Embedded Content".to_string()
    } else if text.contains("://") {
        remote::title_from_url(&text)
    } else {
        text
    }
}

/// Render one embed token found in `source`; `depth` is the depth of the
/// document containing it
pub(crate) async fn process_embed(
    renderer: &Renderer,
    token: &LinkToken,
    source: &DocumentSource,
    depth: usize,
) -> String {
    let log_warnings = renderer.config().log_warnings;
    let ctx = EmbedContext {
        source,
        token,
        display: embed_display_text(token),
        log_warnings,
        depth: depth + 1,
    };

    if token.target().is_empty() {
        warn_if!(log_warnings, embed = %token, file = %source, "Missing or malformed embed");
        return broken_fragment(token);
    }

    let props = EmbedProperties::parse(token.source());
    let vault = renderer.vault();
    let resolved = LinkResolver::new(&vault, source).resolve(token);

    match resolved {
        ResolvedTarget::Remote(url) => remote::render_remote(renderer, &ctx, &url, props).await,
        ResolvedTarget::Local(path) => render_local(renderer, &ctx, &path, props).await,
        ResolvedTarget::Broken => {
            warn_if!(log_warnings, embed = %token, file = %source, "Missing or malformed embed");
            broken_fragment(token)
        }
    }
}

async fn render_local(
    renderer: &Renderer,
    ctx: &EmbedContext<'_>,
    path: &str,
    props: EmbedProperties,
) -> String {
    match renderer.try_load(path, true, ctx.depth).await {
        Ok(html) => {
            let html = html.trim();
            let content = if split_wrappers(html).is_wrapped() {
                html.to_string()
            } else {
                format!("<div class=\"embed-wrapper\">{html}</div>")
            };
            assemble(ctx, content, props)
        }
        Err(err) => {
            warn_if!(ctx.log_warnings, embed = %ctx.token, file = %ctx.source, "Error loading embed: {}", err);
            format!(
                "<md-embed role=\"group\" aria-label=\"Error embedding content: {}\" title=\"Error\"><p>Error: {}</p></md-embed>",
                escape_html(ctx.token.source()),
                escape_html(&err.to_string())
            )
        }
    }
}

/// Apply page, numbering, header and line selections, then wrap the result
/// in the sized and titled container
pub(crate) fn assemble(ctx: &EmbedContext<'_>, content: String, props: EmbedProperties) -> String {
    let mut content = content.trim().to_string();
    if content.is_empty() {
        warn_if!(ctx.log_warnings, embed = %ctx.token, file = %ctx.source, "No content found in embed");
        return broken_fragment(ctx.token);
    }

    if let Some(fragment) = props.page_fragment() {
        match with_pdf_pages(&content, &fragment) {
            Some(paged) => content = paged,
            None => warn_if!(
                ctx.log_warnings,
                embed = %ctx.token,
                file = %ctx.source,
                "Cannot specify pages for non-PDF embed"
            ),
        }
    }

    if props.numbered {
        content = add_line_numbers(&content);
    }

    if let Some(start) = props.start_header.as_deref() {
        let wrappers = split_wrappers(&content);
        match extract_header_section(&wrappers.inner, start, props.end_header.as_deref()) {
            Some(section) => content = wrappers.rewrap(&section),
            None => warn_if!(
                ctx.log_warnings,
                header = start,
                embed = %ctx.token,
                file = %ctx.source,
                "Header not found in embed"
            ),
        }
    }

    if props.has_line_range() {
        content = extract_line_range(&content, props.first_line, props.last_line);
    }

    wrap_embed(&content, &ctx.title(&props), &props.style())
}

/// The outer `<md-embed>` container
pub fn wrap_embed(content: &str, title: &str, style: &str) -> String {
    format!(
        "<md-embed role=\"group\" style=\"{}\" title=\"{}\">{}</md-embed>",
        escape_html(style),
        escape_html(title),
        content
    )
}

/// Append `#page=..` to the PDF iframe that is the fragment's outer element,
/// looking through one wrapping `<div>`
fn with_pdf_pages(content: &str, fragment: &str) -> Option<String> {
    let tag = parse_start_tag(content)?;
    if is_pdf_iframe(&tag) {
        return Some(append_to_src(content, fragment));
    }
    if !tag.is("div") {
        return None;
    }

    let rest = &content[tag.len..];
    let offset = tag.len + (rest.len() - rest.trim_start().len());
    let inner = parse_start_tag(&content[offset..])?;
    is_pdf_iframe(&inner)
        .then(|| format!("{}{}", &content[..offset], append_to_src(&content[offset..], fragment)))
}

fn is_pdf_iframe(tag: &StartTag<'_>) -> bool {
    tag.is("iframe")
        && tag
            .src()
            .is_some_and(|src| src.to_lowercase().ends_with(".pdf"))
}

/// Placeholder for an embed that names nothing resolvable
pub fn broken_fragment(token: &LinkToken) -> String {
    format!(
        "<md-embed role=\"group\" class=\"broken-embed\" title=\"Error: Missing or malformed embed\">{}</md-embed>",
        escape_html(&token.raw)
    )
}

/// Placeholder for a remote embed that could not be loaded
pub fn error_fragment(url: &str) -> String {
    wrap_embed(&escape_html(url), "Error Loading Content", "")
}
