//! Link transformation for `[[term]]`, `[text]` and `[text](target)`.

use crate::html::escape_html;
use crate::resolver::{LinkResolver, LinkToken, ResolvedTarget};
use pulldown_cmark::{CowStr, Event, LinkType, Tag, TagEnd};
use std::ops::Range;

/// Parse one bracket construct starting at byte `at`, which must hold `[`.
///
/// Recognizes `[[term]]`, then `[text]` optionally followed by `(target)`.
/// Footnote references (`[^...]`) and empty terms are rejected. Returns the
/// token and the byte offset just past it.
pub(crate) fn parse_link_at(text: &str, at: usize) -> Option<(LinkToken, usize)> {
    let rest = text.get(at..)?;

    if let Some(inner) = rest.strip_prefix("[[") {
        if let Some(close) = inner.find(']') {
            if close > 0 && inner[close..].starts_with("]]") {
                let end = at + close + 4;
                return Some((LinkToken::wikilink(&text[at..end], &inner[..close]), end));
            }
        }
    }

    let inner = rest.strip_prefix('[')?;
    if inner.starts_with('^') {
        return None;
    }
    let close = inner.find(']')?;
    let label = &inner[..close];
    if label.trim().is_empty() {
        return None;
    }

    let mut end = at + close + 2;
    let target = text[end..].strip_prefix('(').and_then(|after| {
        let close = after.find(')')?;
        (close > 0).then(|| &after[..close])
    });
    if let Some(target) = target {
        end += target.len() + 2;
    }

    Some((LinkToken::bracket(&text[at..end], label, target), end))
}

/// Replaces bracket references in text with resolved anchors
pub struct LinkTransformer<'a> {
    resolver: LinkResolver<'a>,
    log_warnings: bool,
}

impl<'a> LinkTransformer<'a> {
    pub fn new(resolver: LinkResolver<'a>, log_warnings: bool) -> Self {
        Self {
            resolver,
            log_warnings,
        }
    }

    /// Transform events produced by an offset iterator over `source`.
    ///
    /// Consecutive text events are merged before scanning; text inside code
    /// blocks, images and existing links is left alone. Inline
    /// `[text](target)` links parsed by the markdown engine are re-resolved.
    pub fn transform<'e>(
        &self,
        events: Vec<(Event<'e>, Range<usize>)>,
        source: &str,
    ) -> Vec<Event<'static>> {
        let mut result = Vec::with_capacity(events.len());
        let mut events = events.into_iter().peekable();
        let mut in_code_block = false;
        let mut image_depth = 0usize;

        while let Some((event, range)) = events.next() {
            match event {
                Event::Start(Tag::CodeBlock(_)) => {
                    in_code_block = true;
                    result.push(event.into_static());
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    result.push(event.into_static());
                }
                Event::Start(Tag::Image { .. }) => {
                    image_depth += 1;
                    result.push(event.into_static());
                }
                Event::End(TagEnd::Image) => {
                    image_depth = image_depth.saturating_sub(1);
                    result.push(event.into_static());
                }
                Event::Start(Tag::Link {
                    link_type: LinkType::Inline,
                    dest_url,
                    ..
                }) if image_depth == 0 && !in_code_block && !is_passthrough(&dest_url) => {
                    let mut inner = Vec::new();
                    for (event, _) in events.by_ref() {
                        if matches!(event, Event::End(TagEnd::Link)) {
                            break;
                        }
                        inner.push(event.into_static());
                    }
                    let label = plain_text(&inner);
                    let raw = source.get(range).unwrap_or_default();
                    let token = LinkToken::bracket(raw, &label, Some(&*dest_url));

                    let resolved = self.resolve(&token);
                    result.push(Event::InlineHtml(CowStr::Boxed(
                        open_tag(&token, &resolved).into_boxed_str(),
                    )));
                    if inner.is_empty() {
                        result.push(Event::Text(CowStr::Boxed(
                            token.display_text().into_boxed_str(),
                        )));
                    }
                    result.extend(inner);
                    result.push(Event::InlineHtml(CowStr::Borrowed("</a>")));
                }
                Event::Start(Tag::Link { .. }) => {
                    // Default links keep their children verbatim
                    result.push(event.into_static());
                    for (event, _) in events.by_ref() {
                        let done = matches!(event, Event::End(TagEnd::Link));
                        result.push(event.into_static());
                        if done {
                            break;
                        }
                    }
                }
                Event::Text(text) if !in_code_block && image_depth == 0 => {
                    let mut merged = text.to_string();
                    let mut escaped = Vec::new();
                    if is_escaped(source, &range) {
                        escaped.push(0);
                    }

                    while let Some((Event::Text(next), next_range)) = events.peek() {
                        if is_escaped(source, next_range) {
                            escaped.push(merged.len());
                        }
                        merged.push_str(next);
                        events.next();
                    }

                    if merged.contains('[') {
                        result.extend(self.process_text(&merged, &escaped));
                    } else {
                        result.push(Event::Text(CowStr::Boxed(merged.into_boxed_str())));
                    }
                }
                other => result.push(other.into_static()),
            }
        }

        result
    }

    fn process_text(&self, text: &str, escaped: &[usize]) -> Vec<Event<'static>> {
        let mut events = Vec::new();
        let mut cursor = 0;
        let mut search = 0;

        while let Some(offset) = text[search..].find('[') {
            let at = search + offset;

            if text[..at].ends_with('!') || escaped.contains(&at) {
                // Skip the whole opener so `![[x]]` does not yield `[x]`
                search = if text[at + 1..].starts_with('[') {
                    at + 2
                } else {
                    at + 1
                };
                continue;
            }

            match parse_link_at(text, at) {
                Some((token, end)) => {
                    if at > cursor {
                        events.push(Event::Text(CowStr::Boxed(
                            text[cursor..at].to_string().into_boxed_str(),
                        )));
                    }
                    events.push(Event::InlineHtml(CowStr::Boxed(
                        self.render(&token).into_boxed_str(),
                    )));
                    cursor = end;
                    search = end;
                }
                None => search = at + 1,
            }
        }

        if cursor < text.len() {
            events.push(Event::Text(CowStr::Boxed(
                text[cursor..].to_string().into_boxed_str(),
            )));
        }

        events
    }

    fn resolve(&self, token: &LinkToken) -> ResolvedTarget {
        let resolved = self.resolver.resolve(token);
        if resolved == ResolvedTarget::Broken {
            warn_if!(
                self.log_warnings,
                link = %token,
                file = %self.resolver.source(),
                "Missing or malformed link"
            );
        }
        resolved
    }

    /// Resolve and render a complete anchor for `token`
    pub fn render(&self, token: &LinkToken) -> String {
        let resolved = self.resolve(token);
        render_link(token, &resolved)
    }
}

/// Anchor HTML for an already-resolved token
pub fn render_link(token: &LinkToken, resolved: &ResolvedTarget) -> String {
    format!(
        "{}{}</a>",
        open_tag(token, resolved),
        escape_html(&token.display_text())
    )
}

fn open_tag(token: &LinkToken, resolved: &ResolvedTarget) -> String {
    match (resolved, resolved.href(token.anchor())) {
        (ResolvedTarget::Remote(_), Some(href)) => {
            format!("<a href=\"{}\" class=\"link\">\u{1f517} ", escape_html(&href))
        }
        (_, Some(href)) => format!("<a href=\"{}\" class=\"link\">", escape_html(&href)),
        (_, None) => "<a class=\"broken-link\">".to_string(),
    }
}

/// In-page anchors and non-web schemes keep default link rendering
fn is_passthrough(dest: &str) -> bool {
    dest.starts_with('#') || dest.starts_with("mailto:") || dest.starts_with("tel:")
}

/// A text event came from an escaped character when an odd run of
/// backslashes precedes it, or when it starts at an unescaped `\[`
fn is_escaped(source: &str, range: &Range<usize>) -> bool {
    let bytes = source.as_bytes();
    let start = range.start.min(bytes.len());
    let backslashes = bytes[..start].iter().rev().take_while(|b| **b == b'\\').count();

    if bytes[start..].starts_with(b"\\[") {
        return backslashes % 2 == 0;
    }
    backslashes % 2 == 1
}

fn plain_text(events: &[Event<'_>]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Text(t) | Event::Code(t) => Some(t.as_ref()),
            _ => None,
        })
        .collect()
}
