//! Markdown processing pipeline with link, embed and highlight extensions.

pub mod embeds;
pub mod highlight;
pub mod links;

use crate::resolver::{DocumentSource, LinkResolver};
use crate::slug::slugify;
use crate::vault::Vault;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use std::ops::Range;

pub use embeds::{extract_embeds, substitute_embeds, ExtractedEmbeds};
pub use highlight::HighlightTransformer;
pub use links::{render_link, LinkTransformer};

static UNICODE_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\u([0-9a-f]{4})|&#(?:x([0-9a-f]+)|(\d+));").unwrap());

/// Markdown processor with custom extensions
pub struct MarkdownProcessor {
    options: Options,
}

impl MarkdownProcessor {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self { options }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Convert markdown (embeds already swapped for placeholders) to HTML.
    ///
    /// Links resolve against `vault` from `source`; headings get slug ids;
    /// fenced code is highlighted.
    pub fn convert(
        &self,
        markdown: &str,
        vault: &Vault,
        source: &DocumentSource,
        log_warnings: bool,
    ) -> String {
        let events: Vec<(Event<'_>, Range<usize>)> =
            Parser::new_ext(markdown, self.options).into_offset_iter().collect();

        let heading_ids = collect_heading_ids(events.iter().map(|(e, _)| e));

        let link_transformer =
            LinkTransformer::new(LinkResolver::new(vault, source), log_warnings);
        let events = link_transformer.transform(events, markdown);

        let events = attach_heading_ids(events, &heading_ids);

        let highlight_transformer = HighlightTransformer::new(source, log_warnings);
        let events = highlight_transformer.transform(events);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Number of level-1 headings in the document
    pub fn count_top_headings(&self, markdown: &str) -> usize {
        Parser::new_ext(markdown, self.options)
            .filter(|e| {
                matches!(
                    e,
                    Event::Start(Tag::Heading {
                        level: HeadingLevel::H1,
                        ..
                    })
                )
            })
            .count()
    }
}

impl Default for MarkdownProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Text-level rewrites applied before parsing: `\uXXXX` and numeric
/// character references become characters, `<br>` becomes a newline
pub fn preprocess(markdown: &str) -> String {
    let replaced = UNICODE_ESCAPE.replace_all(markdown, |caps: &Captures<'_>| {
        let code = if let Some(hex) = caps.get(1).or_else(|| caps.get(2)) {
            u32::from_str_radix(hex.as_str(), 16).ok()
        } else {
            caps.get(3).and_then(|d| d.as_str().parse::<u32>().ok())
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    replaced.replace("<br>", "\n")
}

/// Prepend `# title` unless the document already opens with a level-1 heading
pub fn with_title(markdown: &str, title: &str) -> String {
    if markdown.starts_with("# ") {
        markdown.to_string()
    } else {
        format!("# {title}\n\n{markdown}")
    }
}

/// Wrap `code` in a fence longer than any backtick run it contains
pub fn fenced_code(lang: &str, code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{lang}\n{code}\n{fence}\n")
}

fn collect_heading_ids<'a, 'e: 'a>(events: impl Iterator<Item = &'a Event<'e>>) -> Vec<String> {
    let mut ids = Vec::new();
    let mut current: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = current.as_mut() {
                    title.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(title) = current.take() {
                    ids.push(slugify(&title));
                }
            }
            _ => {}
        }
    }

    ids
}

fn attach_heading_ids(events: Vec<Event<'static>>, ids: &[String]) -> Vec<Event<'static>> {
    let mut ids = ids.iter();

    events
        .into_iter()
        .map(|event| match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let next = ids.next();
                let id = id.or_else(|| {
                    next.filter(|s| !s.is_empty())
                        .map(|s| CowStr::Boxed(s.clone().into_boxed_str()))
                });
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                })
            }
            other => other,
        })
        .collect()
}
