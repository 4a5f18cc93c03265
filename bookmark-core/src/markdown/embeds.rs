//! Source-level extraction of `![[...]]` / `![...](...)` embeds.
//!
//! Embeds are swapped for HTML-comment placeholders before the markdown
//! parse; their rendered fragments are substituted back afterwards.

use super::links::parse_link_at;
use crate::resolver::LinkToken;
use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag};
use regex::{Captures, Regex};
use std::ops::Range;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!-- EMBED_(\d+) -->").unwrap());

pub fn placeholder(index: usize) -> String {
    format!("<!-- EMBED_{index} -->")
}

/// Markdown with embeds replaced, plus the embeds in placeholder order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedEmbeds {
    pub markdown: String,
    pub embeds: Vec<LinkToken>,
}

/// Replace every embed outside code spans and code blocks with a placeholder
pub fn extract_embeds(markdown: &str, options: Options) -> ExtractedEmbeds {
    let code = code_ranges(markdown, options);
    let mut out = String::with_capacity(markdown.len());
    let mut embeds = Vec::new();
    let mut cursor = 0;
    let mut search = 0;

    while let Some(offset) = markdown[search..].find("![") {
        let at = search + offset;
        search = at + 1;

        if markdown[..at].ends_with('\\') {
            continue;
        }
        if let Some(block) = code.iter().find(|r| r.contains(&at)) {
            search = block.end.max(search);
            continue;
        }

        let Some((token, end)) = parse_link_at(markdown, at + 1) else {
            continue;
        };
        let token = LinkToken {
            raw: markdown[at..end].to_string(),
            ..token.into_embed()
        };

        out.push_str(&markdown[cursor..at]);
        out.push_str(&placeholder(embeds.len()));
        embeds.push(token);
        cursor = end;
        search = end;
    }

    out.push_str(&markdown[cursor..]);
    ExtractedEmbeds {
        markdown: out,
        embeds,
    }
}

/// Byte ranges of inline code and code blocks
fn code_ranges(markdown: &str, options: Options) -> Vec<Range<usize>> {
    Parser::new_ext(markdown, options)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Code(_) | Event::Start(Tag::CodeBlock(_)) => Some(range),
            _ => None,
        })
        .collect()
}

/// Swap placeholders for rendered fragments in a single pass, so fragment
/// text is never rescanned
pub fn substitute_embeds(html: &str, fragments: &[String]) -> String {
    PLACEHOLDER
        .replace_all(html, |caps: &Captures<'_>| {
            caps.get(1)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .and_then(|i| fragments.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::LinkSyntax;

    fn extract(md: &str) -> ExtractedEmbeds {
        extract_embeds(md, Options::empty())
    }

    #[test]
    fn test_wikilink_and_bracket_embeds() {
        let found = extract("a ![[chart.png|300x200]] b ![alt](pic.jpg) c");
        assert_eq!(found.markdown, "a <!-- EMBED_0 --> b <!-- EMBED_1 --> c");
        assert_eq!(found.embeds.len(), 2);

        assert!(found.embeds[0].embed);
        assert_eq!(found.embeds[0].raw, "![[chart.png|300x200]]");
        assert_eq!(found.embeds[0].target(), "chart.png");
        assert_eq!(
            found.embeds[1].syntax,
            LinkSyntax::Bracket {
                text: "alt".into(),
                target: Some("pic.jpg".into())
            }
        );
    }

    #[test]
    fn test_code_is_left_alone() {
        let md = "`![[inline]]`\n\n```\n![[fenced]]\n```\n\n![[real]]";
        let found = extract(md);
        assert_eq!(found.embeds.len(), 1);
        assert_eq!(found.embeds[0].target(), "real");
        assert!(found.markdown.contains("`![[inline]]`"));
        assert!(found.markdown.contains("![[fenced]]"));
    }

    #[test]
    fn test_escaped_and_malformed() {
        let found = extract("\\![[no]] ![[ ok ]] ![not closed");
        assert_eq!(found.embeds.len(), 1);
        assert_eq!(found.embeds[0].target(), "ok");
        assert!(found.markdown.starts_with("\\![[no]] <!-- EMBED_0 -->"));
    }

    #[test]
    fn test_substitute_single_pass() {
        let html = "<p><!-- EMBED_0 --></p>\n<!-- EMBED_1 -->\n<!-- EMBED_7 -->";
        let fragments = vec!["<!-- EMBED_1 -->".to_string(), "<b>x</b>".to_string()];
        assert_eq!(
            substitute_embeds(html, &fragments),
            "<p><!-- EMBED_1 --></p>\n<b>x</b>\n<!-- EMBED_7 -->"
        );
    }
}
