//! Code syntax highlighting using syntect.

use crate::html::{escape_html, is_blank_line};
use crate::resolver::DocumentSource;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use std::sync::OnceLock;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Languages rendered without highlighting and without a warning
const PLAIN_LANGUAGES: &[&str] = &["", "plaintext", "plain", "text", "txt"];

/// Transformer for syntax highlighting fenced code blocks.
///
/// Output keeps the `<pre><code class="language-x">` shape so later fragment
/// surgery (line ranges, numbering) can find the block.
pub struct HighlightTransformer<'a> {
    source: &'a DocumentSource,
    log_warnings: bool,
}

impl<'a> HighlightTransformer<'a> {
    pub fn new(source: &'a DocumentSource, log_warnings: bool) -> Self {
        Self {
            source,
            log_warnings,
        }
    }

    pub fn transform(&self, events: Vec<Event<'static>>) -> Vec<Event<'static>> {
        let mut result = Vec::with_capacity(events.len());
        let mut code_lang: Option<String> = None;
        let mut code_content = String::new();

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                    code_lang = Some(lang.split_whitespace().next().unwrap_or_default().to_string());
                    code_content.clear();
                }
                Event::Text(text) if code_lang.is_some() => {
                    code_content.push_str(&text);
                }
                Event::End(TagEnd::CodeBlock) if code_lang.is_some() => {
                    let lang = code_lang.take().unwrap_or_default();
                    let highlighted = self.highlight_code(&code_content, &lang);
                    result.push(Event::Html(CowStr::Boxed(highlighted.into_boxed_str())));
                }
                other => result.push(other),
            }
        }

        result
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let class = if lang.is_empty() { "plaintext" } else { lang };
        let body = match self.find_syntax(lang) {
            Some(syntax) => highlight_classed(code, syntax)
                .map(|html| trim_blank_tail(&balance_lines(&html)))
                .unwrap_or_else(|| escape_html(code)),
            None => escape_html(code),
        };
        format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            escape_html(class),
            body.trim_end_matches('\n')
        )
    }

    fn find_syntax(&self, lang: &str) -> Option<&'static SyntaxReference> {
        if PLAIN_LANGUAGES.contains(&lang.to_lowercase().as_str()) {
            return None;
        }
        let ss = syntax_set();
        let found = ss
            .find_syntax_by_token(lang)
            .or_else(|| ss.find_syntax_by_extension(lang));
        if found.is_none() {
            warn_if!(
                self.log_warnings,
                language = lang,
                file = %self.source,
                "Codeblock with invalid language"
            );
        }
        found
    }
}

fn highlight_classed(code: &str, syntax: &SyntaxReference) -> Option<String> {
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set(), ClassStyle::Spaced);
    for line in LinesWithEndings::from(code) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .ok()?;
    }
    Some(generator.finalize())
}

/// Close open spans at every line end and reopen them on the next line, so
/// each output line is well-formed by itself
fn balance_lines(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut open: Vec<&str> = Vec::new();
    let mut rest = html;

    while let Some(idx) = rest.find(['<', '\n']) {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        if let Some(after) = rest.strip_prefix('\n') {
            open.iter().for_each(|_| out.push_str("</span>"));
            out.push('\n');
            open.iter().for_each(|tag| out.push_str(tag));
            rest = after;
        } else {
            let end = rest.find('>').map_or(rest.len(), |i| i + 1);
            let tag = &rest[..end];
            if tag.starts_with("</") {
                open.pop();
            } else if tag.starts_with("<span") {
                open.push(tag);
            }
            out.push_str(tag);
            rest = &rest[end..];
        }
    }

    out.push_str(rest);
    out
}

fn trim_blank_tail(html: &str) -> String {
    let mut lines: Vec<&str> = html.split('\n').collect();
    while lines.len() > 1 && lines.last().is_some_and(|l| is_blank_line(l)) {
        lines.pop();
    }
    lines.join("\n")
}
