//! Small surgical operations on rendered HTML fragments.
//!
//! None of these build a DOM. Wrapper peeling walks the string once with a
//! depth counter for same-named tags; section and line selection work on
//! the flat HTML text produced by the markdown processor.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre[^>]*>\s*<code[^>]*>(.*?)</code>\s*</pre>").unwrap());

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").unwrap());

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Result of peeling single outer wrappers off a fragment.
///
/// `open` holds the removed start tags outermost first, `close` the matching
/// end tags innermost first, so `open + inner + close` rebuilds the fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wrappers {
    pub open: String,
    pub inner: String,
    pub close: String,
}

impl Wrappers {
    pub fn is_wrapped(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn rewrap(&self, inner: &str) -> String {
        format!("{}{}{}", self.open, inner, self.close)
    }
}

/// Repeatedly peel an outer tag pair whose end tag is followed only by
/// whitespace. Outer whitespace of the fragment is trimmed; the inner text
/// of each peel is kept verbatim, and whitespace after an inner end tag
/// stays on the close side.
pub fn split_wrappers(html: &str) -> Wrappers {
    let mut rest = html.trim();
    let mut open = String::new();
    let mut close_tags: Vec<&str> = Vec::new();

    while let Some(tag) = parse_start_tag(rest) {
        if tag.self_closing {
            break;
        }
        let Some(close_at) = find_matching_close(rest, tag.name, tag.len) else {
            break;
        };
        let close_len = tag.name.len() + 3;
        if !rest[close_at + close_len..].trim().is_empty() {
            break;
        }

        open.push_str(&rest[..tag.len]);
        close_tags.push(&rest[close_at..]);
        rest = &rest[tag.len..close_at];
    }

    Wrappers {
        open,
        inner: rest.to_string(),
        close: close_tags.iter().rev().copied().collect(),
    }
}

/// A start tag at the beginning of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartTag<'a> {
    pub name: &'a str,
    /// Full text of the tag, `<` through `>`
    pub text: &'a str,
    pub len: usize,
    pub self_closing: bool,
}

impl<'a> StartTag<'a> {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Value of the `src` attribute, if quoted
    pub fn src(&self) -> Option<&'a str> {
        let caps = SRC_ATTR.captures(self.text)?;
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
    }
}

/// Parse `<name ...>` at the very start of `s`
pub fn parse_start_tag(s: &str) -> Option<StartTag<'_>> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    let name_end = 1 + bytes[1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'-')
        .count();
    if name_end == 1 {
        return None;
    }
    match bytes.get(name_end) {
        Some(b'>') | Some(b'/') => {}
        Some(b) if b.is_ascii_whitespace() => {}
        _ => return None,
    }

    let end = find_tag_end(bytes, name_end)?;
    let text = &s[..=end];
    Some(StartTag {
        name: &s[1..name_end],
        text,
        len: end + 1,
        self_closing: text.ends_with("/>"),
    })
}

/// Index of the `>` closing the tag that started before `from`, skipping
/// quoted attribute values
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

/// Byte offset of the `</name>` that balances an already-open `<name>`
fn find_matching_close(s: &str, name: &str, from: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let name_bytes = name.as_bytes();
    let mut depth = 1usize;
    let mut i = from;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        if starts_with_ignore_case(&bytes[i + 1..], b"/")
            && starts_with_ignore_case(&bytes[i + 2..], name_bytes)
            && bytes.get(i + 2 + name_bytes.len()) == Some(&b'>')
        {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += name_bytes.len() + 3;
            continue;
        }

        if starts_with_ignore_case(&bytes[i + 1..], name_bytes) {
            let after = i + 1 + name_bytes.len();
            let boundary = matches!(bytes.get(after), Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/');
            if boundary {
                if let Some(end) = find_tag_end(bytes, after) {
                    if bytes[end - 1] != b'/' {
                        depth += 1;
                    }
                    i = end + 1;
                    continue;
                }
            }
        }

        i += 1;
    }

    None
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// Append `suffix` to the `src` attribute of the fragment's first tag
pub fn append_to_src(html: &str, suffix: &str) -> String {
    let Some(tag) = parse_start_tag(html) else {
        return html.to_string();
    };
    let Some(caps) = SRC_ATTR.captures(tag.text) else {
        return html.to_string();
    };
    let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
        return html.to_string();
    };
    let at = value.end();
    format!("{}{}{}", &html[..at], suffix, &html[at..])
}

/// Whether a heading's visible text (tags stripped) equals `text`,
/// ignoring case and surrounding whitespace
fn heading_matches(inner: &str, text: &str) -> bool {
    let visible = TAG.replace_all(inner, "").trim().to_lowercase();
    let wanted = text.trim().to_lowercase();
    visible == wanted || visible == escape_html(&wanted)
}

/// Headings of `html` as `(level, whole match)`, filtered by visible text
fn headings<'h>(
    html: &'h str,
    text: Option<&'h str>,
) -> impl Iterator<Item = (u8, regex::Match<'h>)> + 'h {
    HEADING.captures_iter(html).filter_map(move |caps| {
        let whole = caps.get(0)?;
        let level = caps.get(1)?.as_str().parse().ok()?;
        let inner = caps.get(2)?.as_str();
        match text {
            Some(text) if !heading_matches(inner, text) => None,
            _ => Some((level, whole)),
        }
    })
}

/// Slice the section that starts at the heading whose visible text equals
/// `start` (case-insensitive).
///
/// The section ends before the heading matching `end`, or, without `end`,
/// before the next heading of the same or a higher level. Returns `None`
/// when the start heading does not exist.
pub fn extract_header_section(html: &str, start: &str, end: Option<&str>) -> Option<String> {
    let (level, whole) = headings(html, Some(start)).next()?;

    let body_from = whole.end();
    let rest = &html[body_from..];
    let stop = match end.filter(|e| !e.trim().is_empty()) {
        Some(end_text) => headings(rest, Some(end_text)).next(),
        None => headings(rest, None).find(|(l, _)| *l <= level),
    }
    .map(|(_, m)| m.start());

    let end_at = stop.map_or(html.len(), |offset| body_from + offset);
    Some(html[whole.start()..end_at].trim().to_string())
}

/// Keep lines `first..=last` (1-indexed) of the fragment's innermost text,
/// preserving any single outer wrapper tags
pub fn extract_line_range(html: &str, first: Option<usize>, last: Option<usize>) -> String {
    let wrappers = split_wrappers(html);
    let lines: Vec<&str> = wrappers.inner.split('\n').collect();

    let from = first.unwrap_or(1).max(1) - 1;
    let to = last.unwrap_or(lines.len()).min(lines.len());
    let selected = if from < to {
        lines[from..to].join("\n")
    } else {
        String::new()
    };

    wrappers.rewrap(selected.trim())
}

/// Whether a line of markup has no visible text
pub fn is_blank_line(line: &str) -> bool {
    let mut in_tag = false;
    line.chars().all(|c| match c {
        '<' => {
            in_tag = true;
            true
        }
        '>' => {
            in_tag = false;
            true
        }
        _ => in_tag || c.is_whitespace(),
    })
}

/// Prefix each line of every `<pre><code>` block with its line number.
///
/// Trailing blank lines are dropped; other blank lines keep their number
/// and show a non-breaking space.
pub fn add_line_numbers(html: &str) -> String {
    CODE_BLOCK
        .replace_all(html, |caps: &Captures<'_>| {
            let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
                return String::new();
            };

            let mut lines: Vec<&str> = code.as_str().split('\n').collect();
            while lines.last().is_some_and(|l| is_blank_line(l)) {
                lines.pop();
            }

            let numbered = lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let content = if is_blank_line(line) { "&nbsp;" } else { line };
                    format!("<span class=\"line-number\">{}. </span>{}", i + 1, content)
                })
                .collect::<Vec<_>>()
                .join("\n");

            format!(
                "{}{}{}",
                &html[whole.start()..code.start()],
                numbered,
                &html[code.end()..whole.end()]
            )
        })
        .into_owned()
}
