//! The `|key=value`, `|flag` and `#Header` suffixes of an embed target.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static DIMENSIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)x(\d+)$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedProperties {
    pub width: Option<String>,
    pub height: Option<String>,
    /// Container title; `Some("")` suppresses it
    pub title: Option<String>,
    pub css: Option<String>,
    pub start_header: Option<String>,
    pub end_header: Option<String>,
    pub first_page: Option<u32>,
    pub last_page: Option<u32>,
    pub first_line: Option<usize>,
    pub last_line: Option<usize>,
    pub numbered: bool,
    #[serde(skip)]
    title_given: bool,
}

impl EmbedProperties {
    /// Parse the suffix segments of `source` (`target|300x200#Intro|title=X`).
    ///
    /// When no title is given, `title` falls back to the text before the
    /// first `|` or `#`.
    pub fn parse(source: &str) -> Self {
        let mut props = Self::default();
        let mut segments = split_segments(source);
        let head = segments.next().map(|(_, s)| s.trim()).unwrap_or_default();

        for (delimiter, term) in segments {
            let term = term.trim();
            match term.split_once('=') {
                Some((key, value)) if !value.trim().is_empty() => {
                    props.apply_pair(key.trim(), value.trim());
                }
                _ => props.apply_flag(delimiter, term.trim_end_matches('=')),
            }
        }

        if props.title.is_none() {
            props.title = Some(head.to_string());
        }
        props
    }

    fn apply_flag(&mut self, delimiter: char, key: &str) {
        if key.is_empty() {
            return;
        }
        if key == "numbered" {
            self.numbered = true;
        } else if key == "notitle" {
            self.set_title(String::new());
        } else if let Some(caps) = DIMENSIONS.captures(key) {
            self.width = Some(caps[1].to_string());
            self.height = Some(caps[2].to_string());
        } else if delimiter == '#' {
            self.start_header = Some(key.to_string());
        } else {
            self.set_title(key.to_string());
        }
    }

    fn apply_pair(&mut self, key: &str, value: &str) {
        match key {
            "width" => self.width = Some(value.to_string()),
            "height" => self.height = Some(value.to_string()),
            "title" => self.set_title(strip_quotes(value).to_string()),
            "style" | "css" => self.css = Some(value.to_string()),
            "header" | "headers" => {
                let (start, end) = split_range(value);
                self.start_header = start.map(|s| strip_quotes(s).to_string());
                self.end_header = end.map(|s| strip_quotes(s).to_string());
            }
            "page" | "pages" => {
                let (start, end) = split_range(value);
                self.first_page = start.and_then(|s| s.parse().ok());
                self.last_page = end.and_then(|s| s.parse().ok());
            }
            "line" | "lines" => {
                let (start, end) = split_range(value);
                self.first_line = start.and_then(|s| s.parse().ok());
                self.last_line = end.and_then(|s| s.parse().ok());
            }
            other => tracing::debug!(key = other, "Ignoring unknown embed property"),
        }
    }

    fn set_title(&mut self, title: String) {
        self.title = Some(title);
        self.title_given = true;
    }

    /// The title only if one was written explicitly (`|Caption`, `title=`, `notitle`)
    pub fn explicit_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|_| self.title_given)
    }

    pub fn has_pages(&self) -> bool {
        self.first_page.is_some() || self.last_page.is_some()
    }

    pub fn has_line_range(&self) -> bool {
        self.first_line.is_some() || self.last_line.is_some()
    }

    /// `#page=first-last`; `first` defaults to 1 and `last` to `first`
    pub fn page_fragment(&self) -> Option<String> {
        if !self.has_pages() {
            return None;
        }
        let first = self.first_page.unwrap_or(1);
        let last = self.last_page.unwrap_or(first);
        Some(format!("#page={first}-{last}"))
    }

    /// Inline style: `width:W;height:H;` followed by raw css
    pub fn style(&self) -> String {
        let mut style = String::new();
        if let Some(width) = &self.width {
            style.push_str(&format!("width:{width};"));
        }
        if let Some(height) = &self.height {
            style.push_str(&format!("height:{height};"));
        }
        if let Some(css) = &self.css {
            style.push_str(css);
        }
        style
    }
}

/// Split at every `|` or `#`, yielding each segment with the delimiter that
/// preceded it (`'\0'` for the first)
fn split_segments(source: &str) -> impl Iterator<Item = (char, &str)> {
    let mut delimiter = '\0';
    let mut rest = Some(source);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['|', '#']) {
            Some(idx) => {
                let segment = (delimiter, &current[..idx]);
                delimiter = current[idx..].chars().next().unwrap_or('|');
                rest = Some(&current[idx + 1..]);
                Some(segment)
            }
            None => {
                rest = None;
                Some((delimiter, current))
            }
        }
    })
}

fn split_range(value: &str) -> (Option<&str>, Option<&str>) {
    let (start, end) = match value.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (value, None),
    };
    let start = Some(start.trim()).filter(|s| !s.is_empty());
    let end = end.map(str::trim).filter(|s| !s.is_empty());
    (start, end)
}

fn strip_quotes(s: &str) -> &str {
    let quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')));
    if quoted {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_style() {
        let props = EmbedProperties::parse("chart.png|300x200");
        assert_eq!(props.width.as_deref(), Some("300"));
        assert_eq!(props.height.as_deref(), Some("200"));
        assert_eq!(props.style(), "width:300;height:200;");
        assert_eq!(props.title.as_deref(), Some("chart.png"));
        assert_eq!(props.explicit_title(), None);
    }

    #[test]
    fn test_header_and_caption() {
        let props = EmbedProperties::parse("doc.md#Intro|My Caption");
        assert_eq!(props.start_header.as_deref(), Some("Intro"));
        assert_eq!(props.explicit_title(), Some("My Caption"));
        assert_eq!(props.end_header, None);
    }

    #[test]
    fn test_key_value_pairs() {
        let props = EmbedProperties::parse(
            "code.rs|lines=3-7|numbered|title='Main loop'|css=border:0;|width=50%",
        );
        assert_eq!(props.first_line, Some(3));
        assert_eq!(props.last_line, Some(7));
        assert!(props.numbered);
        assert_eq!(props.explicit_title(), Some("Main loop"));
        assert_eq!(props.style(), "width:50%;border:0;");
    }

    #[test]
    fn test_ranges_with_open_ends() {
        let props = EmbedProperties::parse("a.pdf|pages=4");
        assert_eq!(props.page_fragment().as_deref(), Some("#page=4-4"));

        let props = EmbedProperties::parse("a.pdf|page=-9");
        assert_eq!(props.page_fragment().as_deref(), Some("#page=1-9"));

        let props = EmbedProperties::parse("notes.md|headers=Setup-Usage");
        assert_eq!(props.start_header.as_deref(), Some("Setup"));
        assert_eq!(props.end_header.as_deref(), Some("Usage"));

        let props = EmbedProperties::parse("x.txt|lines=5");
        assert_eq!((props.first_line, props.last_line), (Some(5), None));
    }

    #[test]
    fn test_notitle_suppresses() {
        let props = EmbedProperties::parse("video.mp4|notitle");
        assert_eq!(props.title.as_deref(), Some(""));
        assert_eq!(props.explicit_title(), Some(""));
    }

    #[test]
    fn test_plain_target() {
        let props = EmbedProperties::parse("  image.png ");
        assert_eq!(props.title.as_deref(), Some("image.png"));
        assert!(!props.has_pages() && !props.has_line_range() && !props.numbered);
        assert_eq!(props.style(), "");
    }
}
