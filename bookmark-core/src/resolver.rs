//! Link targets: parsing the bracket forms and resolving them against the
//! vault or the web.

use crate::slug::slugify;
use crate::vault::{split_extension, Vault};
use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use std::fmt;
use url::Url;

static HTTP_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").unwrap());

static COMMON_TLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(com|org|net|io|dev|app|ai|co|uk|gov|edu|me|xyz)([/?#\s]|$)").unwrap()
});

/// Characters escaped when a vault path becomes an href
const HREF_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The three bracket shapes a reference can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSyntax {
    /// `[[term]]`
    Wikilink { term: String },
    /// `[text]` or `[text](target)`
    Bracket { text: String, target: Option<String> },
}

/// One tokenized `[[...]]` / `[...]` / `[...](...)` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken {
    /// Source text of the whole construct, `!` included for embeds
    pub raw: String,
    pub embed: bool,
    pub syntax: LinkSyntax,
}

impl LinkToken {
    pub fn wikilink(raw: impl Into<String>, term: &str) -> Self {
        Self {
            raw: raw.into(),
            embed: false,
            syntax: LinkSyntax::Wikilink {
                term: decode(term),
            },
        }
    }

    pub fn bracket(raw: impl Into<String>, text: &str, target: Option<&str>) -> Self {
        let text = decode(text);
        let text = text
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
            .unwrap_or(text);
        Self {
            raw: raw.into(),
            embed: false,
            syntax: LinkSyntax::Bracket {
                text,
                target: target.map(decode),
            },
        }
    }

    pub fn into_embed(mut self) -> Self {
        self.embed = true;
        self
    }

    pub fn is_wikilink(&self) -> bool {
        matches!(self.syntax, LinkSyntax::Wikilink { .. })
    }

    /// The term carrying the target and its `|`/`#` suffixes
    pub fn source(&self) -> &str {
        match &self.syntax {
            LinkSyntax::Wikilink { term } => term,
            LinkSyntax::Bracket {
                target: Some(target),
                ..
            } if !target.trim().is_empty() => target,
            LinkSyntax::Bracket { text, .. } => text,
        }
    }

    /// Text before the first `|` or `#`
    pub fn target(&self) -> &str {
        let source = self.source();
        source
            .split(['|', '#'])
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Text after the first `#`, up to the next `|`
    pub fn anchor(&self) -> Option<&str> {
        let (_, after) = self.source().split_once('#')?;
        let anchor = after.split('|').next().unwrap_or_default().trim();
        (!anchor.is_empty()).then_some(anchor)
    }

    /// Visible text of a rendered link.
    ///
    /// Wikilinks use the text after `|`, else the final path segment of the
    /// target; bracket links use their bracket text.
    pub fn display_text(&self) -> String {
        match &self.syntax {
            LinkSyntax::Wikilink { term } => match term.split_once('|') {
                Some((_, label)) if !label.trim().is_empty() => label.trim().to_string(),
                _ => last_segment(self.target()).to_string(),
            },
            LinkSyntax::Bracket { text, .. } if !text.trim().is_empty() => text.trim().to_string(),
            LinkSyntax::Bracket { .. } => self.target().to_string(),
        }
    }
}

impl fmt::Display for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn decode(term: &str) -> String {
    percent_decode_str(term).decode_utf8_lossy().into_owned()
}

fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Normalize a link that looks like a web address to an `https://` URL.
///
/// Accepts explicit `http(s)://` links, anything starting with `localhost`,
/// and bare domains with a common TLD (`example.com/page`).
pub fn to_http_link(link: &str) -> Option<String> {
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return None;
    }

    if HTTP_SCHEME.is_match(trimmed) {
        Some(trimmed.to_string())
    } else if trimmed.starts_with("localhost") || COMMON_TLD.is_match(trimmed) {
        Some(format!("https://{trimmed}"))
    } else {
        None
    }
}

/// Where the document being rendered lives; relative links resolve from here
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Vault-relative path of a local file
    Vault(String),
    /// A remotely fetched markdown document
    Remote(Url),
}

impl DocumentSource {
    pub fn vault(path: impl Into<String>) -> Self {
        Self::Vault(path.into())
    }

    /// Directory of a vault document, `""` at the root
    fn vault_dir(&self) -> Option<&str> {
        match self {
            Self::Vault(path) => Some(path.rsplit_once('/').map_or("", |(dir, _)| dir)),
            Self::Remote(_) => None,
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vault(path) => write!(f, "/{}", path.trim_start_matches('/')),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Outcome of resolving a link target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Vault-relative path of an existing file
    Local(String),
    /// Absolute `http(s)` URL
    Remote(String),
    Broken,
}

impl ResolvedTarget {
    /// Browser-facing href, with the anchor appended; `None` when broken.
    ///
    /// Local anchors are slugified to match generated heading ids.
    pub fn href(&self, anchor: Option<&str>) -> Option<String> {
        match self {
            Self::Local(path) => {
                let mut href = format!("/{}", utf8_percent_encode(path, HREF_PATH));
                if let Some(anchor) = anchor {
                    href.push('#');
                    href.push_str(&slugify(anchor));
                }
                Some(href)
            }
            Self::Remote(url) => Some(match anchor {
                Some(anchor) => format!("{url}#{anchor}"),
                None => url.clone(),
            }),
            Self::Broken => None,
        }
    }
}

/// Resolves link tokens against one vault snapshot, from one document
pub struct LinkResolver<'a> {
    vault: &'a Vault,
    source: &'a DocumentSource,
}

impl<'a> LinkResolver<'a> {
    pub fn new(vault: &'a Vault, source: &'a DocumentSource) -> Self {
        Self { vault, source }
    }

    pub fn source(&self) -> &DocumentSource {
        self.source
    }

    pub fn resolve(&self, token: &LinkToken) -> ResolvedTarget {
        let target = token.target();
        if target.is_empty() {
            return ResolvedTarget::Broken;
        }

        if let Some(url) = to_http_link(target) {
            return ResolvedTarget::Remote(url);
        }

        let found = if token.is_wikilink() {
            self.resolve_name(target)
        } else {
            self.resolve_relative(target)
        };

        match found {
            Some(Found::Local(path)) => ResolvedTarget::Local(path),
            Some(Found::Remote(url)) => ResolvedTarget::Remote(url),
            None => ResolvedTarget::Broken,
        }
    }

    /// Wikilink lookup: exact extension when given, otherwise `.md` first
    fn resolve_name(&self, target: &str) -> Option<Found> {
        let (dir, file) = match target.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, target),
        };
        let (stem, ext) = split_extension(file);
        let name = match dir {
            Some(dir) => format!("{dir}/{stem}"),
            None => stem.to_string(),
        };

        let path = match ext {
            Some(ext) => self.vault.find_file_path(Some(&name), Some(ext)),
            None => self
                .vault
                .find_file_path(Some(&name), Some("md"))
                .or_else(|| self.vault.find_file_path(Some(&name), None)),
        };
        path.map(Found::Local)
    }

    /// Bracket lookup: relative to the current document first, then by
    /// base name anywhere in the vault
    fn resolve_relative(&self, target: &str) -> Option<Found> {
        match self.source {
            DocumentSource::Remote(base) => {
                return base.join(target).ok().map(|url| Found::Remote(url.to_string()));
            }
            DocumentSource::Vault(_) => {}
        }

        let joined = match target.strip_prefix('/') {
            Some(absolute) => normalize_path(absolute),
            None => normalize_path(&format!(
                "{}/{}",
                self.source.vault_dir().unwrap_or_default(),
                target
            )),
        };
        if let Some(path) = joined.filter(|p| self.vault.contains_file(p)) {
            return Some(Found::Local(path));
        }

        let (stem, ext) = split_extension(last_segment(target));
        self.vault
            .find_file_path(Some(stem), ext)
            .map(Found::Local)
    }
}

enum Found {
    Local(String),
    Remote(String),
}

/// Lexically resolve `.` and `..` segments; `None` when the path escapes the root
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::VaultNode;

    fn vault() -> Vault {
        Vault::from_tree(
            "/vault",
            VaultNode::root(
                "vault",
                vec![
                    VaultNode::dir(
                        "notes",
                        vec![
                            VaultNode::file("todo.md"),
                            VaultNode::file("todo.txt"),
                            VaultNode::file("diagram.png"),
                        ],
                    ),
                    VaultNode::dir(
                        "projects",
                        vec![VaultNode::file("plan.md"), VaultNode::file("budget.csv")],
                    ),
                    VaultNode::file("index.md"),
                ],
            ),
        )
    }

    #[test]
    fn test_token_parts() {
        let token = LinkToken::wikilink("[[doc#Intro|Read this]]", "doc#Intro|Read this");
        assert_eq!(token.target(), "doc");
        assert_eq!(token.anchor(), Some("Intro"));
        assert_eq!(token.display_text(), "Read this");

        let token = LinkToken::wikilink("[[notes/todo]]", "notes/todo");
        assert_eq!(token.display_text(), "todo");
        assert_eq!(token.anchor(), None);

        let token = LinkToken::bracket("[<plan>]", "<plan>", None);
        assert_eq!(token.source(), "plan");

        let token = LinkToken::bracket("[Budget](budget%20v2.csv)", "Budget", Some("budget%20v2.csv"));
        assert_eq!(token.target(), "budget v2.csv");
        assert_eq!(token.display_text(), "Budget");
    }

    #[test]
    fn test_to_http_link() {
        assert_eq!(to_http_link("https://a.b/c").as_deref(), Some("https://a.b/c"));
        assert_eq!(
            to_http_link("example.com/page").as_deref(),
            Some("https://example.com/page")
        );
        assert_eq!(
            to_http_link("localhost:8080").as_deref(),
            Some("https://localhost:8080")
        );
        assert_eq!(to_http_link("docs.io").as_deref(), Some("https://docs.io"));
        assert_eq!(to_http_link("notes/todo.md"), None);
        assert_eq!(to_http_link("file.company"), None);
        assert_eq!(to_http_link("   "), None);
    }

    #[test]
    fn test_wikilink_with_directory_hint() {
        let vault = vault();
        let source = DocumentSource::vault("projects/plan.md");
        let resolver = LinkResolver::new(&vault, &source);

        let token = LinkToken::wikilink("[[notes/todo]]", "notes/todo");
        let resolved = resolver.resolve(&token);
        assert_eq!(resolved, ResolvedTarget::Local("notes/todo.md".into()));
        assert_eq!(resolved.href(None).as_deref(), Some("/notes/todo.md"));
    }

    #[test]
    fn test_wikilink_extension_and_md_preference() {
        let vault = vault();
        let source = DocumentSource::vault("index.md");
        let resolver = LinkResolver::new(&vault, &source);

        let txt = LinkToken::wikilink("[[todo.txt]]", "todo.txt");
        assert_eq!(resolver.resolve(&txt), ResolvedTarget::Local("notes/todo.txt".into()));

        let bare = LinkToken::wikilink("[[TODO]]", "TODO");
        assert_eq!(resolver.resolve(&bare), ResolvedTarget::Local("notes/todo.md".into()));

        let any = LinkToken::wikilink("[[diagram]]", "diagram");
        assert_eq!(resolver.resolve(&any), ResolvedTarget::Local("notes/diagram.png".into()));

        let missing = LinkToken::wikilink("[[missing-page]]", "missing-page");
        assert_eq!(resolver.resolve(&missing), ResolvedTarget::Broken);
    }

    #[test]
    fn test_bracket_relative_then_vault_wide() {
        let vault = vault();
        let source = DocumentSource::vault("projects/plan.md");
        let resolver = LinkResolver::new(&vault, &source);

        let sibling = LinkToken::bracket("[b](budget.csv)", "b", Some("budget.csv"));
        assert_eq!(
            resolver.resolve(&sibling),
            ResolvedTarget::Local("projects/budget.csv".into())
        );

        let up = LinkToken::bracket("[t](../notes/todo.md)", "t", Some("../notes/todo.md"));
        assert_eq!(resolver.resolve(&up), ResolvedTarget::Local("notes/todo.md".into()));

        let elsewhere = LinkToken::bracket("[d](diagram.png)", "d", Some("diagram.png"));
        assert_eq!(
            resolver.resolve(&elsewhere),
            ResolvedTarget::Local("notes/diagram.png".into())
        );

        let rooted = LinkToken::bracket("[i](/index.md)", "i", Some("/index.md"));
        assert_eq!(resolver.resolve(&rooted), ResolvedTarget::Local("index.md".into()));
    }

    #[test]
    fn test_remote_targets() {
        let vault = vault();
        let source = DocumentSource::vault("index.md");
        let resolver = LinkResolver::new(&vault, &source);

        let token = LinkToken::wikilink("[[example.com/a#top]]", "example.com/a#top");
        let resolved = resolver.resolve(&token);
        assert_eq!(resolved, ResolvedTarget::Remote("https://example.com/a".into()));
        assert_eq!(
            resolved.href(token.anchor()).as_deref(),
            Some("https://example.com/a#top")
        );
    }

    #[test]
    fn test_links_inside_remote_documents() {
        let vault = vault();
        let source = DocumentSource::Remote(Url::parse("https://host.dev/docs/guide.md").unwrap());
        let resolver = LinkResolver::new(&vault, &source);

        let token = LinkToken::bracket("[next](next.md)", "next", Some("next.md"));
        assert_eq!(
            resolver.resolve(&token),
            ResolvedTarget::Remote("https://host.dev/docs/next.md".into())
        );
    }

    #[test]
    fn test_local_href_encoding_and_anchor() {
        let target = ResolvedTarget::Local("My Notes/a b.md".into());
        assert_eq!(
            target.href(Some("Getting Started")).as_deref(),
            Some("/My%20Notes/a%20b.md#getting-started")
        );
        assert_eq!(ResolvedTarget::Broken.href(None), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/./b/../c.md").as_deref(), Some("a/c.md"));
        assert_eq!(normalize_path("/x.md").as_deref(), Some("x.md"));
        assert_eq!(normalize_path("../x.md"), None);
    }
}
