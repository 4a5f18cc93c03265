//! In-memory index of the content directory.
//!
//! The index is an immutable tree snapshot. Readers hold an `Arc<Vault>`;
//! rebuilds publish a fresh snapshot through [`SharedVault`] so an in-flight
//! resolution never observes a half-built tree.

use parking_lot::RwLock;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// A node of the vault tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultNode {
    File {
        name: String,
        title: String,
    },
    Directory {
        name: String,
        children: Vec<VaultNode>,
        is_root: bool,
    },
}

impl VaultNode {
    pub fn file(name: impl Into<String>) -> Self {
        let name = name.into();
        let title = title_case(&name);
        VaultNode::File { name, title }
    }

    pub fn dir(name: impl Into<String>, children: Vec<VaultNode>) -> Self {
        VaultNode::Directory {
            name: name.into(),
            children,
            is_root: false,
        }
    }

    pub fn root(name: impl Into<String>, children: Vec<VaultNode>) -> Self {
        VaultNode::Directory {
            name: name.into(),
            children,
            is_root: true,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VaultNode::File { name, .. } | VaultNode::Directory { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, VaultNode::Directory { .. })
    }

    pub fn children(&self) -> &[VaultNode] {
        match self {
            VaultNode::Directory { children, .. } => children,
            VaultNode::File { .. } => &[],
        }
    }
}

// Wire shape consumed by the file browser: {name, dir, title?, isRoot?, children?}
impl Serialize for VaultNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            VaultNode::File { name, title } => {
                let mut s = serializer.serialize_struct("VaultNode", 3)?;
                s.serialize_field("name", name)?;
                s.serialize_field("dir", &false)?;
                s.serialize_field("title", title)?;
                s.end()
            }
            VaultNode::Directory {
                name,
                children,
                is_root,
            } => {
                let len = if *is_root { 4 } else { 3 };
                let mut s = serializer.serialize_struct("VaultNode", len)?;
                s.serialize_field("name", name)?;
                s.serialize_field("dir", &true)?;
                if *is_root {
                    s.serialize_field("isRoot", &true)?;
                }
                s.serialize_field("children", children)?;
                s.end()
            }
        }
    }
}

/// Immutable snapshot of the content directory
#[derive(Debug, Clone)]
pub struct Vault {
    content_dir: PathBuf,
    root: VaultNode,
}

impl Vault {
    /// Walk `content_dir` and build a sorted snapshot.
    ///
    /// Hidden entries are skipped. An unreadable directory is logged and
    /// contributes an empty subtree; it never aborts the build.
    pub fn build(content_dir: impl AsRef<Path>) -> Self {
        let content_dir = content_dir.as_ref().to_path_buf();
        let root_name = content_dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        // Stack of open directories: (name, children collected so far)
        let mut stack: Vec<(String, Vec<VaultNode>)> = vec![(root_name, Vec::new())];

        let walker = WalkDir::new(&content_dir)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::error!(
                        path = ?err.path(),
                        "Error reading directory: {}",
                        err
                    );
                    continue;
                }
            };

            while stack.len() > entry.depth() {
                close_directory(&mut stack);
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type();
            if file_type.is_dir() {
                stack.push((name, Vec::new()));
            } else if file_type.is_file() {
                if let Some((_, children)) = stack.last_mut() {
                    children.push(VaultNode::file(name));
                }
            }
        }

        while stack.len() > 1 {
            close_directory(&mut stack);
        }
        let (root_name, children) = stack.pop().unwrap_or_default();

        let mut root = VaultNode::root(root_name, children);
        sort_tree(&mut root);

        let files = count_files(&root);
        tracing::info!("Indexed {} files under {:?}", files, content_dir);

        Self { content_dir, root }
    }

    /// Wrap an already-built tree (used by tests and tools)
    pub fn from_tree(content_dir: impl Into<PathBuf>, mut root: VaultNode) -> Self {
        sort_tree(&mut root);
        Self {
            content_dir: content_dir.into(),
            root,
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn root(&self) -> &VaultNode {
        &self.root
    }

    /// First file (tree order) matching `name` and `extension`; see [`find_file_path`]
    pub fn find_file_path(&self, name: Option<&str>, extension: Option<&str>) -> Option<String> {
        find_file_path(&self.root, name, extension)
    }

    /// Look up a node by its vault-relative path (`/`-separated)
    pub fn find_by_path(&self, rel_path: &str) -> Option<&VaultNode> {
        let mut node = &self.root;
        for segment in rel_path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            node = node.children().iter().find(|c| c.name() == segment)?;
        }
        Some(node)
    }

    pub fn contains_file(&self, rel_path: &str) -> bool {
        matches!(self.find_by_path(rel_path), Some(VaultNode::File { .. }))
    }

    /// All file paths in tree order
    pub fn files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_files(&self.root, "", &mut out);
        out
    }

    /// Absolute filesystem path of a vault-relative path
    pub fn absolute(&self, rel_path: &str) -> PathBuf {
        self.content_dir.join(rel_path.trim_start_matches('/'))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.root)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.root)
    }
}

fn close_directory(stack: &mut Vec<(String, Vec<VaultNode>)>) {
    if let Some((name, children)) = stack.pop() {
        if let Some((_, parent)) = stack.last_mut() {
            parent.push(VaultNode::dir(name, children));
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn count_files(node: &VaultNode) -> usize {
    match node {
        VaultNode::File { .. } => 1,
        VaultNode::Directory { children, .. } => children.iter().map(count_files).sum(),
    }
}

fn collect_files(node: &VaultNode, prefix: &str, out: &mut Vec<String>) {
    for child in node.children() {
        let path = join_rel(prefix, child.name());
        match child {
            VaultNode::File { .. } => out.push(path),
            VaultNode::Directory { .. } => collect_files(child, &path, out),
        }
    }
}

fn join_rel(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Sort every directory: directories first, then natural case-insensitive order
pub fn sort_tree(node: &mut VaultNode) {
    if let VaultNode::Directory { children, .. } = node {
        children.sort_by(compare_nodes);
        children.iter_mut().for_each(sort_tree);
    }
}

fn compare_nodes(a: &VaultNode, b: &VaultNode) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| natural_cmp(a.name(), b.name()))
}

/// Case-insensitive, numeric-aware ordering (`file2` < `file10`)
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ord = compare_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        it.next();
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Depth-first lookup of a file by base name and extension.
///
/// Both parameters are wildcards when omitted; comparisons ignore case and a
/// leading `.` on the extension. `name` may carry directory segments
/// (`notes/todo`), in which case the match's trailing directories must equal
/// them. Directories never match.
pub fn find_file_path(
    root: &VaultNode,
    name: Option<&str>,
    extension: Option<&str>,
) -> Option<String> {
    let extension = extension
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty());
    let name = name
        .map(|n| n.trim_matches('/').to_lowercase())
        .filter(|n| !n.is_empty());

    let (dir_hint, base) = match &name {
        Some(n) => match n.rsplit_once('/') {
            Some((dirs, base)) => (
                dirs.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>(),
                Some(base),
            ),
            None => (Vec::new(), Some(n.as_str())),
        },
        None => (Vec::new(), None),
    };

    let query = FileQuery {
        base,
        extension: extension.as_deref(),
        dir_hint: &dir_hint,
    };
    let mut parents = Vec::new();
    search(root, &query, &mut parents)
}

struct FileQuery<'a> {
    base: Option<&'a str>,
    extension: Option<&'a str>,
    dir_hint: &'a [&'a str],
}

impl FileQuery<'_> {
    fn matches(&self, file_name: &str, parents: &[&str]) -> bool {
        let (stem, ext) = split_extension(file_name);
        let name_ok = self.base.map_or(true, |b| stem.to_lowercase() == b);
        let ext_ok = self
            .extension
            .map_or(true, |e| ext.map(|x| x.to_lowercase()).as_deref() == Some(e));
        let dirs_ok = self.dir_hint.len() <= parents.len()
            && self
                .dir_hint
                .iter()
                .rev()
                .zip(parents.iter().rev())
                .all(|(hint, parent)| parent.to_lowercase() == *hint);
        name_ok && ext_ok && dirs_ok
    }
}

fn search<'n>(node: &'n VaultNode, query: &FileQuery<'_>, parents: &mut Vec<&'n str>) -> Option<String> {
    for child in node.children() {
        match child {
            VaultNode::File { name, .. } => {
                if query.matches(name, parents) {
                    let mut path = parents.join("/");
                    if !path.is_empty() {
                        path.push('/');
                    }
                    path.push_str(name);
                    return Some(path);
                }
            }
            VaultNode::Directory { name, .. } => {
                parents.push(name);
                let found = search(child, query, parents);
                parents.pop();
                if found.is_some() {
                    return found;
                }
            }
        }
    }
    None
}

/// Split `name.ext` at the last dot; dotfiles have no extension
pub fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, None),
        Some(idx) => (&file_name[..idx], Some(&file_name[idx + 1..])),
    }
}

/// Human-readable title from a file name: `my_cool-note.md` -> `My Cool Note`
pub fn title_case(file_name: &str) -> String {
    let (stem, _) = split_extension(file_name);
    stem.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Atomically swappable handle to the current vault snapshot
#[derive(Debug)]
pub struct SharedVault {
    current: RwLock<Arc<Vault>>,
}

impl SharedVault {
    pub fn new(vault: Vault) -> Self {
        Self {
            current: RwLock::new(Arc::new(vault)),
        }
    }

    /// The snapshot in effect right now; stays valid across later swaps
    pub fn snapshot(&self) -> Arc<Vault> {
        self.current.read().clone()
    }

    /// Publish a new snapshot
    pub fn replace(&self, vault: Vault) -> Arc<Vault> {
        let fresh = Arc::new(vault);
        *self.current.write() = fresh.clone();
        fresh
    }

    /// Rebuild from the filesystem and publish. The walk happens outside the lock.
    pub fn rebuild(&self) -> Arc<Vault> {
        let content_dir = self.snapshot().content_dir().to_path_buf();
        self.replace(Vault::build(content_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample_tree() -> VaultNode {
        VaultNode::root(
            "content",
            vec![
                VaultNode::file("file10.md"),
                VaultNode::file("File2.md"),
                VaultNode::dir(
                    "notes",
                    vec![VaultNode::file("todo.md"), VaultNode::file("chart.PNG")],
                ),
                VaultNode::dir("archive", vec![VaultNode::file("todo.txt")]),
                VaultNode::file("readme.md"),
            ],
        )
    }

    fn names(node: &VaultNode) -> Vec<&str> {
        node.children().iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_sort_dirs_first_then_natural() {
        let vault = Vault::from_tree("/tmp", sample_tree());
        assert_eq!(
            names(vault.root()),
            vec!["archive", "notes", "File2.md", "file10.md", "readme.md"]
        );
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("file2", "file10"), Ordering::Less);
        assert_eq!(natural_cmp("File2", "file10"), Ordering::Less);
        assert_eq!(natural_cmp("a", "B"), Ordering::Less);
        assert_eq!(natural_cmp("chapter 01", "chapter 1a"), Ordering::Less);
        assert_eq!(natural_cmp("x", "x"), Ordering::Equal);
    }

    #[test]
    fn test_find_file_path_wildcards() {
        let vault = Vault::from_tree("/tmp", sample_tree());

        assert_eq!(
            vault.find_file_path(Some("todo"), Some(".md")),
            Some("notes/todo.md".to_string())
        );
        // Extension omitted: first match in tree order (archive before notes)
        assert_eq!(
            vault.find_file_path(Some("TODO"), None),
            Some("archive/todo.txt".to_string())
        );
        assert_eq!(
            vault.find_file_path(Some("chart"), Some("png")),
            Some("notes/chart.PNG".to_string())
        );
        assert_eq!(
            vault.find_file_path(None, Some("txt")),
            Some("archive/todo.txt".to_string())
        );
        assert_eq!(vault.find_file_path(Some("missing"), None), None);
        assert_eq!(vault.find_file_path(Some("notes"), None), None);
    }

    #[test]
    fn test_find_file_path_with_directory_hint() {
        let vault = Vault::from_tree("/tmp", sample_tree());
        assert_eq!(
            vault.find_file_path(Some("notes/todo"), None),
            Some("notes/todo.md".to_string())
        );
        assert_eq!(vault.find_file_path(Some("other/todo"), None), None);
    }

    #[test]
    fn test_find_by_path() {
        let vault = Vault::from_tree("/tmp", sample_tree());
        assert!(vault.contains_file("notes/todo.md"));
        assert!(!vault.contains_file("notes"));
        assert!(vault.find_by_path("notes").is_some_and(VaultNode::is_dir));
        assert!(vault.find_by_path("notes/nope.md").is_none());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("my_cool-note.md"), "My Cool Note");
        assert_eq!(title_case("readme"), "Readme");
        assert_eq!(title_case("archive.tar.gz"), "Archive.tar");
    }

    #[test]
    fn test_serialized_shape() {
        let vault = Vault::from_tree(
            "/tmp",
            VaultNode::root("content", vec![VaultNode::dir("a", vec![VaultNode::file("b_c.md")])]),
        );
        let value: serde_json::Value = serde_json::from_str(&vault.to_json().unwrap()).unwrap();
        assert_eq!(value["dir"], true);
        assert_eq!(value["isRoot"], true);
        assert_eq!(value["children"][0]["name"], "a");
        assert!(value["children"][0].get("isRoot").is_none());
        assert_eq!(value["children"][0]["children"][0]["dir"], false);
        assert_eq!(value["children"][0]["children"][0]["title"], "B C");
    }

    #[test]
    fn test_build_skips_hidden_and_sorts() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("notes/deep")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        fs::write(root.join(".hidden.md"), "x").unwrap();
        fs::write(root.join("page10.md"), "x").unwrap();
        fs::write(root.join("page2.md"), "x").unwrap();
        fs::write(root.join("notes/todo.md"), "x").unwrap();
        fs::write(root.join("notes/deep/leaf.txt"), "x").unwrap();

        let vault = Vault::build(root);
        assert_eq!(names(vault.root()), vec!["notes", "page2.md", "page10.md"]);
        assert_eq!(
            vault.files(),
            vec!["notes/deep/leaf.txt", "notes/todo.md", "page2.md", "page10.md"]
        );
        assert!(matches!(vault.root(), VaultNode::Directory { is_root: true, .. }));
    }

    #[test]
    fn test_shared_vault_swap_keeps_old_snapshot() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.md"), "x").unwrap();

        let shared = SharedVault::new(Vault::build(dir.path()));
        let before = shared.snapshot();

        fs::write(dir.path().join("two.md"), "x").unwrap();
        let after = shared.rebuild();

        assert_eq!(before.files(), vec!["one.md"]);
        assert_eq!(after.files(), vec!["one.md", "two.md"]);
        assert_eq!(shared.snapshot().files(), vec!["one.md", "two.md"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_empty_subtree() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::write(root.join("locked/secret.md"), "x").unwrap();
        fs::write(root.join("open.md"), "x").unwrap();

        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Running with privileges that ignore the mode bits
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let vault = Vault::build(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(vault.files(), vec!["open.md"]);
        let node = vault.find_by_path("locked").expect("directory node is kept");
        assert!(node.is_dir());
        assert!(node.children().is_empty());
    }
}
