use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, contents: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[allow(deprecated)]
fn bookmark() -> Result<Command, Box<dyn std::error::Error>> {
    Ok(Command::cargo_bin("bookmark")?)
}

#[test]
fn render_prints_resolved_links() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write(dir.path(), "content/notes/todo.md", "# Todo\n")?;
    write(dir.path(), "content/index.md", "See [[todo]] and [[nowhere]].")?;

    bookmark()?
        .current_dir(dir.path())
        .args(["render", "index.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "<a href=\"/notes/todo.md\" class=\"link\">todo</a>",
        ))
        .stdout(predicate::str::contains("<h1 id=\"index\">Index</h1>"))
        .stdout(predicate::str::contains("<a class=\"broken-link\">nowhere</a>"))
        .stderr(predicate::str::contains("Missing or malformed link"));

    Ok(())
}

#[test]
fn render_embed_mode_skips_title() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write(dir.path(), "content/note.md", "plain body")?;

    bookmark()?
        .current_dir(dir.path())
        .args(["render", "note.md", "--embed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>plain body</p>"))
        .stdout(predicate::str::contains("<h1").not());

    Ok(())
}

#[test]
fn render_unknown_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("content"))?;

    bookmark()?
        .current_dir(dir.path())
        .args(["render", "missing.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No file"));

    Ok(())
}

#[test]
fn tree_outputs_sorted_index() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write(dir.path(), "content/b.md", "")?;
    write(dir.path(), "content/a/z.md", "")?;
    write(dir.path(), "content/.hidden.md", "")?;

    let assert = bookmark()?
        .current_dir(dir.path())
        .arg("tree")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(stdout.trim())?;
    assert_eq!(value["isRoot"], true);
    let children = value["children"].as_array().expect("children array");
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["name"], "a");
    assert_eq!(children[0]["dir"], true);
    assert_eq!(children[1]["name"], "b.md");

    Ok(())
}

#[test]
fn build_writes_pages_and_index() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write(
        dir.path(),
        "bookmark.yml",
        r#"
site:
  title: "Notes"
paths:
  content: "vault"
  output: "out"
"#,
    )?;
    write(dir.path(), "vault/index.md", "Welcome ![[notes/intro]]")?;
    write(dir.path(), "vault/notes/intro.md", "Intro text")?;

    bookmark()?
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .success();

    let index = fs::read_to_string(dir.path().join("out/index.md.html"))?;
    assert!(index.contains("<title>Index | Notes</title>"), "{index}");
    assert!(index.contains("Intro text"), "{index}");
    assert!(dir.path().join("out/notes/intro.md.html").exists());
    assert_eq!(fs::read_to_string(dir.path().join("out/index.html"))?, index);

    let tree: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("out/vault.json"))?)?;
    assert_eq!(tree["name"], "vault");

    Ok(())
}
