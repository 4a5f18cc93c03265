mod common;

use common::{capture_warnings, renderer_for, vault_with};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, content_type: &str, body: &str) {
    Mock::given(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .mount(server)
        .await;
}

#[tokio::test]
async fn remote_markdown_is_rendered_with_title() {
    let server = MockServer::start().await;
    serve(&server, "/docs/remote.md", "text/markdown", "Hello **remote** world").await;

    let page = format!("![[{}/docs/remote.md]]\n", server.uri());
    let vault = vault_with(&[("page.md", page.as_str())]);
    let renderer = renderer_for(vault.path());

    let html = renderer.load_file_to_html("page.md", true).await;
    assert!(html.contains("title=\"Remote\""), "{html}");
    assert!(html.contains("<div class=\"embed-wrapper\">"), "{html}");
    assert!(html.contains("<h1 id=\"remote\">Remote</h1>"), "{html}");
    assert!(html.contains("<strong>remote</strong>"), "{html}");
}

#[tokio::test]
async fn remote_markdown_links_resolve_against_its_url() {
    let server = MockServer::start().await;
    serve(&server, "/docs/guide.md", "text/markdown", "Next: [Setup](setup.md)").await;

    let page = format!("![[{}/docs/guide.md]]\n", server.uri());
    let vault = vault_with(&[("page.md", page.as_str())]);
    let renderer = renderer_for(vault.path());

    let html = renderer.load_file_to_html("page.md", true).await;
    let expected = format!("href=\"{}/docs/setup.md\"", server.uri());
    assert!(html.contains(&expected), "{html}");
}

#[tokio::test]
async fn remote_image_uses_probe_only() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/img/sales_q3.png"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/sales_q3.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let link = format!("{}/img/sales_q3.png", server.uri());
    let vault = vault_with(&[("page.md", format!("![[{link}|640x480]]\n").as_str())]);
    let renderer = renderer_for(vault.path());

    let html = renderer.load_file_to_html("page.md", true).await;
    assert!(html.contains("style=\"width:640;height:480;\""), "{html}");
    assert!(html.contains("title=\"Sales Q3\""), "{html}");
    assert!(html.contains(&format!("<img src=\"{link}\"")), "{html}");
}

#[tokio::test]
async fn remote_plain_text_is_escaped() {
    let server = MockServer::start().await;
    serve(&server, "/notes", "text/plain; charset=utf-8", "a < b\n").await;

    let page = format!("![[{}/notes]]\n", server.uri());
    let vault = vault_with(&[("page.md", page.as_str())]);
    let renderer = renderer_for(vault.path());

    let html = renderer.load_file_to_html("page.md", true).await;
    assert!(
        html.contains("<pre class=\"whitespace-pre-wrap break-words\">a &lt; b</pre>"),
        "{html}"
    );
}

#[tokio::test]
async fn remote_source_file_becomes_code_block() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/src/lib.py",
        "text/x-python",
        "def one():\n    return 1\n\ndef two():\n    return 2\n",
    )
    .await;

    let page = format!("![[{}/src/lib.py|lines=4-5|numbered]]\n", server.uri());
    let vault = vault_with(&[("page.md", page.as_str())]);
    let renderer = renderer_for(vault.path());

    let html = renderer.load_file_to_html("page.md", true).await;
    assert!(html.contains("<pre><code class=\"language-py\">"), "{html}");
    assert!(html.contains("<span class=\"line-number\">4. </span>"), "{html}");
    assert!(!html.contains("<span class=\"line-number\">1. </span>"), "{html}");
}

#[tokio::test]
async fn unreachable_remote_degrades_to_error_fragment() {
    let server = MockServer::start().await;
    Mock::given(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let link = format!("{}/gone.png", server.uri());
    let vault = vault_with(&[("page.md", format!("before\n\n![[{link}]]\n\nafter").as_str())]);
    let renderer = renderer_for(vault.path());
    let (logs, _guard) = capture_warnings();

    let html = renderer.load_file_to_html("page.md", true).await;
    assert!(html.contains("title=\"Error Loading Content\""), "{html}");
    assert!(html.contains(&link), "{html}");
    assert!(html.contains("<p>before</p>") && html.contains("<p>after</p>"), "{html}");
    assert!(logs.contents().contains("404"), "{}", logs.contents());
}
