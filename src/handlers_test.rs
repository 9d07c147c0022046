//! Tests for the HTTP handlers against a local fake of GitHub.

use super::*;
use crate::config::Config;
use crate::url_validator::ALLOWED_HOST;
use axum::body::to_bytes;
use serde_json::json;
use std::net::SocketAddr;

const DOC: &str = "# Hello\n\nSome text.\n\n## Hello\n\n```rust\nfn main() {}\n```\n";

/// Latin-1 bytes: `# été` with a stray 0xFF, not valid UTF-8.
const LATIN1_DOC: &[u8] = &[b'#', b' ', 0xE9, b't', 0xE9, 0xFF, b'\n'];

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// One server playing both the contents API (at `/api/...`) and the raw
/// file host.
async fn fake_github() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let raw_base = format!("http://{}:{}", ALLOWED_HOST, addr.port());

    let app = Router::new()
        .route("/o/r/main/doc.md", get(|| async { DOC }))
        .route("/o/r/main/missing.md", get(|| async { StatusCode::NOT_FOUND }))
        .route("/o/r/main/latin1.md", get(|| async { LATIN1_DOC }))
        .route("/o/r/main/accents.md", get(|| async { "# Ångström\n\nété est chaud\n" }))
        .route(
            "/api/contents/",
            get(move || {
                let raw = raw_base.clone();
                async move {
                    Json(json!([
                        {
                            "name": "other.md",
                            "path": "zz/other.md",
                            "type": "file",
                            "url": "unused",
                            "download_url": format!("{}/o/r/main/zz/other.md", raw),
                        },
                        {
                            "name": "doc.md",
                            "path": "doc.md",
                            "type": "file",
                            "url": "unused",
                            "download_url": format!("{}/o/r/main/doc.md", raw),
                        },
                    ]))
                }
            }),
        )
        .route("/api/empty/", get(|| async { Json(json!([])) }))
        .route(
            "/api/broken/",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// App state whose client sends the allowed host to `upstream`.
fn state_for(upstream: SocketAddr, listing_path: &str) -> Arc<AppState> {
    let http = reqwest::Client::builder()
        .no_proxy()
        .resolve(ALLOWED_HOST, upstream)
        .build()
        .unwrap();
    let config = Config {
        listing_url: format!("http://{}{}", upstream, listing_path),
        ..Config::default()
    };
    Arc::new(AppState::with_client(config, http))
}

fn raw_url(upstream: SocketAddr, path: &str) -> String {
    format!("http://{}:{}{}", ALLOWED_HOST, upstream.port(), path)
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn proxy(state: &Arc<AppState>, url: Option<&str>) -> (StatusCode, String) {
    let response = fetch_markdown(
        Query(FetchQuery {
            url: url.map(str::to_string),
        }),
        State(state.clone()),
    )
    .await;
    let status = response.status();
    (status, body_string(response).await)
}

fn error_of(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).unwrap().error
}

// ============================================================================
// Fetch Proxy
// ============================================================================

#[tokio::test]
async fn test_proxy_requires_url() {
    let state = Arc::new(AppState::with_client(Config::default(), reqwest::Client::new()));

    let (status, body) = proxy(&state, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"URL is required"}"#);

    let (status, body) = proxy(&state, Some("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "URL is required");
}

#[tokio::test]
async fn test_proxy_rejects_other_hosts() {
    let state = Arc::new(AppState::with_client(Config::default(), reqwest::Client::new()));

    for url in [
        "https://evil.com/x.md",
        "https://raw.githubusercontent.com.evil.com/x.md",
        "https://raw.githubusercontent.com@evil.com/x.md",
        "https://gist.raw.githubusercontent.com/x.md",
    ] {
        let (status, body) = proxy(&state, Some(url)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", url);
        assert_eq!(
            error_of(&body),
            "Invalid hostname. Only raw.githubusercontent.com URLs are allowed."
        );
    }
}

#[tokio::test]
async fn test_proxy_rejects_malformed_and_other_schemes() {
    let state = Arc::new(AppState::with_client(Config::default(), reqwest::Client::new()));

    let (status, body) = proxy(&state, Some("not a url")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_of(&body).starts_with("Invalid URL: "));

    let (status, _) = proxy(&state, Some("ftp://raw.githubusercontent.com/x.md")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_proxy_returns_upstream_body() {
    let upstream = fake_github().await;
    let state = state_for(upstream, "/api/contents/");

    let response = fetch_markdown(
        Query(FetchQuery {
            url: Some(raw_url(upstream, "/o/r/main/doc.md")),
        }),
        State(state),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");
    assert_eq!(body_string(response).await, DOC);
}

#[tokio::test]
async fn test_proxy_relays_bytes_unchanged() {
    let upstream = fake_github().await;
    let state = state_for(upstream, "/api/contents/");

    let response = fetch_markdown(
        Query(FetchQuery {
            url: Some(raw_url(upstream, "/o/r/main/latin1.md")),
        }),
        State(state),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], LATIN1_DOC);
}

#[tokio::test]
async fn test_proxy_upstream_status_is_500() {
    let upstream = fake_github().await;
    let state = state_for(upstream, "/api/contents/");

    let (status, body) = proxy(&state, Some(&raw_url(upstream, "/o/r/main/missing.md"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_of(&body), FETCH_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_proxy_unreachable_upstream_is_500() {
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let state = state_for(closed, "/api/contents/");

    let (status, body) = proxy(&state, Some(&raw_url(closed, "/o/r/main/doc.md"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_of(&body), FETCH_FAILED_MESSAGE);
}

// ============================================================================
// Highlight API
// ============================================================================

#[tokio::test]
async fn test_highlight_api() {
    let state = Arc::new(AppState::with_client(Config::default(), reqwest::Client::new()));

    let Json(res) = highlight_code(
        State(state.clone()),
        Json(HighlightRequest {
            lang: Some("rust".to_string()),
            code: "fn main() {}\n".to_string(),
        }),
    )
    .await;
    assert!(res.highlighted);
    assert!(res.html.contains("hljs-"));

    let Json(res) = highlight_code(
        State(state),
        Json(HighlightRequest {
            lang: Some("no-such-language".to_string()),
            code: "<b>x</b>".to_string(),
        }),
    )
    .await;
    assert!(!res.highlighted);
    assert_eq!(res.html, "&lt;b&gt;x&lt;/b&gt;");
}

// ============================================================================
// Viewer Page
// ============================================================================

#[tokio::test]
async fn test_index_renders_first_file() {
    let upstream = fake_github().await;
    let state = state_for(upstream, "/api/contents/");

    let Html(page) = index(Query(IndexQuery { url: None }), State(state)).await;

    assert!(page.contains(r#"<select id="fileSelector""#));
    assert!(page.contains(" selected>doc.md</option>"));
    assert!(page.find(">doc.md<").unwrap() < page.find(">zz/other.md<").unwrap());
    assert!(page.contains(r#"<h1 id="hello">Hello</h1>"#));
    assert!(page.contains(r#"<h2 id="hello-1">Hello</h2>"#));
    assert!(page.contains(r##"<a href="#hello-1" class="toc-level-2">Hello</a>"##));
    assert!(page.contains(r#"data-lang="rust" data-highlighted="true""#));
}

#[tokio::test]
async fn test_index_renders_non_ascii_and_invalid_utf8() {
    let upstream = fake_github().await;
    let state = state_for(upstream, "/api/contents/");

    let Html(page) = index(
        Query(IndexQuery {
            url: Some(raw_url(upstream, "/o/r/main/accents.md")),
        }),
        State(state.clone()),
    )
    .await;
    assert!(page.contains(r#"<h1 id="ångström">Ångström</h1>"#));
    assert!(page.contains("<p>été est chaud</p>"));

    let Html(page) = index(
        Query(IndexQuery {
            url: Some(raw_url(upstream, "/o/r/main/latin1.md")),
        }),
        State(state),
    )
    .await;
    assert!(page.contains("\u{FFFD}t\u{FFFD}\u{FFFD}</h1>"));
}

#[tokio::test]
async fn test_index_shows_load_errors_inline() {
    let upstream = fake_github().await;
    let state = state_for(upstream, "/api/contents/");

    let Html(page) = index(
        Query(IndexQuery {
            url: Some("https://evil.com/x.md".to_string()),
        }),
        State(state.clone()),
    )
    .await;
    assert!(page.contains(r#"<select id="fileSelector""#));
    assert!(page.contains(
        r#"<p class="error-message">Invalid hostname. Only raw.githubusercontent.com URLs are allowed.</p>"#
    ));

    let Html(page) = index(
        Query(IndexQuery {
            url: Some(raw_url(upstream, "/o/r/main/missing.md")),
        }),
        State(state),
    )
    .await;
    assert!(page.contains(FETCH_FAILED_MESSAGE));
}

#[tokio::test]
async fn test_index_listing_failure_and_empty_listing() {
    let upstream = fake_github().await;

    let Html(page) = index(
        Query(IndexQuery { url: None }),
        State(state_for(upstream, "/api/broken/")),
    )
    .await;
    assert!(page.contains(&format!(
        "Error loading file list: GitHub API error! status: 500 for url: http://{}/api/broken/",
        upstream
    )));
    assert!(page.contains("<p>No file selected.</p>"));

    let Html(page) = index(
        Query(IndexQuery { url: None }),
        State(state_for(upstream, "/api/empty/")),
    )
    .await;
    assert!(page.contains("<p>No markdown files found in the repository.</p>"));
}

// ============================================================================
// Through the Router
// ============================================================================

#[tokio::test]
async fn test_routes_through_the_router() {
    let upstream = fake_github().await;
    let viewer = spawn(router(state_for(upstream, "/api/contents/"))).await;
    let http = reqwest::Client::new();
    let proxy_url = |file_url: &str| {
        reqwest::Url::parse_with_params(
            &format!("http://{}/fetch-markdown", viewer),
            &[("url", file_url)],
        )
        .unwrap()
    };

    let response = http
        .get(proxy_url(&raw_url(upstream, "/o/r/main/doc.md")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), DOC);

    let response = http
        .get(proxy_url("https://evil.com/a.md"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(
        error_of(&response.text().await.unwrap()),
        "Invalid hostname. Only raw.githubusercontent.com URLs are allowed."
    );

    let page = http
        .get(format!("http://{}/memos.html", viewer))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains(r#"id="memoList""#));
}
