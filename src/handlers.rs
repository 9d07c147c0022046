//! HTTP route handlers for the web application.
//!
//! This module contains the route handlers for the viewer: the viewer page,
//! the markdown fetch proxy, the highlight API used for deferred code
//! blocks, and the memo page.

use crate::highlight::LazyHighlighter;
use crate::listing::{fetch_upstream, FetchError, ListingClient};
use crate::models::{ErrorBody, FileEntry, HighlightRequest, HighlightResponse};
use crate::templates::{error_message, file_selector, notice, render_memos_page, render_viewer, ViewerPage};
use crate::toc::render_toc_html;
use crate::url_validator::{validate_markdown_url, UrlValidationError};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Body of every upstream failure; details only go to the log.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch markdown from the provided URL.";

/// Routes of the application, without static files or middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/fetch-markdown", get(fetch_markdown))
        .route("/api/highlight", post(highlight_code))
        .route("/memos.html", get(memos_page))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Document Loading
// ============================================================================

#[derive(Debug)]
pub enum LoadError {
    Invalid(UrlValidationError),
    Fetch(FetchError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Invalid(e) => write!(f, "{}", e),
            LoadError::Fetch(_) => write!(f, "{}", FETCH_FAILED_MESSAGE),
        }
    }
}

impl std::error::Error for LoadError {}

/// A document rendered for the viewer page.
pub struct LoadedPage {
    pub content_html: String,
    pub toc_html: String,
}

/// Fetch `url` through the same checks as the proxy, render it, and apply
/// eager highlighting.
pub async fn load_document(state: &AppState, url: &str) -> Result<LoadedPage, LoadError> {
    let url = validate_markdown_url(url).map_err(LoadError::Invalid)?;

    let started = Instant::now();
    let body = fetch_upstream(&state.http, &url).await.map_err(|e| {
        log::error!("Error fetching markdown from {}: {}", url, e);
        LoadError::Fetch(e)
    })?;
    let fetched = started.elapsed();
    let markdown = String::from_utf8_lossy(&body);

    let document = state.renderer.render_async(&markdown, None).await;
    let html = document.html();
    let mut code = LazyHighlighter::prepare(&document, state.highlighter.clone());
    code.highlight_eager();

    log::info!(
        "Loaded {} ({:.2} KB): fetched in {:?}, total {:?}",
        url,
        markdown.len() as f64 / 1024.0,
        fetched,
        started.elapsed()
    );

    Ok(LoadedPage {
        content_html: code.apply(&html),
        toc_html: render_toc_html(&document.toc),
    })
}

// ============================================================================
// Index Handler
// ============================================================================

#[derive(Deserialize)]
pub struct IndexQuery {
    pub url: Option<String>,
}

pub async fn index(
    Query(query): Query<IndexQuery>,
    State(state): State<Arc<AppState>>,
) -> Html<String> {
    let listing = ListingClient::new(
        state.http.clone(),
        state.config.listing_url.clone(),
        &state.config.exclude_folders(),
    );

    let files: Result<Vec<FileEntry>, String> = listing
        .list_markdown_files()
        .await
        .map_err(|e| {
            log::error!("Error loading file list: {}", e);
            e.to_string()
        });

    let requested = query.url.filter(|u| !u.trim().is_empty());
    let selected = requested.or_else(|| {
        files
            .as_ref()
            .ok()
            .and_then(|f| f.first())
            .map(|f| f.download_url.clone())
    });

    let selector_html = match &files {
        Ok(files) if files.is_empty() => notice("No markdown files found in the repository."),
        Ok(files) => file_selector(files, selected.as_deref()),
        Err(msg) => error_message(&format!("Error loading file list: {}", msg)),
    };

    let (content_html, toc_html) = match selected.as_deref() {
        None => (notice("No file selected."), String::new()),
        Some(url) => match load_document(&state, url).await {
            Ok(page) => (page.content_html, page.toc_html),
            Err(e) => (error_message(&e.to_string()), String::new()),
        },
    };

    Html(render_viewer(&ViewerPage {
        selector_html: &selector_html,
        toc_html: &toc_html,
        content_html: &content_html,
        current_url: selected.as_deref(),
    }))
}

// ============================================================================
// Fetch Proxy
// ============================================================================

#[derive(Deserialize)]
pub struct FetchQuery {
    pub url: Option<String>,
}

pub async fn fetch_markdown(
    Query(query): Query<FetchQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let url = match validate_markdown_url(query.url.as_deref().unwrap_or("")) {
        Ok(url) => url,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match fetch_upstream(&state.http, &url).await {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "public, max-age=300"),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            log::error!("Error fetching markdown from {}: {}", url, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED_MESSAGE)
        }
    }
}

// ============================================================================
// Highlight API
// ============================================================================

pub async fn highlight_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HighlightRequest>,
) -> Json<HighlightResponse> {
    let lang = body.lang.as_deref().filter(|l| !l.is_empty());
    let result = state.highlighter.highlight(&body.code, lang);
    Json(HighlightResponse {
        html: result.html,
        highlighted: result.recognized,
    })
}

// ============================================================================
// Memo Page
// ============================================================================

pub async fn memos_page() -> Html<String> {
    Html(render_memos_page())
}

#[cfg(test)]
#[path = "handlers_test.rs"]
mod handlers_test;
