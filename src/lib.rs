//! Markdown viewer library - re-exports for testing and external use.
//!
//! Every piece of the viewer is a plain Rust type here: the repository
//! listing, the proxy's URL validation, the renderer with its table of
//! contents and lazy highlighter, the auto-scroll state machine, the memo
//! store, and the session object that ties them together for one page.
//! The binary in `main.rs` serves them over HTTP.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod handlers;
pub mod highlight;
pub mod html;
pub mod listing;
pub mod memo;
pub mod models;
pub mod render;
pub mod scroll;
pub mod session;
pub mod templates;
pub mod toc;
pub mod url_validator;

// ============================================================================
// Configuration
// ============================================================================

pub const GITHUB_API_URL: &str = "https://api.github.com/repos/b-blocks/StudyMaterials/contents/";
pub const EXCLUDE_FOLDERS: &[&str] = &[".obsidian", ".git", "scripts"];
pub const PUBLIC_DIR: &str = "public";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub highlighter: Arc<Highlighter>,
    pub renderer: Renderer,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self::with_client(config, http))
    }

    /// State around an already configured HTTP client.
    pub fn with_client(config: Config, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            highlighter: Arc::new(Highlighter::new()),
            renderer: Renderer::default(),
        }
    }
}

// Re-export commonly used types
pub use config::{Config, ConfigError};

pub use models::{
    ContentItem, ErrorBody, FileEntry, HighlightRequest, HighlightResponse, Memo, RenderProgress,
    TocEntry,
};

pub use render::{
    render_document, render_document_async, render_markdown, split_into_chunks, ChunkedRender,
    RenderMode, RenderedDocument, Renderer, CHUNK_SIZE, LARGE_FILE_THRESHOLD,
};

pub use toc::{generate_toc, render_toc_html, slugify, SlugRegistry, TocBuilder};

pub use highlight::{detect_language, CodeBlock, Highlighter, LazyHighlighter};

pub use scroll::{AutoScroller, FrameOutcome, ScrollState, StateChange, StateMachine, Viewport};

pub use memo::{
    CommandHistory, MemoBook, MemoCommand, MemoError, MemoStore, MemoryStorage, SelectionTracker,
    Storage,
};

pub use listing::{fetch_upstream, FetchError, ListingClient, ListingError};

pub use session::{LoadOutcome, LoadTicket, ViewerSession};

pub use url_validator::{validate_markdown_url, UrlValidationError, ALLOWED_HOST};
