//! Markdown viewer - serves a GitHub repository's markdown files.
//!
//! This is the main entry point for the viewer web server.
//! The application is organized into the following modules:
//!
//! - `listing`: Repository listing and raw file fetching
//! - `url_validator`: Host allow-list for the fetch proxy
//! - `render`, `toc`, `highlight`: Markdown to HTML with anchors and code highlighting
//! - `scroll`, `memo`, `session`: Auto-scroll, memos and per-page state
//! - `templates`: HTML/CSS/JS templates and rendering
//! - `handlers`: HTTP route handlers

use std::sync::Arc;

use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use mdview::{handlers, AppState, Config};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let state = match AppState::new(config.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            log::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let app = handlers::router(state)
        .fallback_service(ServeDir::new(&config.public_dir))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr = config.addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    log::info!("Markdown viewer running at http://{}", addr);
    log::info!("Listing: {}", config.listing_url);
    log::info!("Static files: {}", config.public_dir.display());

    if let Err(e) = axum::serve(listener, app).await {
        log::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
