//! Remote file access: the repository listing over the GitHub contents API
//! and the raw-file fetch behind the proxy.

use std::collections::{HashSet, VecDeque};

use axum::body::Bytes;
use url::Url;

use crate::models::{ContentItem, FileEntry};

pub const USER_AGENT: &str = concat!("mdview/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ListingError {
    /// The API answered with a non-success status.
    Status { status: u16, url: String },
    Request(reqwest::Error),
    Decode { url: String, source: serde_json::Error },
}

impl std::fmt::Display for ListingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingError::Status { status, url } => {
                write!(f, "GitHub API error! status: {} for url: {}", status, url)
            }
            ListingError::Request(e) => write!(f, "request failed: {}", e),
            ListingError::Decode { url, source } => {
                write!(f, "unexpected listing format from {}: {}", url, source)
            }
        }
    }
}

impl std::error::Error for ListingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListingError::Status { .. } => None,
            ListingError::Request(e) => Some(e),
            ListingError::Decode { source, .. } => Some(source),
        }
    }
}

impl From<reqwest::Error> for ListingError {
    fn from(e: reqwest::Error) -> Self {
        ListingError::Request(e)
    }
}

#[derive(Debug)]
pub enum FetchError {
    Request(reqwest::Error),
    /// Upstream answered with a non-success status.
    Status(u16),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Request(e) => write!(f, "request failed: {}", e),
            FetchError::Status(status) => write!(f, "HTTP error! status: {}", status),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Request(e)
    }
}

// ============================================================================
// Repository Listing
// ============================================================================

pub struct ListingClient {
    http: reqwest::Client,
    api_url: String,
    exclude: HashSet<String>,
}

impl ListingClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, exclude: &[&str]) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn fetch_dir(&self, url: &str) -> Result<Vec<ContentItem>, ListingError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ListingError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| ListingError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Walk the repository from the API root, descending into every
    /// directory that is not excluded, and collect the `.md` files in
    /// traversal order.
    pub async fn fetch_files_recursively(&self) -> Result<Vec<FileEntry>, ListingError> {
        let mut queue = VecDeque::from([self.api_url.clone()]);
        let mut files = Vec::new();

        while let Some(url) = queue.pop_front() {
            log::debug!("Listing {}", url);
            for item in self.fetch_dir(&url).await? {
                match item.item_type.as_str() {
                    "dir" if !self.exclude.contains(&item.name) => queue.push_back(item.url),
                    "file" if item.name.ends_with(".md") => match item.download_url {
                        Some(download_url) => files.push(FileEntry {
                            name: item.name,
                            path: item.path,
                            download_url,
                        }),
                        None => log::warn!("Skipping {}: no download URL", item.path),
                    },
                    _ => {}
                }
            }
        }

        Ok(files)
    }

    /// All markdown files, sorted by path.
    pub async fn list_markdown_files(&self) -> Result<Vec<FileEntry>, ListingError> {
        let mut files = self.fetch_files_recursively().await?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        log::info!("Found {} markdown files", files.len());
        Ok(files)
    }
}

// ============================================================================
// Raw File Fetch
// ============================================================================

/// GET a validated upstream URL and return its body exactly as received.
pub async fn fetch_upstream(http: &reqwest::Client, url: &Url) -> Result<Bytes, FetchError> {
    let response = http
        .get(url.clone())
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    Ok(response.bytes().await?)
}
