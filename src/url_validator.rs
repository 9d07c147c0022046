//! URL validation for the fetch proxy.
//!
//! The proxy only ever talks to one host. A URL is accepted when it:
//! - parses as an absolute URL
//! - uses `http` or `https`
//! - names exactly the allowed host (no subdomains, no suffix matches)
//!
//! The host comes from structured parsing, so `allowed.host.evil.com` and
//! `https://allowed.host@evil.com/` are both seen for what they are.

use url::Url;

/// The only host the proxy fetches from.
pub const ALLOWED_HOST: &str = "raw.githubusercontent.com";

/// Result of URL validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    /// Missing or blank
    Missing,
    /// URL is malformed or cannot be parsed
    InvalidUrl(String),
    /// Scheme other than http/https
    UnsupportedScheme(String),
    /// Host is not the allowed host
    HostNotAllowed(String),
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlValidationError::Missing => write!(f, "URL is required"),
            UrlValidationError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            UrlValidationError::UnsupportedScheme(scheme) => {
                write!(f, "Invalid URL: unsupported scheme '{}'", scheme)
            }
            UrlValidationError::HostNotAllowed(_) => write!(
                f,
                "Invalid hostname. Only {} URLs are allowed.",
                ALLOWED_HOST
            ),
        }
    }
}

impl std::error::Error for UrlValidationError {}

/// Check a host against the allowed host. Case-insensitive; a trailing dot
/// is not treated as the same host.
fn is_host_allowed(host: &str) -> bool {
    host.eq_ignore_ascii_case(ALLOWED_HOST)
}

/// Validate a markdown URL for the proxy.
///
/// # Returns
/// * `Ok(Url)` - The parsed and validated URL
/// * `Err(UrlValidationError)` - If validation fails
pub fn validate_markdown_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url_str = url_str.trim();
    if url_str.is_empty() {
        return Err(UrlValidationError::Missing);
    }

    let url = Url::parse(url_str).map_err(|e| UrlValidationError::InvalidUrl(e.to_string()))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| UrlValidationError::InvalidUrl("No host in URL".to_string()))?;

    if !is_host_allowed(host) {
        log::warn!("Rejected proxy request for host {}", host);
        return Err(UrlValidationError::HostNotAllowed(host.to_string()));
    }

    Ok(url)
}
