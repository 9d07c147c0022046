//! Data models for the markdown viewer.
//!
//! This module contains the plain data structures shared across the
//! application: remote file listing entries, memos, table of contents
//! entries, render progress events, and the JSON bodies of the HTTP API.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// File Listing
// ============================================================================

/// One item of the GitHub contents API response. Only the fields the lister
/// reads are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub url: String,
    pub download_url: Option<String>,
}

/// A markdown file in the remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub download_url: String,
}

// ============================================================================
// Memos
// ============================================================================

/// A user note, persisted as an element of the JSON array under the
/// `memos` storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    /// Creation time in epoch milliseconds.
    pub id: i64,
    pub content: String,
    /// ISO-8601 timestamp of the last change.
    pub timestamp: String,
    #[serde(rename = "fileUrl", default)]
    pub file_url: String,
}

impl Memo {
    pub fn new(content: impl Into<String>, file_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis(),
            content: content.into(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            file_url: file_url.into(),
        }
    }
}

/// Current time formatted the way memo timestamps are stored.
pub fn memo_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Rendering
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// Progress of a chunked render: `current` of `total` chunks are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderProgress {
    pub current: usize,
    pub total: usize,
}

impl RenderProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

// ============================================================================
// HTTP API Bodies
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightRequest {
    pub lang: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightResponse {
    pub html: String,
    /// Whether a grammar was found for the language; `false` means `html`
    /// is escaped plain text.
    pub highlighted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_json_shape() {
        let memo = Memo {
            id: 1700000000000,
            content: "note".to_string(),
            timestamp: "2023-11-14T22:13:20.000Z".to_string(),
            file_url: "https://raw.githubusercontent.com/a/b/main/x.md".to_string(),
        };
        let json = serde_json::to_value(&memo).unwrap();
        assert_eq!(json["fileUrl"], "https://raw.githubusercontent.com/a/b/main/x.md");
        assert_eq!(json["id"], 1700000000000i64);

        let back: Memo = serde_json::from_str(r#"{"id":1,"content":"c","timestamp":"t"}"#).unwrap();
        assert_eq!(back.file_url, "");
    }

    #[test]
    fn test_memo_new_timestamp_format() {
        let memo = Memo::new("hello", "");
        assert!(memo.timestamp.ends_with('Z'));
        assert_eq!(memo.timestamp.len(), "2023-11-14T22:13:20.000Z".len());
        assert!(memo.id > 0);
    }

    #[test]
    fn test_render_progress() {
        let p = RenderProgress { current: 1, total: 3 };
        assert_eq!(p.percent(), 33);
        assert!(!p.is_complete());
        let done = RenderProgress { current: 3, total: 3 };
        assert_eq!(done.percent(), 100);
        assert!(done.is_complete());
        assert_eq!(RenderProgress { current: 0, total: 0 }.fraction(), 1.0);
    }

    #[test]
    fn test_content_item_deserialize() {
        let item: ContentItem = serde_json::from_str(
            r#"{"name":"docs","path":"docs","type":"dir","url":"https://api/x","download_url":null,"sha":"abc"}"#,
        )
        .unwrap();
        assert_eq!(item.item_type, "dir");
        assert!(item.download_url.is_none());
    }
}
