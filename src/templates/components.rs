//! Shared HTML components for the viewer.
//!
//! Contains the file selector, inline messages, and the base HTML template.

use crate::html::html_escape;
use crate::models::FileEntry;

use super::styles::STYLE;

// ============================================================================
// File Selector
// ============================================================================

/// `<select>` over `files`, with the entry whose download URL is `selected`
/// pre-selected.
pub fn file_selector(files: &[FileEntry], selected: Option<&str>) -> String {
    let mut html = String::from(r#"<select id="fileSelector" aria-label="Markdown file">"#);

    for file in files {
        let is_selected = selected == Some(file.download_url.as_str());
        html.push_str(&format!(
            r#"<option value="{url}"{sel}>{path}</option>"#,
            url = html_escape(&file.download_url),
            sel = if is_selected { " selected" } else { "" },
            path = html_escape(&file.path),
        ));
    }

    html.push_str("</select>");
    html
}

// ============================================================================
// Messages
// ============================================================================

pub fn error_message(message: &str) -> String {
    format!(r#"<p class="error-message">{}</p>"#, html_escape(message))
}

pub fn notice(message: &str) -> String {
    format!("<p>{}</p>", html_escape(message))
}

// ============================================================================
// Base HTML Template
// ============================================================================

pub fn base_html(title: &str, body: &str, scripts: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
{body}
{scripts}
</body>
</html>"#,
        title = html_escape(title),
        style = STYLE,
        body = body,
        scripts = scripts,
    )
}
