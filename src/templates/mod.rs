//! HTML templates and styling for the markdown viewer.
//!
//! This module contains all CSS styles, JavaScript code, and HTML
//! generation functions for the web interface.
//!
//! ## Module Structure
//!
//! - `styles` - CSS constants and theme definitions
//! - `components` - Shared HTML components (file selector, messages, base template)
//! - `viewer` - Viewer page with the client-side scroll, highlight and memo script
//! - `memos` - Memo list page backed by local storage

mod components;
mod memos;
mod styles;
mod viewer;

pub use components::{base_html, error_message, file_selector, notice};
pub use memos::render_memos_page;
pub use styles::STYLE;
pub use viewer::{render_viewer, ViewerPage};
