//! Per-page viewer state.
//!
//! [`ViewerSession`] owns everything that changes while a page is open: the
//! loaded document and its code blocks, the auto-scroller, the memo book
//! and the selection button. Loads are split into [`ViewerSession::begin_load`]
//! and [`ViewerSession::complete_load`] so a fetch can run in between; each
//! load gets a token and only the latest one is ever rendered.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use crate::highlight::{Highlighter, LazyHighlighter};
use crate::memo::{MemoBook, MemoError, SelectionTracker, Storage};
use crate::models::Memo;
use crate::render::{RenderedDocument, Renderer};
use crate::scroll::{AutoScroller, Viewport};
use crate::toc::render_toc_html;

/// Handle for one in-flight load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    token: u64,
    url: String,
}

impl LoadTicket {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Rendered,
    /// A newer load was started; this result was dropped.
    Stale,
    /// Fetching failed; the message is shown in place of the content.
    Failed(String),
}

/// A rendered document together with its code block state.
pub struct LoadedDocument {
    pub url: String,
    pub document: RenderedDocument,
    pub code: LazyHighlighter,
}

pub struct ViewerSession<V: Viewport, S: Storage> {
    renderer: Renderer,
    highlighter: Arc<Highlighter>,
    scroller: AutoScroller<V>,
    memos: MemoBook<S>,
    selection: SelectionTracker,
    load_token: u64,
    loaded: Option<LoadedDocument>,
    error: Option<String>,
}

impl<V: Viewport, S: Storage> ViewerSession<V, S> {
    pub fn new(viewport: V, storage: S, highlighter: Arc<Highlighter>) -> Self {
        Self {
            renderer: Renderer::default(),
            highlighter,
            scroller: AutoScroller::new(viewport),
            memos: MemoBook::new(storage),
            selection: SelectionTracker::new(),
            load_token: 0,
            loaded: None,
            error: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Start loading `url`: stop auto-scroll, ignore scroll events until the
    /// new content is in, and drop the previous document's code blocks.
    pub fn begin_load(&mut self, url: &str) -> LoadTicket {
        self.scroller.disable_scroll_handling();
        self.scroller.stop();
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.code.disconnect();
        }
        self.loaded = None;
        self.error = None;

        self.load_token += 1;
        log::debug!("Load #{} started: {}", self.load_token, url);
        LoadTicket {
            token: self.load_token,
            url: url.to_string(),
        }
    }

    /// Finish the load for `ticket` with the fetched markdown (or the fetch
    /// error). Results for anything but the latest ticket are discarded.
    pub fn complete_load<E: Display>(
        &mut self,
        ticket: LoadTicket,
        result: Result<String, E>,
    ) -> LoadOutcome {
        if ticket.token != self.load_token {
            log::debug!(
                "Discarding stale load #{} (latest is #{})",
                ticket.token,
                self.load_token
            );
            return LoadOutcome::Stale;
        }

        let markdown = match result {
            Ok(markdown) => markdown,
            Err(e) => {
                let message = e.to_string();
                log::error!("Failed to load {}: {}", ticket.url, message);
                self.error = Some(message.clone());
                self.scroller.enable_scroll_handling();
                return LoadOutcome::Failed(message);
            }
        };

        let started = Instant::now();
        let document = self.renderer.render(&markdown);
        let mut code = LazyHighlighter::prepare(&document, self.highlighter.clone());
        let eager = code.highlight_eager();
        log::info!(
            "Rendered {} ({:.2} KB) in {:?}: {} headings, {} code blocks ({} highlighted now)",
            ticket.url,
            markdown.len() as f64 / 1024.0,
            started.elapsed(),
            document.toc.len(),
            code.blocks().len(),
            eager
        );

        self.loaded = Some(LoadedDocument {
            url: ticket.url,
            document,
            code,
        });

        self.scroller.invalidate_max_scroll();
        self.scroller.enable_scroll_handling();
        self.scroller.reset_for_reload();
        LoadOutcome::Rendered
    }

    pub fn loaded(&self) -> Option<&LoadedDocument> {
        self.loaded.as_ref()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.url.as_str())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Content HTML with the current code block state applied.
    pub fn content_html(&self) -> Option<String> {
        self.loaded
            .as_ref()
            .map(|l| l.code.apply(&l.document.html()))
    }

    pub fn toc_html(&self) -> String {
        match &self.loaded {
            Some(l) => render_toc_html(&l.document.toc),
            None => String::new(),
        }
    }

    /// Code block `index` scrolled into view. Returns `true` if it was
    /// highlighted by this call.
    pub fn on_intersect(&mut self, index: usize) -> bool {
        self.loaded
            .as_mut()
            .and_then(|l| l.code.on_intersect(index))
            .is_some()
    }

    // ========================================================================
    // Scrolling and Memos
    // ========================================================================

    pub fn scroller(&mut self) -> &mut AutoScroller<V> {
        &mut self.scroller
    }

    pub fn memos(&mut self) -> &mut MemoBook<S> {
        &mut self.memos
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn on_selection(&mut self, now: Instant, text: &str, x: f64, y: f64) -> bool {
        self.selection.on_selection(now, text, x, y).is_some()
    }

    pub fn tick(&mut self, now: Instant) {
        self.selection.tick(now);
    }

    /// Add a memo typed by hand, tagged with the current file.
    pub fn add_memo(&mut self, content: &str) -> Result<Memo, MemoError> {
        let file_url = self.current_url().unwrap_or_default().to_string();
        self.memos.add(content, &file_url)
    }

    /// The selection memo prompt was submitted with `input`. Returns the
    /// new memo, or `None` if the input was blank.
    pub fn add_memo_from_selection(&mut self, input: &str) -> Result<Option<Memo>, MemoError> {
        match self.selection.confirm(input) {
            Some(content) => self.add_memo(&content).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::MemoryStorage;
    use crate::scroll::ScrollState;

    struct Page {
        top: f64,
        max: f64,
    }

    impl Viewport for Page {
        fn scroll_top(&self) -> f64 {
            self.top
        }
        fn set_scroll_top(&mut self, top: f64) {
            self.top = top.clamp(0.0, self.max);
        }
        fn max_scroll(&self) -> f64 {
            self.max
        }
    }

    fn session() -> ViewerSession<Page, MemoryStorage> {
        ViewerSession::new(
            Page { top: 0.0, max: 5000.0 },
            MemoryStorage::new(),
            Arc::new(Highlighter::new()),
        )
    }

    fn ok(md: &str) -> Result<String, String> {
        Ok(md.to_string())
    }

    #[test]
    fn test_latest_load_wins() {
        let mut s = session();
        let first = s.begin_load("https://raw.githubusercontent.com/o/r/main/a.md");
        let second = s.begin_load("https://raw.githubusercontent.com/o/r/main/b.md");
        assert!(second.token() > first.token());

        assert_eq!(s.complete_load(first, ok("# A")), LoadOutcome::Stale);
        assert!(s.loaded().is_none());

        assert_eq!(s.complete_load(second, ok("# B")), LoadOutcome::Rendered);
        assert_eq!(s.current_url(), Some("https://raw.githubusercontent.com/o/r/main/b.md"));
        assert!(s.content_html().unwrap().contains(r#"<h1 id="b">B</h1>"#));
        assert!(s.toc_html().contains(r##"href="#b""##));
    }

    #[test]
    fn test_failed_load_keeps_session_usable() {
        let mut s = session();
        let ticket = s.begin_load("u");
        let outcome = s.complete_load(ticket, Err::<String, _>("HTTP error! status: 404"));
        assert_eq!(outcome, LoadOutcome::Failed("HTTP error! status: 404".to_string()));
        assert_eq!(s.error(), Some("HTTP error! status: 404"));
        assert!(s.scroller().scroll_handling_enabled());

        let ticket = s.begin_load("v");
        assert_eq!(s.error(), None);
        assert_eq!(s.complete_load(ticket, ok("text")), LoadOutcome::Rendered);
    }

    #[test]
    fn test_load_resets_scrolling() {
        let mut s = session();
        s.scroller().start();
        s.scroller().viewport_mut().top = 1200.0;

        let ticket = s.begin_load("u");
        assert_eq!(s.scroller().state(), ScrollState::Stopped);
        assert!(!s.scroller().scroll_handling_enabled());

        s.complete_load(ticket, ok("# Doc"));
        assert!(s.scroller().scroll_handling_enabled());
        assert_eq!(s.scroller().viewport().top, 0.0);
        assert_eq!(s.scroller().state(), ScrollState::Stopped);
    }

    #[test]
    fn test_code_blocks_highlight_lazily() {
        let mut s = session();
        let md: String = (0..7)
            .map(|i| format!("```rust\nlet x{} = {};\n```\n\n", i, i))
            .collect();
        let ticket = s.begin_load("u");
        s.complete_load(ticket, Ok::<_, String>(md));

        let loaded = s.loaded().unwrap();
        let done = loaded.code.blocks().iter().filter(|b| b.highlighted).count();
        assert_eq!(done, 5);

        assert!(s.on_intersect(6));
        assert!(!s.on_intersect(6));
        assert!(!s.on_intersect(99));
        assert!(s.content_html().unwrap().contains(r#"data-index="6" data-lang="rust" data-highlighted="true""#));
    }

    #[test]
    fn test_selection_memo_tagged_with_current_file() {
        let mut s = session();
        let ticket = s.begin_load("https://raw.githubusercontent.com/o/r/main/a.md");
        s.complete_load(ticket, ok("Some *text* here."));

        assert!(s.on_selection(Instant::now(), "text", 10.0, 10.0));
        let prefill = s.selection().prefill().unwrap();
        let memo = s
            .add_memo_from_selection(&format!("{}remember this", prefill))
            .unwrap()
            .unwrap();
        assert_eq!(memo.content, "\"text\"\n\nremember this");
        assert_eq!(memo.file_url, "https://raw.githubusercontent.com/o/r/main/a.md");
        assert!(s.selection().button().is_none());

        assert_eq!(s.add_memo_from_selection("  ").unwrap(), None);
        assert_eq!(s.memos().list().len(), 1);
    }
}
