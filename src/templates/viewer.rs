//! Viewer page template.
//!
//! The page is rendered on the server (file selector, TOC, content with the
//! first code blocks already highlighted). The inline script handles what
//! has to happen in the browser: navigation on file change, deferred
//! highlighting through `/api/highlight`, auto-scroll and selection memos.
//! The script's tunables come from the same constants the library uses.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::highlight::OBSERVER_ROOT_MARGIN_PX;
use crate::memo::{BUTTON_TIMEOUT, MEMOS_KEY, SELECTION_THROTTLE};
use crate::scroll::{
    ScrollState, BOTTOM_THRESHOLD, FRAME_INTERVAL, MAX_SCROLL_REFRESH_FRAMES, SCROLL_SPEED,
};

use super::components::base_html;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientConfig<'a> {
    current_url: &'a str,
    scroll_speed: f64,
    frame_interval_ms: u64,
    bottom_threshold: f64,
    max_scroll_refresh_frames: u32,
    transitions: BTreeMap<&'static str, Vec<&'static str>>,
    observer_root_margin_px: u32,
    selection_throttle_ms: u64,
    button_timeout_ms: u64,
    memos_key: &'static str,
}

impl<'a> ClientConfig<'a> {
    fn new(current_url: &'a str) -> Self {
        let transitions = [ScrollState::Stopped, ScrollState::Scrolling, ScrollState::AtBottom]
            .into_iter()
            .map(|s| {
                (
                    s.as_str(),
                    s.allowed_transitions().iter().map(|t| t.as_str()).collect(),
                )
            })
            .collect();

        Self {
            current_url,
            scroll_speed: SCROLL_SPEED,
            frame_interval_ms: FRAME_INTERVAL.as_millis() as u64,
            bottom_threshold: BOTTOM_THRESHOLD,
            max_scroll_refresh_frames: MAX_SCROLL_REFRESH_FRAMES,
            transitions,
            observer_root_margin_px: OBSERVER_ROOT_MARGIN_PX,
            selection_throttle_ms: SELECTION_THROTTLE.as_millis() as u64,
            button_timeout_ms: BUTTON_TIMEOUT.as_millis() as u64,
            memos_key: MEMOS_KEY,
        }
    }
}

/// JSON for embedding inside a `<script>` element.
pub(crate) fn script_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/")
}

pub struct ViewerPage<'a> {
    pub selector_html: &'a str,
    pub toc_html: &'a str,
    pub content_html: &'a str,
    pub current_url: Option<&'a str>,
}

// ============================================================================
// Viewer Template
// ============================================================================

pub fn render_viewer(page: &ViewerPage<'_>) -> String {
    let config = ClientConfig::new(page.current_url.unwrap_or(""));

    let body = format!(
        r#"<header class="top-bar">
    <h1>Markdown Viewer</h1>
    <div id="file-selector-container">{selector}</div>
</header>
<div class="layout">
    <nav id="toc-panel">{toc}</nav>
    <main id="content-panel">{content}</main>
</div>
<button id="autoScrollBtn" class="floating-btn" title="Auto Scroll">&#8595;</button>
<button id="memoBtn" class="floating-btn" title="Memos">&#9998;</button>"#,
        selector = page.selector_html,
        toc = page.toc_html,
        content = page.content_html,
    );

    let scripts = format!(
        "<script>window.MDVIEW = {};</script>\n<script>{}</script>",
        script_json(&config),
        VIEWER_JS
    );

    base_html("Markdown Viewer", &body, &scripts)
}

const VIEWER_JS: &str = r##"
(function () {
  const cfg = window.MDVIEW;
  const contentPanel = document.getElementById('content-panel');

  // ---- File selection ----
  const selector = document.getElementById('fileSelector');
  if (selector) {
    selector.addEventListener('change', () => {
      window.location.href = '/?url=' + encodeURIComponent(selector.value);
    });
  }

  // ---- Deferred highlighting ----
  function highlightBlock(code) {
    if (code.dataset.highlighted !== 'false') return;
    code.dataset.highlighted = 'pending';
    fetch('/api/highlight', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ lang: code.dataset.lang || null, code: code.textContent })
    })
      .then(r => r.ok ? r.json() : Promise.reject(new Error('HTTP error! status: ' + r.status)))
      .then(res => {
        code.innerHTML = res.html;
        if (res.highlighted) code.classList.add('hljs');
        code.dataset.highlighted = 'true';
      })
      .catch(err => {
        console.warn('Highlighting failed:', err);
        code.dataset.highlighted = 'true';
      });
  }

  const deferred = contentPanel
    ? contentPanel.querySelectorAll('pre code[data-highlighted="false"]')
    : [];
  if (deferred.length > 0) {
    if ('IntersectionObserver' in window) {
      const observer = new IntersectionObserver(entries => {
        entries.forEach(entry => {
          if (entry.isIntersecting) {
            observer.unobserve(entry.target);
            highlightBlock(entry.target);
          }
        });
      }, { rootMargin: cfg.observerRootMarginPx + 'px' });
      deferred.forEach(code => observer.observe(code));
      window.addEventListener('beforeunload', () => observer.disconnect());
    } else {
      deferred.forEach(highlightBlock);
    }
  }

  // ---- Auto-scroll ----
  const scrollBtn = document.getElementById('autoScrollBtn');
  const scroller = {
    state: 'stopped',
    running: false,
    lastFrame: 0,
    accumulator: 0,
    frames: 0,
    maxScroll: null
  };

  function maxScroll(refresh) {
    if (scroller.maxScroll === null || refresh) {
      scroller.maxScroll = document.documentElement.scrollHeight - window.innerHeight;
    }
    return scroller.maxScroll;
  }

  function transition(to) {
    const allowed = cfg.transitions[scroller.state] || [];
    if (!allowed.includes(to)) {
      console.warn(`Invalid transition from ${scroller.state} to ${to}`);
      return false;
    }
    scroller.state = to;
    if (scrollBtn) {
      scrollBtn.classList.remove('scrolling', 'at-bottom');
      if (to !== 'stopped') scrollBtn.classList.add(to);
      scrollBtn.title = to === 'scrolling' ? 'Stop Auto Scroll' : 'Auto Scroll';
    }
    return true;
  }

  function frame(now) {
    if (!scroller.running || scroller.state !== 'scrolling') {
      scroller.running = false;
      return;
    }
    if (scroller.lastFrame && now - scroller.lastFrame < cfg.frameIntervalMs) {
      requestAnimationFrame(frame);
      return;
    }
    scroller.frames += 1;
    const refresh = scroller.frames >= cfg.maxScrollRefreshFrames;
    if (refresh) scroller.frames = 0;
    const max = maxScroll(refresh);
    const current = window.scrollY;
    if (current >= max - cfg.bottomThreshold) {
      scroller.running = false;
      transition('at-bottom');
      return;
    }
    scroller.accumulator += cfg.scrollSpeed;
    if (scroller.accumulator >= 1) {
      const amount = Math.floor(scroller.accumulator);
      window.scrollTo(0, current + amount);
      scroller.accumulator -= amount;
    }
    scroller.lastFrame = now;
    requestAnimationFrame(frame);
  }

  function start() {
    if (scroller.state === 'scrolling' || !transition('scrolling')) return;
    scroller.running = true;
    scroller.lastFrame = 0;
    scroller.accumulator = 0;
    scroller.frames = 0;
    scroller.maxScroll = null;
    requestAnimationFrame(frame);
  }

  function stop() {
    scroller.running = false;
    if (scroller.state === 'scrolling') transition('stopped');
  }

  if (scrollBtn) {
    scrollBtn.addEventListener('click', () => {
      if (scroller.state === 'scrolling') stop(); else start();
    });
    window.addEventListener('wheel', () => {
      if (scroller.state === 'scrolling') stop();
    }, { passive: true });
    window.addEventListener('scroll', () => {
      const atBottom = window.scrollY >= maxScroll(false) - cfg.bottomThreshold;
      if (scroller.state === 'scrolling' && atBottom) {
        scroller.running = false;
        transition('at-bottom');
      } else if (scroller.state === 'at-bottom' && !atBottom) {
        transition('stopped');
      }
    }, { passive: true });
    window.addEventListener('resize', () => { scroller.maxScroll = null; });
  }

  // ---- Memos ----
  const memoBtn = document.getElementById('memoBtn');
  if (memoBtn) {
    memoBtn.addEventListener('click', () => { window.location.href = '/memos.html'; });
  }

  function saveMemo(content) {
    try {
      const memos = JSON.parse(localStorage.getItem(cfg.memosKey) || '[]');
      memos.push({
        id: Date.now(),
        content: content,
        timestamp: new Date().toISOString(),
        fileUrl: cfg.currentUrl || ''
      });
      localStorage.setItem(cfg.memosKey, JSON.stringify(memos));
    } catch (err) {
      console.error('Error saving memo:', err);
      alert('Could not save the memo.');
    }
  }

  let lastSelection = 0;
  let selectionBtn = null;
  let selectionTimer = null;

  function dismissSelection() {
    if (selectionBtn) selectionBtn.remove();
    selectionBtn = null;
    clearTimeout(selectionTimer);
    selectionTimer = null;
    document.removeEventListener('click', onOutsideClick);
  }

  function onOutsideClick(e) {
    if (selectionBtn && !selectionBtn.contains(e.target)) dismissSelection();
  }

  if (contentPanel) {
    contentPanel.addEventListener('mouseup', event => {
      const now = Date.now();
      if (now - lastSelection < cfg.selectionThrottleMs) return;
      lastSelection = now;

      const text = window.getSelection().toString().trim();
      if (!text) return;

      requestAnimationFrame(() => {
        dismissSelection();
        const btn = document.createElement('button');
        btn.className = 'selection-memo-btn';
        btn.textContent = 'Add memo';
        btn.style.left = (event.pageX || 0) + 'px';
        btn.style.top = ((event.pageY || 0) + 10) + 'px';
        btn.addEventListener('click', e => {
          e.stopPropagation();
          const input = prompt('Add a memo for the selected text:', `"${text}"\n\n`);
          dismissSelection();
          if (input && input.trim()) saveMemo(input.trim());
        });
        document.body.appendChild(btn);
        selectionBtn = btn;
        selectionTimer = setTimeout(dismissSelection, cfg.buttonTimeoutMs);
        setTimeout(() => document.addEventListener('click', onOutsideClick), 0);
      });
    });
  }
})();
"##;
