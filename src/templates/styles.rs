//! CSS styles for the markdown viewer.
//!
//! Contains the main STYLE constant shared by the viewer and memo pages.

// ============================================================================
// CSS Styles
// ============================================================================

pub const STYLE: &str = r#"
/* Solarized Light Theme */
:root {
    --base03: #002b36;
    --base02: #073642;
    --base01: #586e75;
    --base00: #657b83;
    --base1: #93a1a1;
    --base2: #eee8d5;
    --base3: #fdf6e3;

    --yellow: #b58900;
    --orange: #cb4b16;
    --red: #dc322f;
    --magenta: #d33682;
    --violet: #6c71c4;
    --blue: #268bd2;
    --cyan: #2aa198;
    --green: #859900;

    --bg: var(--base3);
    --fg: var(--base00);
    --muted: var(--base1);
    --border: var(--base2);
    --link: var(--blue);
    --link-hover: var(--cyan);
    --code-bg: var(--base2);
}

* { box-sizing: border-box; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    margin: 0;
    background: var(--bg);
    color: var(--fg);
    line-height: 1.6;
}

a { color: var(--link); text-decoration: none; }
a:hover { color: var(--link-hover); text-decoration: underline; }

/* Header and file selector */
.top-bar {
    display: flex;
    align-items: center;
    gap: 1rem;
    padding: 0.75rem 1.5rem;
    border-bottom: 1px solid var(--border);
    background: var(--bg);
    position: sticky;
    top: 0;
    z-index: 100;
}
.top-bar h1 { font-size: 1.1rem; margin: 0; color: var(--base01); }
#file-selector-container { flex: 1; }
#fileSelector {
    width: 100%;
    max-width: 40rem;
    padding: 0.35rem 0.5rem;
    border: 1px solid var(--base1);
    border-radius: 4px;
    background: var(--base3);
    color: var(--base01);
    font-size: 0.9rem;
}

/* Layout */
.layout {
    display: flex;
    gap: 2rem;
    max-width: 1200px;
    margin: 0 auto;
    padding: 1.5rem;
}
#toc-panel {
    flex: 0 0 240px;
    position: sticky;
    top: 4rem;
    align-self: flex-start;
    max-height: calc(100vh - 5rem);
    overflow-y: auto;
    font-size: 0.85rem;
}
#toc-panel ul { list-style: none; padding: 0; margin: 0; }
#toc-panel li { margin: 0.2rem 0; }
.toc-level-1 { font-weight: 600; }
.toc-level-2 { padding-left: 0.75rem; }
.toc-level-3 { padding-left: 1.5rem; }
.toc-level-4 { padding-left: 2.25rem; }
.toc-level-5 { padding-left: 3rem; }
.toc-level-6 { padding-left: 3.75rem; }
#content-panel { flex: 1; min-width: 0; max-width: 820px; }

.error-message {
    color: var(--red);
    background: #fbeaea;
    border-left: 3px solid var(--red);
    padding: 0.75rem 1rem;
}

/* Markdown content */
#content-panel h1, #content-panel h2 {
    border-bottom: 1px solid var(--border);
    padding-bottom: 0.3rem;
    color: var(--base01);
}
#content-panel blockquote {
    margin: 1rem 0;
    padding: 0.25rem 1rem;
    border-left: 3px solid var(--base1);
    color: var(--base01);
}
#content-panel code {
    background: var(--code-bg);
    padding: 0.1rem 0.3rem;
    border-radius: 3px;
    font-size: 0.9em;
}
#content-panel pre {
    background: var(--code-bg);
    padding: 0.75rem 1rem;
    border-radius: 4px;
    overflow-x: auto;
}
pre code {
    white-space: pre-wrap !important;
    word-break: break-all;
    display: block;
    max-height: 7.5em;
    overflow-y: auto;
    padding: 0 !important;
}
#content-panel img { max-width: 100%; }

/* Tables; cells carry data-label for narrow screens */
#content-panel table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
#content-panel th, #content-panel td {
    border: 1px solid var(--border);
    padding: 0.4rem 0.6rem;
    text-align: left;
}
#content-panel th { background: var(--base2); color: var(--base01); }

/* Syntax highlighting */
.hljs-comment { color: var(--base1); font-style: italic; }
.hljs-keyword, .hljs-storage { color: var(--green); }
.hljs-string { color: var(--cyan); }
.hljs-constant, .hljs-numeric { color: var(--magenta); }
.hljs-entity, .hljs-function { color: var(--blue); }
.hljs-support, .hljs-type { color: var(--yellow); }
.hljs-variable { color: var(--orange); }
.hljs-invalid { color: var(--red); }
.hljs-punctuation { color: var(--base01); }

/* Floating buttons */
.floating-btn {
    position: fixed;
    right: 1.5rem;
    width: 3rem;
    height: 3rem;
    border-radius: 50%;
    border: none;
    background: var(--base01);
    color: var(--base3);
    font-size: 1.2rem;
    cursor: pointer;
    box-shadow: 0 2px 8px rgba(0, 0, 0, 0.25);
    z-index: 1000;
}
#autoScrollBtn { bottom: 5rem; }
#autoScrollBtn.scrolling { background: var(--orange); }
#autoScrollBtn.at-bottom { background: var(--green); }
#memoBtn { bottom: 1.5rem; }

.selection-memo-btn {
    position: absolute;
    padding: 0.25rem 0.6rem;
    border: none;
    border-radius: 4px;
    background: var(--yellow);
    color: var(--base3);
    font-size: 0.8rem;
    cursor: pointer;
    box-shadow: 0 2px 6px rgba(0, 0, 0, 0.2);
    z-index: 1001;
}

/* Memo page */
.memo-page { max-width: 820px; margin: 0 auto; padding: 1.5rem; }
.memo-toolbar { display: flex; gap: 0.5rem; margin-bottom: 1rem; }
.memo-toolbar button, .memo-actions button {
    padding: 0.3rem 0.75rem;
    border: 1px solid var(--base1);
    border-radius: 4px;
    background: var(--base3);
    color: var(--base01);
    cursor: pointer;
}
.memo-item {
    border: 1px solid var(--border);
    border-radius: 4px;
    padding: 0.75rem 1rem;
    margin-bottom: 0.75rem;
}
.memo-content { white-space: pre-wrap; margin: 0 0 0.5rem; }
.memo-meta { font-size: 0.8rem; color: var(--muted); }
.memo-edit-form textarea { width: 100%; min-height: 6rem; font: inherit; }
.memo-empty-message { color: var(--muted); }
.hidden { display: none !important; }

@media (max-width: 768px) {
    .layout { display: block; padding: 0.75rem 5px; }
    #toc-panel { position: static; max-height: none; margin-bottom: 1rem; }
    #content-panel { max-width: none; }

    #content-panel table, #content-panel tbody, #content-panel tr, #content-panel td {
        display: block;
        width: 100%;
    }
    #content-panel thead { display: none; }
    #content-panel td { border: none; border-bottom: 1px solid var(--border); }
    #content-panel td[data-label]::before {
        content: attr(data-label);
        display: block;
        font-weight: 600;
        color: var(--base01);
    }
}
"#;
