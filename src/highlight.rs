//! Syntax highlighting for rendered code blocks.
//!
//! [`Highlighter`] turns one block of source into class-based HTML with
//! syntect. [`LazyHighlighter`] tracks the code blocks of one rendered
//! document: the first few are highlighted right away, the rest wait until
//! the viewer reports them as near the viewport.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::html::html_escape;
use crate::render::{RenderedDocument, BLOCK_MARKER};

/// Number of blocks highlighted as soon as a document is rendered.
pub const IMMEDIATE_HIGHLIGHT_COUNT: usize = 5;

/// Root margin, in pixels, the viewer uses when observing deferred blocks.
pub const OBSERVER_ROOT_MARGIN_PX: u32 = 100;

// ============================================================================
// Highlighter
// ============================================================================

/// Result of highlighting one block.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlighted {
    pub html: String,
    /// Whether a grammar was found; `false` means `html` is escaped text.
    pub recognized: bool,
}

pub struct Highlighter {
    syntax_set: SyntaxSet,
}

impl Highlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    fn find_syntax(&self, lang: &str) -> Option<&SyntaxReference> {
        self.syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.find_syntax(lang).is_some()
    }

    /// Highlight `code` as `lang`. Unknown or missing languages, and any
    /// highlighting failure, fall back to escaped plain text.
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> Highlighted {
        let Some(syntax) = lang.and_then(|l| self.find_syntax(l)) else {
            return Highlighted {
                html: html_escape(code),
                recognized: false,
            };
        };

        match self.highlight_with(code, syntax) {
            Ok(html) => Highlighted {
                html,
                recognized: true,
            },
            Err(e) => {
                log::warn!("Error highlighting {} code block: {}", syntax.name, e);
                Highlighted {
                    html: html_escape(code),
                    recognized: false,
                }
            }
        }
    }

    fn highlight_with(
        &self,
        code: &str,
        syntax: &SyntaxReference,
    ) -> Result<String, syntect::Error> {
        if code.is_empty() {
            return Ok(String::new());
        }

        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::SpacedPrefixed { prefix: "hljs-" },
        );
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        Ok(generator.finalize())
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

/// Language named by a `language-xxx` class, as markdown renderers emit on
/// fenced code blocks.
pub fn detect_language(class_attr: &str) -> Option<String> {
    static LANGUAGE_CLASS: OnceLock<Regex> = OnceLock::new();
    let re = LANGUAGE_CLASS.get_or_init(|| {
        Regex::new(r"language-(\w+)").expect("language class pattern is valid")
    });
    re.captures(class_attr).map(|c| c[1].to_string())
}

// ============================================================================
// Lazy Highlighting
// ============================================================================

/// Per-block highlight record.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub index: usize,
    pub lang: Option<String>,
    pub original: String,
    pub highlighted: bool,
    pub recognized: bool,
    pub html: Option<String>,
}

/// Highlight state for the code blocks of one rendered document.
pub struct LazyHighlighter {
    highlighter: Arc<Highlighter>,
    blocks: Vec<CodeBlock>,
    observed: BTreeSet<usize>,
}

impl LazyHighlighter {
    /// Take over the code blocks captured while `document` was rendered.
    /// Nothing is highlighted yet.
    pub fn prepare(document: &RenderedDocument, highlighter: Arc<Highlighter>) -> Self {
        Self {
            highlighter,
            blocks: document.code_blocks.clone(),
            observed: BTreeSet::new(),
        }
    }

    pub fn blocks(&self) -> &[CodeBlock] {
        &self.blocks
    }

    /// Highlight the first [`IMMEDIATE_HIGHLIGHT_COUNT`] blocks and start
    /// observing the rest. Returns how many were highlighted.
    pub fn highlight_eager(&mut self) -> usize {
        let immediate = IMMEDIATE_HIGHLIGHT_COUNT.min(self.blocks.len());
        let mut count = 0;
        for index in 0..immediate {
            if self.highlight_block(index) {
                count += 1;
            }
        }
        for index in immediate..self.blocks.len() {
            if !self.blocks[index].highlighted {
                self.observed.insert(index);
            }
        }
        log::debug!(
            "Highlighted first {} code blocks, {} deferred",
            count,
            self.observed.len()
        );
        count
    }

    pub fn is_observed(&self, index: usize) -> bool {
        self.observed.contains(&index)
    }

    pub fn observed(&self) -> impl Iterator<Item = usize> + '_ {
        self.observed.iter().copied()
    }

    /// A block came near the viewport. Highlights it if it is observed and
    /// not yet highlighted, then stops observing it. Returns the new HTML
    /// when something was highlighted.
    pub fn on_intersect(&mut self, index: usize) -> Option<&str> {
        if !self.observed.remove(&index) {
            return None;
        }
        if !self.highlight_block(index) {
            return None;
        }
        self.blocks[index].html.as_deref()
    }

    /// Stop observing everything (a new document is being loaded).
    pub fn disconnect(&mut self) {
        self.observed.clear();
    }

    fn highlight_block(&mut self, index: usize) -> bool {
        let Some(block) = self.blocks.get_mut(index) else {
            return false;
        };
        if block.highlighted {
            return false;
        }

        let result = self
            .highlighter
            .highlight(&block.original, block.lang.as_deref());
        block.html = Some(result.html);
        block.recognized = result.recognized;
        block.highlighted = true;
        true
    }

    /// Write the current block state into `html` (the document the
    /// highlighter was prepared from): highlighted content where available,
    /// plus `data-index`, `data-lang` and `data-highlighted` attributes the
    /// viewer uses to drive deferred highlighting.
    pub fn apply(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len() + self.blocks.len() * 64);
        let mut rest = html;

        for block in &self.blocks {
            let marker = format!(" {}=\"{}\"", BLOCK_MARKER, block.index);
            let Some(at) = rest.find(&marker) else {
                log::warn!("Code block {} missing from rendered document", block.index);
                continue;
            };
            let (Some(open), Some(close)) = (
                rest[..at].rfind("<code"),
                rest[at..].find("</code>").map(|i| at + i + "</code>".len()),
            ) else {
                continue;
            };

            out.push_str(&rest[..open]);
            out.push_str(&code_element(block));
            rest = &rest[close..];
        }

        out.push_str(rest);
        out
    }
}

fn code_element(block: &CodeBlock) -> String {
    let mut class = block
        .lang
        .as_deref()
        .map(|lang| format!("language-{}", lang))
        .unwrap_or_default();
    if block.recognized {
        if !class.is_empty() {
            class.push(' ');
        }
        class.push_str("hljs");
    }

    let mut out = String::from("<code");
    if !class.is_empty() {
        out.push_str(&format!(" class=\"{}\"", html_escape(&class)));
    }
    out.push_str(&format!(
        " data-index=\"{}\" data-lang=\"{}\" data-highlighted=\"{}\">",
        block.index,
        html_escape(block.lang.as_deref().unwrap_or("")),
        block.highlighted
    ));
    match &block.html {
        Some(highlighted) => out.push_str(highlighted),
        None => out.push_str(&html_escape(&block.original)),
    }
    out.push_str("</code>");
    out
}
