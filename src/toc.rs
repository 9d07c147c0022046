//! Table of contents generation.
//!
//! Headings are taken from the markdown event stream in document order,
//! given a text-derived anchor id (a "slug") that is unique within the
//! document, and collected into a flat list of links tagged with their
//! level. The renderer writes the same ids onto the heading elements.

use std::collections::HashSet;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use crate::html::html_escape;
use crate::models::TocEntry;
use crate::render::markdown_options;

// ============================================================================
// Slugs
// ============================================================================

/// Derive an anchor slug from heading text: trimmed, lower-cased,
/// whitespace runs collapsed to `-`, everything except alphanumerics, `_`
/// and `-` dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut in_space = false;

    for c in text.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if c.is_alphanumeric() || c == '_' || c == '-' {
            slug.extend(c.to_lowercase());
        }
    }

    slug
}

/// Tracks ids already handed out in a document.
#[derive(Debug, Default)]
pub struct SlugRegistry {
    used: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a unique id for `slug`: the slug itself if free, otherwise the
    /// first free `slug-N` counting from 1.
    pub fn claim(&mut self, slug: &str) -> String {
        let base = if slug.is_empty() { "section" } else { slug };
        let mut id = base.to_string();
        let mut counter = 1;
        while self.used.contains(&id) {
            id = format!("{}-{}", base, counter);
            counter += 1;
        }
        self.used.insert(id.clone());
        id
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

// ============================================================================
// Heading Ids
// ============================================================================

/// Hands out heading ids in document order and records one entry per
/// heading.
#[derive(Debug, Default)]
pub struct TocBuilder {
    registry: SlugRegistry,
    entries: Vec<TocEntry>,
}

impl TocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heading and return its unique anchor id.
    pub fn heading(&mut self, level: u8, text: &str) -> String {
        let text = text.trim();
        let id = self.registry.claim(&slugify(text));
        self.entries.push(TocEntry {
            level,
            id: id.clone(),
            text: text.to_string(),
        });
        id
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn finish(self) -> Vec<TocEntry> {
        self.entries
    }
}

/// Table of contents for a markdown document, with the same ids the
/// renderer assigns.
pub fn generate_toc(markdown: &str) -> Vec<TocEntry> {
    let mut toc = TocBuilder::new();
    let mut current: Option<(u8, String)> = None;

    for event in Parser::new_ext(markdown, markdown_options()) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => current = Some((level as u8, String::new())),
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, heading)) = current.as_mut() {
                    heading.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, heading)) = current.as_mut() {
                    heading.push(' ');
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, heading)) = current.take() {
                    toc.heading(level, &heading);
                }
            }
            _ => {}
        }
    }

    toc.finish()
}

// ============================================================================
// TOC Rendering
// ============================================================================

pub fn render_toc_html(entries: &[TocEntry]) -> String {
    if entries.is_empty() {
        return "<p>No headings found.</p>".to_string();
    }

    let mut html = String::from("<ul>");
    for entry in entries {
        html.push_str(&format!(
            r##"<li><a href="#{id}" class="toc-level-{level}">{text}</a></li>"##,
            id = html_escape(&entry.id),
            level = entry.level,
            text = html_escape(&entry.text),
        ));
    }
    html.push_str("</ul>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(markdown: &str) -> Vec<String> {
        generate_toc(markdown).into_iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Intro"), "intro");
        assert_eq!(slugify("  Getting   Started  "), "getting-started");
        assert_eq!(slugify("What's new? (v2.0)"), "whats-new-v20");
        assert_eq!(slugify("snake_case and-dash"), "snake_case-and-dash");
        assert_eq!(slugify("운영체제 개요"), "운영체제-개요");
        assert_eq!(slugify("Ångström"), "ångström");
    }

    #[test]
    fn test_duplicate_headings_get_suffix() {
        assert_eq!(ids("# Intro\n\n# Intro\n"), vec!["intro", "intro-1"]);
        assert_eq!(ids("## A\n\n## A\n\n## A\n"), vec!["a", "a-1", "a-2"]);
    }

    #[test]
    fn test_suffix_skips_taken_ids() {
        assert_eq!(
            ids("## Intro 1\n\n## Intro\n\n## Intro\n"),
            vec!["intro-1", "intro", "intro-2"]
        );
    }

    #[test]
    fn test_empty_slug_falls_back() {
        assert_eq!(ids("## !!!\n\n## ???\n"), vec!["section", "section-1"]);
    }

    #[test]
    fn test_ids_stable_across_runs() {
        let md = "# Title\n\nx\n\n## Part\n\n### Part\n\n## Title\n";
        let first = ids(md);
        assert_eq!(first, ids(md));
        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn test_heading_with_inline_markup() {
        let entries = generate_toc("## Using `cargo` & *friends*\n");
        assert_eq!(entries[0].text, "Using cargo & friends");
        assert_eq!(entries[0].id, "using-cargo--friends");
        assert_eq!(entries[0].level, 2);
    }

    #[test]
    fn test_setext_and_deep_headings() {
        let entries = generate_toc("Title\n=====\n\n###### Six\n\nNot a # heading\n");
        let levels: Vec<_> = entries.iter().map(|e| (e.level, e.id.as_str())).collect();
        assert_eq!(levels, vec![(1, "title"), (6, "six")]);
    }

    #[test]
    fn test_headings_in_code_are_ignored() {
        assert_eq!(ids("```\n# not a heading\n```\n\n# Real\n"), vec!["real"]);
    }

    #[test]
    fn test_builder_claims_in_order() {
        let mut toc = TocBuilder::new();
        assert_eq!(toc.heading(1, " Setup "), "setup");
        assert_eq!(toc.heading(2, "Setup"), "setup-1");
        assert_eq!(toc.entries()[0].text, "Setup");
        assert_eq!(toc.finish().len(), 2);
    }

    #[test]
    fn test_render_toc_html() {
        let entries = vec![
            TocEntry {
                level: 1,
                id: "intro".to_string(),
                text: "Intro".to_string(),
            },
            TocEntry {
                level: 3,
                id: "a-b".to_string(),
                text: "A <b>".to_string(),
            },
        ];
        let html = render_toc_html(&entries);
        assert!(html.contains(r##"<a href="#intro" class="toc-level-1">Intro</a>"##));
        assert!(html.contains(r##"<a href="#a-b" class="toc-level-3">A &lt;b&gt;</a>"##));
        assert_eq!(render_toc_html(&[]), "<p>No headings found.</p>");
    }
}
