//! Markdown rendering.
//!
//! A document is parsed once into pulldown-cmark events. Small documents
//! are rendered from those events in a single pass; documents above
//! [`LARGE_FILE_THRESHOLD`] are cut at top-level block boundaries into
//! chunks that are rendered one at a time, so a caller can report progress
//! and yield between chunks. Because every chunk comes from the same parse,
//! link references and footnote numbers resolve across the whole document.
//!
//! While events are written out, headings get their anchor ids, code blocks
//! are captured for the highlighter and table body cells are labelled with
//! their column header for narrow viewports.

use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use tokio::sync::mpsc::UnboundedSender;

use crate::highlight::{detect_language, CodeBlock};
use crate::html::{html_escape, text_content};
use crate::models::{RenderProgress, TocEntry};
use crate::toc::TocBuilder;

/// Inputs larger than this many bytes are rendered in chunks.
pub const LARGE_FILE_THRESHOLD: usize = 512 * 1024;

/// Target size in bytes of one chunk.
pub const CHUNK_SIZE: usize = 30_000;

/// Attribute carrying a code block's index in rendered, not yet
/// highlighted HTML.
pub const BLOCK_MARKER: &str = "data-block";

// ============================================================================
// Markdown Rendering
// ============================================================================

pub(crate) fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

fn sanitize(html: &str) -> String {
    let mut sanitizer = ammonia::Builder::default();
    sanitizer
        .add_tag_attributes("code", &["class", BLOCK_MARKER])
        .add_tag_attributes("td", &["data-label"])
        .add_tag_attributes("div", &["id"])
        .add_tags(&["input"])
        .add_tag_attributes("input", &["type", "checked", "disabled"]);
    for heading in ["h1", "h2", "h3", "h4", "h5", "h6"] {
        sanitizer.add_tag_attributes(heading, &["id"]);
    }
    sanitizer.clean(html).to_string()
}

fn render_events<'a>(events: impl Iterator<Item = Event<'a>>) -> String {
    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, events);
    sanitize(&html_output)
}

/// Render markdown to sanitized HTML, without heading ids or code block
/// capture.
///
/// `class` survives on `<code>` so the `language-*` marker is available to
/// the highlighter, and task list checkboxes are kept.
pub fn render_markdown(content: &str) -> String {
    render_events(Parser::new_ext(content, markdown_options()))
}

pub fn is_large_file(markdown: &str) -> bool {
    markdown.len() > LARGE_FILE_THRESHOLD
}

/// Rough render time estimate used for logging: about 1ms per 10KB, never
/// less than a second.
pub fn estimate_render_time(bytes: usize) -> Duration {
    Duration::from_millis(std::cmp::max(1000, (bytes / 10240) as u64))
}

// ============================================================================
// Chunking
// ============================================================================

type Parsed<'a> = Vec<(Event<'a>, Range<usize>)>;

fn parse(markdown: &str) -> Parsed<'_> {
    Parser::new_ext(markdown, markdown_options())
        .into_offset_iter()
        .collect()
}

/// Byte offsets at which top-level markdown blocks end.
fn block_ends(events: &[(Event<'_>, Range<usize>)]) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut depth = 0usize;

    for (event, range) in events {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    ends.push(range.end);
                }
            }
            _ if depth == 0 => ends.push(range.end),
            _ => {}
        }
    }

    ends
}

/// Offset just past the line containing the byte before `offset`.
fn line_end_after(markdown: &str, offset: usize) -> usize {
    if offset == 0 || markdown.as_bytes().get(offset - 1) == Some(&b'\n') {
        return offset;
    }
    markdown[offset..]
        .find('\n')
        .map(|i| offset + i + 1)
        .unwrap_or(markdown.len())
}

/// End offset of every chunk, the last one being `markdown.len()`.
fn chunk_ends(markdown: &str, events: &[(Event<'_>, Range<usize>)], chunk_size: usize) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut start = 0;

    for end in block_ends(events) {
        let cut = line_end_after(markdown, end);
        if cut > start && cut - start >= chunk_size && cut < markdown.len() {
            ends.push(cut);
            start = cut;
        }
    }

    if start < markdown.len() {
        ends.push(markdown.len());
    }

    ends
}

/// Split markdown into line-bounded chunks of roughly `chunk_size` bytes.
///
/// Cuts are only made at the end of a line where a top-level block ends, so
/// code fences, lists and tables always land in a single chunk. A block
/// larger than `chunk_size` becomes a chunk of its own.
pub fn split_into_chunks(markdown: &str, chunk_size: usize) -> Vec<&str> {
    let mut start = 0;
    chunk_ends(markdown, &parse(markdown), chunk_size)
        .into_iter()
        .map(|end| {
            let chunk = &markdown[start..end];
            start = end;
            chunk
        })
        .collect()
}

/// Event index range of each chunk. Top-level blocks go to the chunk their
/// source starts in; a chunk holding only link definitions gets no events.
fn event_slices(events: &[(Event<'_>, Range<usize>)], chunk_ends: &[usize]) -> Vec<Range<usize>> {
    let mut slices = Vec::with_capacity(chunk_ends.len());
    if chunk_ends.is_empty() {
        return slices;
    }

    let mut start = 0;
    let mut depth = 0usize;
    for (i, (event, range)) in events.iter().enumerate() {
        if depth == 0 {
            while slices.len() + 1 < chunk_ends.len() && range.start >= chunk_ends[slices.len()] {
                slices.push(start..i);
                start = i;
            }
        }
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    while slices.len() < chunk_ends.len() {
        slices.push(start..events.len());
        start = events.len();
    }

    slices
}

// ============================================================================
// Event Rewriting
// ============================================================================

struct PendingHeading<'a> {
    level: HeadingLevel,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    text: String,
    events: Vec<Event<'a>>,
}

struct PendingCode {
    class: Option<String>,
    text: String,
}

#[derive(Default)]
struct TableLabels {
    headers: Vec<String>,
    header_cell: Option<String>,
    in_head: bool,
    cell_index: usize,
}

/// Rewrites a document's events chunk by chunk. State carries over between
/// chunks, so ids, code block indices and footnote numbers are global.
#[derive(Default)]
struct DocumentWriter<'a> {
    toc: TocBuilder,
    code_blocks: Vec<CodeBlock>,
    footnotes: HashMap<String, usize>,
    table: TableLabels,
    heading: Option<PendingHeading<'a>>,
    code: Option<PendingCode>,
}

impl<'a> DocumentWriter<'a> {
    fn render(&mut self, events: &[Event<'a>]) -> String {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            self.rewrite(event.clone(), &mut out);
        }
        render_events(out.into_iter())
    }

    fn emit(&mut self, out: &mut Vec<Event<'a>>, event: Event<'a>) {
        match self.heading.as_mut() {
            Some(heading) => heading.events.push(event),
            None => out.push(event),
        }
    }

    fn rewrite(&mut self, event: Event<'a>, out: &mut Vec<Event<'a>>) {
        if let Some(code) = self.code.as_mut() {
            match event {
                Event::Text(text) => code.text.push_str(&text),
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(code) = self.code.take() {
                        self.finish_code(code, out);
                    }
                }
                _ => {}
            }
            return;
        }

        if let Event::Text(text) | Event::Code(text) = &event {
            if let Some(heading) = self.heading.as_mut() {
                heading.text.push_str(text);
            }
            if let Some(cell) = self.table.header_cell.as_mut() {
                cell.push_str(text);
            }
        }

        match event {
            Event::Start(Tag::Heading {
                level,
                classes,
                attrs,
                ..
            }) => {
                self.heading = Some(PendingHeading {
                    level,
                    classes,
                    attrs,
                    text: String::new(),
                    events: Vec::new(),
                });
            }
            Event::SoftBreak | Event::HardBreak if self.heading.is_some() => {
                if let Some(heading) = self.heading.as_mut() {
                    heading.text.push(' ');
                }
                self.emit(out, event);
            }
            Event::End(TagEnd::Heading(level)) => match self.heading.take() {
                Some(heading) => {
                    let id = self.toc.heading(heading.level as u8, &heading.text);
                    out.push(Event::Start(Tag::Heading {
                        level: heading.level,
                        id: Some(id.into()),
                        classes: heading.classes,
                        attrs: heading.attrs,
                    }));
                    out.extend(heading.events);
                    out.push(Event::End(TagEnd::Heading(level)));
                }
                None => out.push(Event::End(TagEnd::Heading(level))),
            },
            Event::Start(Tag::CodeBlock(kind)) => {
                let class = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(|lang| format!("language-{}", lang)),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(PendingCode {
                    class,
                    text: String::new(),
                });
            }
            Event::Start(Tag::TableHead) => {
                self.table = TableLabels {
                    in_head: true,
                    ..TableLabels::default()
                };
                self.emit(out, Event::Start(Tag::TableHead));
            }
            Event::End(TagEnd::TableHead) => {
                self.table.in_head = false;
                self.emit(out, Event::End(TagEnd::TableHead));
            }
            Event::Start(Tag::TableRow) => {
                self.table.cell_index = 0;
                self.emit(out, Event::Start(Tag::TableRow));
            }
            Event::Start(Tag::TableCell) if self.table.in_head => {
                self.table.header_cell = Some(String::new());
                self.emit(out, Event::Start(Tag::TableCell));
            }
            Event::End(TagEnd::TableCell) if self.table.in_head => {
                if let Some(text) = self.table.header_cell.take() {
                    self.table.headers.push(text.trim().to_string());
                }
                self.emit(out, Event::End(TagEnd::TableCell));
            }
            Event::Start(Tag::TableCell) => {
                let cell = match self.table.headers.get(self.table.cell_index) {
                    Some(label) => format!("<td data-label=\"{}\">", html_escape(label)),
                    None => "<td>".to_string(),
                };
                self.table.cell_index += 1;
                self.emit(out, Event::Html(cell.into()));
            }
            Event::End(TagEnd::TableCell) => self.emit(out, Event::Html("</td>".into())),
            Event::FootnoteReference(name) => {
                let number = self.footnote_number(&name);
                let html = format!(
                    "<sup class=\"footnote-reference\"><a href=\"#{}\">{}</a></sup>",
                    html_escape(&name),
                    number
                );
                self.emit(out, Event::InlineHtml(html.into()));
            }
            Event::Start(Tag::FootnoteDefinition(name)) => {
                let number = self.footnote_number(&name);
                let html = format!(
                    "<div class=\"footnote-definition\" id=\"{}\"><sup class=\"footnote-definition-label\">{}</sup>",
                    html_escape(&name),
                    number
                );
                self.emit(out, Event::Html(html.into()));
            }
            Event::End(TagEnd::FootnoteDefinition) => {
                self.emit(out, Event::Html("</div>\n".into()))
            }
            Event::Html(raw) => self.emit(out, Event::Html(neutralize_markers(raw))),
            Event::InlineHtml(raw) => self.emit(out, Event::InlineHtml(neutralize_markers(raw))),
            other => self.emit(out, other),
        }
    }

    /// Footnotes are numbered by first mention, reference or definition.
    fn footnote_number(&mut self, name: &str) -> usize {
        let next = self.footnotes.len() + 1;
        *self.footnotes.entry(name.to_string()).or_insert(next)
    }

    fn finish_code(&mut self, code: PendingCode, out: &mut Vec<Event<'a>>) {
        let index = self.code_blocks.len();
        let class = code
            .class
            .as_deref()
            .map(|c| format!(" class=\"{}\"", html_escape(c)))
            .unwrap_or_default();
        let html = format!(
            "<pre><code{} {}=\"{}\">{}</code></pre>\n",
            class,
            BLOCK_MARKER,
            index,
            html_escape(&code.text)
        );
        self.emit(out, Event::Html(html.into()));

        self.code_blocks.push(CodeBlock {
            index,
            lang: code.class.as_deref().and_then(detect_language),
            original: code.text,
            highlighted: false,
            recognized: false,
            html: None,
        });
    }
}

/// Rename any block marker in raw HTML from the document, so only code
/// blocks written by the renderer carry one.
fn neutralize_markers(raw: CowStr<'_>) -> CowStr<'_> {
    let lower = raw.to_ascii_lowercase();
    if !lower.contains(BLOCK_MARKER) {
        return raw;
    }

    let mut out = String::with_capacity(raw.len() + 8);
    let mut last = 0;
    for (i, _) in lower.match_indices(BLOCK_MARKER) {
        out.push_str(&raw[last..i]);
        out.push_str("data-raw-block");
        last = i + BLOCK_MARKER.len();
    }
    out.push_str(&raw[last..]);
    out.into()
}

// ============================================================================
// Documents
// ============================================================================

/// How a document should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Chunked above the large file threshold, single pass below it.
    #[default]
    Auto,
    SinglePass,
    Chunked,
}

/// A fully rendered and post-processed document.
#[derive(Debug, Clone, Default)]
pub struct RenderedDocument {
    /// Rendered HTML, one fragment per chunk (a single fragment for a
    /// single-pass render).
    pub fragments: Vec<String>,
    pub toc: Vec<TocEntry>,
    /// Code blocks in document order; their elements carry
    /// [`BLOCK_MARKER`] in `fragments`.
    pub code_blocks: Vec<CodeBlock>,
}

impl RenderedDocument {
    pub fn html(&self) -> String {
        self.fragments.concat()
    }

    pub fn text_content(&self) -> String {
        self.fragments.iter().map(|f| text_content(f)).collect()
    }

    pub fn anchor_ids(&self) -> Vec<&str> {
        self.toc.iter().map(|e| e.id.as_str()).collect()
    }
}

/// An in-progress render. Each call to `next` renders one chunk and
/// reports progress; `finish` renders whatever is left.
pub struct ChunkedRender<'a> {
    events: Vec<Event<'a>>,
    slices: Vec<Range<usize>>,
    fragments: Vec<String>,
    writer: DocumentWriter<'a>,
}

impl<'a> ChunkedRender<'a> {
    pub fn new(markdown: &'a str, chunk_size: usize) -> Self {
        let parsed = parse(markdown);
        let ends = chunk_ends(markdown, &parsed, chunk_size);
        Self::from_parsed(parsed, &ends)
    }

    /// The whole document as one chunk.
    fn single_pass(markdown: &'a str) -> Self {
        Self::from_parsed(parse(markdown), &[markdown.len()])
    }

    fn from_parsed(parsed: Parsed<'a>, chunk_ends: &[usize]) -> Self {
        let slices = event_slices(&parsed, chunk_ends);
        Self {
            events: parsed.into_iter().map(|(event, _)| event).collect(),
            fragments: Vec::with_capacity(slices.len()),
            slices,
            writer: DocumentWriter::default(),
        }
    }

    pub fn total(&self) -> usize {
        self.slices.len()
    }

    pub fn progress(&self) -> RenderProgress {
        RenderProgress {
            current: self.fragments.len(),
            total: self.slices.len(),
        }
    }

    pub fn finish(mut self) -> RenderedDocument {
        while self.next().is_some() {}
        RenderedDocument {
            fragments: self.fragments,
            toc: self.writer.toc.finish(),
            code_blocks: self.writer.code_blocks,
        }
    }
}

impl Iterator for ChunkedRender<'_> {
    type Item = RenderProgress;

    fn next(&mut self) -> Option<RenderProgress> {
        let slice = self.slices.get(self.fragments.len())?.clone();
        let html = self.writer.render(&self.events[slice]);
        self.fragments.push(html);
        Some(self.progress())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub mode: RenderMode,
    pub chunk_size: usize,
    pub large_file_threshold: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            mode: RenderMode::Auto,
            chunk_size: CHUNK_SIZE,
            large_file_threshold: LARGE_FILE_THRESHOLD,
        }
    }
}

impl Renderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn uses_chunks(&self, markdown: &str) -> bool {
        match self.mode {
            RenderMode::Auto => markdown.len() > self.large_file_threshold,
            RenderMode::SinglePass => false,
            RenderMode::Chunked => true,
        }
    }

    pub fn chunked<'a>(&self, markdown: &'a str) -> ChunkedRender<'a> {
        ChunkedRender::new(markdown, self.chunk_size)
    }

    pub fn render(&self, markdown: &str) -> RenderedDocument {
        if self.uses_chunks(markdown) {
            self.chunked(markdown).finish()
        } else {
            ChunkedRender::single_pass(markdown).finish()
        }
    }

    /// Render, yielding to the scheduler between chunks and publishing each
    /// chunk's progress on `progress`.
    pub async fn render_async(
        &self,
        markdown: &str,
        progress: Option<&UnboundedSender<RenderProgress>>,
    ) -> RenderedDocument {
        if !self.uses_chunks(markdown) {
            return self.render(markdown);
        }

        let mut job = self.chunked(markdown);
        log::info!(
            "Large file detected ({:.2} MB), rendering {} chunks (estimated ~{:.1}s)",
            markdown.len() as f64 / 1024.0 / 1024.0,
            job.total(),
            estimate_render_time(markdown.len()).as_secs_f64()
        );

        while let Some(step) = job.next() {
            if let Some(tx) = progress {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(step);
            }
            log::debug!("Rendered chunk {}/{} ({}%)", step.current, step.total, step.percent());
            tokio::task::yield_now().await;
        }

        job.finish()
    }
}

/// Render with default settings for `mode`.
pub fn render_document(markdown: &str, mode: RenderMode) -> RenderedDocument {
    Renderer::new(mode).render(markdown)
}

pub async fn render_document_async(
    markdown: &str,
    mode: RenderMode,
    progress: Option<UnboundedSender<RenderProgress>>,
) -> RenderedDocument {
    Renderer::new(mode)
        .render_async(markdown, progress.as_ref())
        .await
}
