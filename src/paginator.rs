//! Paginator collaborator – slices a flowing [`Section`] into page-sized
//! chunks.
//!
//! The [`Paginator`] trait is callback based: each request takes a
//! [`oneshot::Sender`] that the paginator completes when the answer is
//! ready, either immediately or later from another task. [`page_count`] and
//! [`fetch_page`] turn those callbacks into futures.
//!
//! [`TextPaginator`] is the built-in implementation. It wraps styled runs
//! word by word and fills pages line by line; a line never splits across
//! pages, and a page always takes at least one line.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::RenderError;
use crate::fonts::{FontManager, SCRIPT_SCALE};
use crate::layout_config::{LayoutBox, TextContent, TextLine, TextSegment};
use crate::richtext::{Inline, NavigateUri, Paragraph, Section, TextStyle, Thickness};

/// Default body font size in points.
pub const DEFAULT_FONT_SIZE: f32 = 11.0;
/// Space after a paragraph that does not set its own margin.
pub const DEFAULT_PARAGRAPH_SPACING: f32 = 6.0;

/// Page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// One page of flowing content. Box positions are relative to the page
/// origin, i.e. the top-left of the content region it is placed into.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentPage {
    pub size: PageSize,
    pub boxes: Vec<LayoutBox>,
}

pub type PageCountCallback = oneshot::Sender<Result<usize, String>>;
pub type PageCallback = oneshot::Sender<Result<DocumentPage, String>>;

/// Splits flowing content into pages.
pub trait Paginator: Send {
    /// Size of the area each page is laid out into.
    fn set_page_size(&mut self, size: PageSize);

    /// Report the number of pages for the current page size.
    fn compute_page_count(&mut self, done: PageCountCallback);

    /// Produce the page at `index` (0-based).
    fn get_page(&mut self, index: usize, done: PageCallback);
}

/// Creates a paginator for a bound content section.
pub trait PaginatorSource: Send + Sync {
    fn create(&self, content: Section) -> Box<dyn Paginator>;
}

/// Await the page count of `paginator`.
pub async fn page_count(paginator: &mut dyn Paginator) -> Result<usize, RenderError> {
    let (tx, rx) = oneshot::channel();
    paginator.compute_page_count(tx);
    rx.await
        .map_err(|_| RenderError::PaginatorAborted)?
        .map_err(RenderError::Paginator)
}

/// Await page `index` of `paginator`.
pub async fn fetch_page(paginator: &mut dyn Paginator, index: usize) -> Result<DocumentPage, RenderError> {
    let (tx, rx) = oneshot::channel();
    paginator.get_page(index, tx);
    rx.await
        .map_err(|_| RenderError::PaginatorAborted)?
        .map_err(RenderError::Paginator)
}

// ---------------------------------------------------------------------------
// Built-in text paginator
// ---------------------------------------------------------------------------

/// Typography for [`TextPaginator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextOptions {
    pub font_size: f32,
    pub paragraph_spacing: f32,
    pub color: [f32; 4],
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            paragraph_spacing: DEFAULT_PARAGRAPH_SPACING,
            color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Creates [`TextPaginator`]s sharing one set of fonts.
#[derive(Clone, Default)]
pub struct TextPaginatorSource {
    fonts: Arc<FontManager>,
    options: TextOptions,
}

impl TextPaginatorSource {
    pub fn new(fonts: Arc<FontManager>, options: TextOptions) -> Self {
        Self { fonts, options }
    }
}

impl PaginatorSource for TextPaginatorSource {
    fn create(&self, content: Section) -> Box<dyn Paginator> {
        Box::new(TextPaginator::new(content, Arc::clone(&self.fonts), self.options))
    }
}

/// Paginates paragraphs of a section with greedy line filling.
pub struct TextPaginator {
    content: Section,
    fonts: Arc<FontManager>,
    options: TextOptions,
    size: PageSize,
    pages: Option<Vec<Vec<LayoutBox>>>,
}

impl TextPaginator {
    pub fn new(content: Section, fonts: Arc<FontManager>, options: TextOptions) -> Self {
        Self {
            content,
            fonts,
            options,
            size: PageSize::default(),
            pages: None,
        }
    }

    fn pages(&mut self) -> Result<&[Vec<LayoutBox>], String> {
        if self.pages.is_none() {
            if !(self.size.width > 0.0 && self.size.height > 0.0) {
                return Err(format!(
                    "page size {}x{} has no area",
                    self.size.width, self.size.height
                ));
            }
            let pages = paginate(&self.content, self.size, &self.fonts, &self.options);
            log::debug!(
                "text paginator produced {} page(s) at {}x{}",
                pages.len(),
                self.size.width,
                self.size.height
            );
            self.pages = Some(pages);
        }
        Ok(self.pages.as_deref().unwrap_or_default())
    }
}

impl Paginator for TextPaginator {
    fn set_page_size(&mut self, size: PageSize) {
        if size != self.size {
            self.size = size;
            self.pages = None;
        }
    }

    fn compute_page_count(&mut self, done: PageCountCallback) {
        let _ = done.send(self.pages().map(|p| p.len()));
    }

    fn get_page(&mut self, index: usize, done: PageCallback) {
        let size = self.size;
        let result = self.pages().and_then(|pages| {
            pages
                .get(index)
                .map(|boxes| DocumentPage {
                    size,
                    boxes: boxes.clone(),
                })
                .ok_or_else(|| format!("page {index} out of range ({} pages)", pages.len()))
        });
        let _ = done.send(result);
    }
}

/// A paragraph wrapped to a width, before it is split across pages.
struct WrappedParagraph {
    lines: Vec<TextLine>,
    line_height: f32,
    margin: Thickness,
}

fn paginate(
    content: &Section,
    size: PageSize,
    fonts: &FontManager,
    options: &TextOptions,
) -> Vec<Vec<LayoutBox>> {
    let mut pages = Vec::new();
    let mut current: Vec<LayoutBox> = Vec::new();
    let mut y = 0.0f32;

    for paragraph in content.paragraphs() {
        let margin = paragraph
            .margin
            .unwrap_or(Thickness::new(0.0, 0.0, 0.0, options.paragraph_spacing));
        let width = (size.width - margin.left - margin.right).max(1.0);
        let wrapped = wrap_paragraph(paragraph, margin, width, fonts, options);

        if !current.is_empty() {
            y += wrapped.margin.top;
        }
        let mut fragment: Vec<TextLine> = Vec::new();
        let mut fragment_y = y;

        for mut line in wrapped.lines {
            let overflows = y + wrapped.line_height > size.height;
            if overflows && (!current.is_empty() || !fragment.is_empty()) {
                flush_fragment(&mut current, &mut fragment, fragment_y, width, &wrapped.margin, wrapped.line_height, options);
                pages.push(std::mem::take(&mut current));
                y = 0.0;
                fragment_y = 0.0;
            }
            line.y_offset = y - fragment_y;
            fragment.push(line);
            y += wrapped.line_height;
        }
        flush_fragment(&mut current, &mut fragment, fragment_y, width, &wrapped.margin, wrapped.line_height, options);
        y += wrapped.margin.bottom;
    }

    if !current.is_empty() {
        pages.push(current);
    }
    pages
}

fn flush_fragment(
    page: &mut Vec<LayoutBox>,
    fragment: &mut Vec<TextLine>,
    y: f32,
    width: f32,
    margin: &Thickness,
    line_height: f32,
    options: &TextOptions,
) {
    if fragment.is_empty() {
        return;
    }
    let lines = std::mem::take(fragment);
    let mut lbox = LayoutBox::new(margin.left, y, width, lines.len() as f32 * line_height);
    lbox.text = Some(TextContent {
        lines,
        color: options.color,
        line_height,
    });
    page.push(lbox);
}

/// An unbreakable piece of styled text.
#[derive(Debug, Clone)]
struct Atom {
    text: String,
    style: TextStyle,
    link: Option<String>,
}

fn flatten(inlines: &[Inline], style: TextStyle, link: Option<&str>, out: &mut Vec<Option<Atom>>) {
    for inline in inlines {
        match inline {
            Inline::Run { text } => {
                for chunk in text.split_inclusive(' ') {
                    out.push(Some(Atom {
                        text: chunk.to_string(),
                        style,
                        link: link.map(str::to_string),
                    }));
                }
            }
            Inline::LineBreak => out.push(None),
            Inline::Span(span) => flatten(&span.inlines, style | span.style, link, out),
            Inline::Hyperlink(h) => {
                let target = h.uri.as_ref().map(NavigateUri::as_str).or(link);
                flatten(&h.inlines, style, target, out);
            }
        }
    }
}

fn wrap_paragraph(
    paragraph: &Paragraph,
    margin: Thickness,
    max_width: f32,
    fonts: &FontManager,
    options: &TextOptions,
) -> WrappedParagraph {
    let base = paragraph.font_size.unwrap_or(options.font_size);
    let mut flat = Vec::new();
    flatten(&paragraph.inlines, TextStyle::empty(), None, &mut flat);

    let mut lines = Vec::new();
    for segment in flat.split(Option::is_none) {
        let atoms: Vec<&Atom> = segment.iter().flatten().collect();
        wrap_atoms(&atoms, base, max_width, fonts, &mut lines);
    }

    WrappedParagraph {
        lines,
        line_height: fonts.line_height(base),
        margin,
    }
}

fn metrics(style: TextStyle, base: f32) -> (f32, f32) {
    if style.contains(TextStyle::SUPERSCRIPT) {
        (base * SCRIPT_SCALE, base * 0.33)
    } else if style.contains(TextStyle::SUBSCRIPT) {
        (base * SCRIPT_SCALE, -base * 0.15)
    } else {
        (base, 0.0)
    }
}

/// Greedy line filling over the atoms of one line-break-delimited segment.
fn wrap_atoms(atoms: &[&Atom], base: f32, max_width: f32, fonts: &FontManager, out: &mut Vec<TextLine>) {
    let measure = |atom: &Atom, text: &str| {
        let (size, _) = metrics(atom.style, base);
        fonts.measure(text, size, atom.style)
    };

    // Words end after an atom ending in a space.
    let mut words: Vec<Vec<&Atom>> = Vec::new();
    let mut word: Vec<&Atom> = Vec::new();
    for &atom in atoms {
        word.push(atom);
        if atom.text.ends_with(' ') {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    let mut line: Vec<&Atom> = Vec::new();
    let mut line_width = 0.0f32;
    for word in words {
        let full: f32 = word.iter().map(|&a| measure(a, &a.text)).sum();
        let trailing = word
            .last()
            .map(|&a| measure(a, &a.text) - measure(a, a.text.trim_end_matches(' ')))
            .unwrap_or(0.0);
        if !line.is_empty() && line_width + full - trailing > max_width {
            out.push(build_line(&line, base, fonts));
            line.clear();
            line_width = 0.0;
        }
        line.extend(word);
        line_width += full;
    }
    out.push(build_line(&line, base, fonts));
}

/// Merge adjacent atoms of equal style into positioned segments.
fn build_line(atoms: &[&Atom], base: f32, fonts: &FontManager) -> TextLine {
    let mut segments: Vec<TextSegment> = Vec::new();
    let last = atoms.len().saturating_sub(1);
    let mut x = 0.0f32;
    for (i, atom) in atoms.iter().enumerate() {
        let text = if i == last {
            atom.text.trim_end_matches(' ')
        } else {
            atom.text.as_str()
        };
        if text.is_empty() {
            continue;
        }
        let (size, rise) = metrics(atom.style, base);
        let width = fonts.measure(text, size, atom.style);
        match segments.last_mut() {
            Some(seg) if seg.style == atom.style && seg.link == atom.link => {
                seg.text.push_str(text);
                seg.width += width;
            }
            _ => segments.push(TextSegment {
                text: text.to_string(),
                x_offset: x,
                width,
                font_size: size,
                rise,
                style: atom.style,
                link: atom.link.clone(),
            }),
        }
        x += width;
    }
    TextLine {
        y_offset: 0.0,
        segments,
    }
}
