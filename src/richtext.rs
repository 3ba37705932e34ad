//! Rich text model – the in-memory representation of flowing content.
//!
//! Content is split into two families. [`Block`]s form their own layout
//! area (paragraphs, sections); [`Inline`]s flow inside a paragraph. The two
//! are distinct types, so a block can never be placed where an inline is
//! expected.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Character formatting carried by a [`Span`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TextStyle: u8 {
        const ITALIC = 1 << 0;
        const BOLD = 1 << 1;
        const STRIKETHROUGH = 1 << 2;
        const UNDERLINE = 1 << 3;
        const SUBSCRIPT = 1 << 4;
        const SUPERSCRIPT = 1 << 5;
    }
}

/// Target of a hyperlink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NavigateUri {
    /// A URI with a scheme, e.g. `https://example.com/`.
    Absolute(String),
    /// A reference resolved against the document location, e.g. `../a.html`.
    Relative(String),
}

impl NavigateUri {
    pub fn as_str(&self) -> &str {
        match self {
            NavigateUri::Absolute(s) | NavigateUri::Relative(s) => s,
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, NavigateUri::Absolute(_))
    }
}

/// Spacing around a paragraph, in points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thickness {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Thickness {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }
}

/// Content that flows within a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Run { text: String },
    LineBreak,
    Span(Span),
    Hyperlink(Hyperlink),
}

/// A styled group of inlines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default)]
    pub inlines: Vec<Inline>,
}

/// A group of inlines that navigates somewhere when activated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hyperlink {
    #[serde(default)]
    pub uri: Option<NavigateUri>,
    #[serde(default)]
    pub inlines: Vec<Inline>,
}

/// Structural content that forms its own layout area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Section(Section),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub inlines: Vec<Inline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<Thickness>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Inline {
    pub fn run(text: impl Into<String>) -> Self {
        Inline::Run { text: text.into() }
    }

    /// Concatenated text of this inline; line breaks become `\n`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Inline::Run { text } => out.push_str(text),
            Inline::LineBreak => out.push('\n'),
            Inline::Span(span) => span.inlines.iter().for_each(|i| i.push_text(out)),
            Inline::Hyperlink(link) => link.inlines.iter().for_each(|i| i.push_text(out)),
        }
    }
}

impl From<Span> for Inline {
    fn from(span: Span) -> Self {
        Inline::Span(span)
    }
}

impl From<Hyperlink> for Inline {
    fn from(link: Hyperlink) -> Self {
        Inline::Hyperlink(link)
    }
}

impl Span {
    pub fn new(inlines: Vec<Inline>) -> Self {
        Self {
            style: TextStyle::empty(),
            inlines,
        }
    }

    pub fn styled(style: TextStyle, inlines: Vec<Inline>) -> Self {
        Self { style, inlines }
    }
}

impl Hyperlink {
    pub fn new(uri: Option<NavigateUri>, inlines: Vec<Inline>) -> Self {
        Self { uri, inlines }
    }
}

impl Paragraph {
    pub fn new(inlines: Vec<Inline>) -> Self {
        Self {
            inlines,
            ..Self::default()
        }
    }

    /// A paragraph holding a single run of text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Inline::run(text)])
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn with_margin(mut self, margin: Thickness) -> Self {
        self.margin = Some(margin);
        self
    }

    pub fn plain_text(&self) -> String {
        self.inlines.iter().map(Inline::plain_text).collect()
    }
}

impl From<Paragraph> for Block {
    fn from(paragraph: Paragraph) -> Self {
        Block::Paragraph(paragraph)
    }
}

impl From<Section> for Block {
    fn from(section: Section) -> Self {
        Block::Section(section)
    }
}

impl Section {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All paragraphs in document order, descending into nested sections.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs(&self.blocks, &mut out);
        out
    }
}

fn collect_paragraphs<'a>(blocks: &'a [Block], out: &mut Vec<&'a Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p),
            Block::Section(s) => collect_paragraphs(&s.blocks, out),
        }
    }
}
