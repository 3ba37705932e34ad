//! HTML → rich text conversion.
//!
//! Elements from a fixed vocabulary map to rich text nodes; every other
//! node contributes its text content, with whitespace runs collapsed to a
//! single space. Top-level inlines are gathered into implicit paragraphs and
//! every paragraph is whitespace-normalized (see [`crate::normalize`]).

use std::io::{self, Read};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::{body_children, parse_html_bytes, DomNode, ElementNode, Tag};
use crate::error::{ConvertError, NotFoundError};
use crate::normalize::{is_blank, normalize_paragraph};
use crate::richtext::{
    Block, Hyperlink, Inline, NavigateUri, Paragraph, Section, Span, TextStyle, Thickness,
};

/// Font sizes for `h1`..`h6`, in points.
pub const HEADING_FONT_SIZES: [f32; 6] = [24.0, 18.0, 13.5, 12.0, 10.0, 7.5];

/// Horizontal indent applied to both sides of a `blockquote`.
pub const BLOCKQUOTE_INDENT: f32 = 40.0;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid regex"));

/// Converts HTML into a [`Section`].
pub struct HtmlConverter;

impl HtmlConverter {
    /// Convert an HTML string.
    pub fn convert_str(html: &str) -> Result<Section, ConvertError> {
        Self::convert_bytes(html.as_bytes())
    }

    /// Convert UTF-8 encoded HTML bytes.
    pub fn convert_bytes(bytes: &[u8]) -> Result<Section, ConvertError> {
        let nodes = parse_html_bytes(bytes)?;
        let body = body_children(&nodes);
        log::debug!("converting {} top-level HTML nodes", body.len());
        Ok(assemble(&body))
    }

    /// Read all of `reader` and convert it.
    pub fn convert_reader<R: Read>(mut reader: R) -> Result<Section, ConvertError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::convert_bytes(&bytes)
    }

    /// Load and convert an HTML file.
    pub fn convert_file(path: impl AsRef<Path>) -> Result<Section, ConvertError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| file_error(path, e))?;
        Self::convert_bytes(&bytes)
    }

    /// Load and convert an HTML file without blocking the async runtime.
    pub async fn convert_file_async(path: impl AsRef<Path>) -> Result<Section, ConvertError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| file_error(path, e))?;
        Self::convert_bytes(&bytes)
    }

    /// Retrieve and convert the HTML at `uri`. `file:` URIs are read from
    /// disk; anything else is fetched over HTTP(S). A 404 response is a
    /// [`NotFoundError`].
    pub async fn convert_uri_async(uri: &str) -> Result<Section, ConvertError> {
        let invalid = |message: String| ConvertError::InvalidUri {
            uri: uri.to_string(),
            message,
        };
        let url = reqwest::Url::parse(uri).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|()| invalid("not a local file path".to_string()))?;
            return Self::convert_file_async(path).await;
        }

        let retrieval = |source: reqwest::Error| ConvertError::Retrieval {
            uri: uri.to_string(),
            source,
        };
        let response = reqwest::get(url).await.map_err(retrieval)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(NotFoundError::Uri(uri.to_string()).into());
        }
        let bytes = response
            .error_for_status()
            .map_err(retrieval)?
            .bytes()
            .await
            .map_err(retrieval)?;
        log::debug!("retrieved {} bytes of HTML from {uri}", bytes.len());
        Self::convert_bytes(&bytes)
    }
}

fn file_error(path: &Path, error: io::Error) -> ConvertError {
    if error.kind() == io::ErrorKind::NotFound {
        NotFoundError::File(path.to_path_buf()).into()
    } else {
        ConvertError::Io(error)
    }
}

// ---------------------------------------------------------------------------
// Node conversion
// ---------------------------------------------------------------------------

/// Result of converting one DOM node.
#[derive(Debug, Clone, PartialEq)]
enum Converted {
    Block(Block),
    Inline(Inline),
}

fn convert_node(node: &DomNode) -> Converted {
    match node {
        DomNode::Element(element) => convert_element(element),
        DomNode::Text(_) => passthrough(node),
    }
}

fn convert_element(element: &ElementNode) -> Converted {
    let styled = |style: TextStyle| {
        Converted::Inline(Span::styled(style, inline_children(&element.children)).into())
    };
    match element.tag {
        Tag::Br => Converted::Inline(Inline::LineBreak),
        Tag::P => Converted::Block(paragraph(&element.children).into()),
        Tag::Heading(level) => {
            let size = HEADING_FONT_SIZES[usize::from(level.clamp(1, 6)) - 1];
            let p = paragraph(&element.children)
                .with_font_size(size)
                .with_margin(Thickness::default());
            Converted::Block(p.into())
        }
        Tag::Blockquote => {
            let margin = Thickness::new(BLOCKQUOTE_INDENT, 0.0, BLOCKQUOTE_INDENT, 0.0);
            Converted::Block(paragraph(&element.children).with_margin(margin).into())
        }
        Tag::Span => styled(TextStyle::empty()),
        Tag::I | Tag::Em => styled(TextStyle::ITALIC),
        Tag::B | Tag::Strong => styled(TextStyle::BOLD),
        Tag::U => styled(TextStyle::UNDERLINE),
        Tag::S | Tag::Strike => styled(TextStyle::STRIKETHROUGH),
        Tag::Sub => styled(TextStyle::SUBSCRIPT),
        Tag::Sup => styled(TextStyle::SUPERSCRIPT),
        Tag::Q => {
            let mut inlines = vec![Inline::run("\"")];
            inlines.extend(inline_children(&element.children));
            inlines.push(Inline::run("\""));
            Converted::Inline(Span::new(inlines).into())
        }
        Tag::A => {
            let uri = parse_uri(element.attribute("href"));
            Converted::Inline(Hyperlink::new(uri, inline_children(&element.children)).into())
        }
        Tag::Body | Tag::Html | Tag::Head | Tag::Other(_) => {
            passthrough(&DomNode::Element(element.clone()))
        }
    }
}

/// Text content of the node with whitespace runs collapsed.
fn passthrough(node: &DomNode) -> Converted {
    let text = WHITESPACE.replace_all(&node.text_content(), " ").into_owned();
    Converted::Inline(Inline::Run { text })
}

/// Convert children for an inline context; blocks contribute their inlines.
fn inline_children(children: &[DomNode]) -> Vec<Inline> {
    let mut out = Vec::new();
    for child in children {
        match convert_node(child) {
            Converted::Inline(inline) => out.push(inline),
            Converted::Block(block) => flatten_block(block, &mut out),
        }
    }
    out
}

fn flatten_block(block: Block, out: &mut Vec<Inline>) {
    match block {
        Block::Paragraph(p) => out.extend(p.inlines),
        Block::Section(s) => s.blocks.into_iter().for_each(|b| flatten_block(b, out)),
    }
}

fn paragraph(children: &[DomNode]) -> Paragraph {
    let mut p = Paragraph::new(inline_children(children));
    normalize_paragraph(&mut p);
    p
}

/// Parse an `href` value as an absolute or relative URI.
fn parse_uri(href: Option<&str>) -> Option<NavigateUri> {
    let href = href?.trim();
    if href.is_empty() {
        return None;
    }
    let illegal = |c: char| {
        c.is_whitespace()
            || c.is_control()
            || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`')
    };
    if href.chars().any(illegal) || !valid_percent_escapes(href) {
        log::debug!("ignoring unparsable hyperlink target {href:?}");
        return None;
    }
    match SCHEME.find(href) {
        Some(scheme) => {
            let rest = &href[scheme.end()..];
            if let Some(authority) = rest.strip_prefix("//") {
                let host = authority.split(['/', '?', '#']).next().unwrap_or("");
                if host.is_empty() && !href.to_ascii_lowercase().starts_with("file:") {
                    return None;
                }
            }
            Some(NavigateUri::Absolute(href.to_string()))
        }
        None => Some(NavigateUri::Relative(href.to_string())),
    }
}

fn valid_percent_escapes(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let ok = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !ok {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Top-level assembly
// ---------------------------------------------------------------------------

/// Whether inlines are being gathered into an implicit paragraph.
enum AssemblyState {
    NoOpenParagraph,
    Accumulating(Vec<Inline>),
}

/// Turns a stream of converted nodes into section blocks.
struct SectionAssembler {
    state: AssemblyState,
    blocks: Vec<Block>,
}

impl SectionAssembler {
    fn new() -> Self {
        Self {
            state: AssemblyState::NoOpenParagraph,
            blocks: Vec::new(),
        }
    }

    fn see_block(&mut self, block: Block) {
        self.flush();
        self.blocks.push(block);
    }

    fn see_inline(&mut self, inline: Inline) {
        match &mut self.state {
            AssemblyState::NoOpenParagraph => {
                self.state = AssemblyState::Accumulating(vec![inline]);
            }
            AssemblyState::Accumulating(inlines) => inlines.push(inline),
        }
    }

    fn flush(&mut self) {
        let state = std::mem::replace(&mut self.state, AssemblyState::NoOpenParagraph);
        if let AssemblyState::Accumulating(inlines) = state {
            let mut p = Paragraph::new(inlines);
            normalize_paragraph(&mut p);
            if !is_blank(&p) {
                self.blocks.push(p.into());
            }
        }
    }

    fn finish(mut self) -> Section {
        self.flush();
        Section::new(self.blocks)
    }
}

fn assemble(nodes: &[DomNode]) -> Section {
    let mut assembler = SectionAssembler::new();
    for node in nodes {
        match convert_node(node) {
            Converted::Block(block) => assembler.see_block(block),
            Converted::Inline(inline) => assembler.see_inline(inline),
        }
    }
    assembler.finish()
}
