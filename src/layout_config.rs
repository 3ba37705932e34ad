//! Page descriptions – the frozen representation of a laid-out page.
//!
//! A [`PageDescription`] encodes exactly what goes on one page: positioned
//! boxes carrying pre-wrapped styled text, rules and images. It is what the
//! page container stores and what the PDF converter draws.

use serde::{Deserialize, Serialize};

use crate::richtext::TextStyle;

/// One laid-out page, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDescription {
    /// 1-based page number within the document.
    pub page_number: usize,
    pub total_pages: usize,
    /// Width of the page in PDF points (1 pt = 1/72 inch).
    pub width_pt: f32,
    /// Height of the page in PDF points.
    pub height_pt: f32,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,

    /// Nested boxes, positioned relative to the page like their parent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

/// Horizontal alignment of text lines within their box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Pre-wrapped text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
    pub color: [f32; 4],
    pub line_height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Y offset from the top of the owning box.
    pub y_offset: f32,
    pub segments: Vec<TextSegment>,
}

/// A horizontal stretch of text sharing one style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub text: String,
    /// X offset from the left edge of the owning box.
    pub x_offset: f32,
    pub width: f32,
    pub font_size: f32,
    /// Baseline shift in points; positive values raise the text.
    #[serde(default)]
    pub rise: f32,
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl PageDescription {
    /// Serialise to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// All text on the page, one line per text line, in box order.
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        for lbox in &self.boxes {
            lbox.collect_lines(&mut out);
        }
        out.join("\n")
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    /// Move this box and its children by `(dx, dy)`.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
        for child in &mut self.children {
            child.translate(dx, dy);
        }
    }

    fn collect_lines(&self, out: &mut Vec<String>) {
        if let Some(text) = &self.text {
            for line in &text.lines {
                out.push(line.segments.iter().map(|s| s.text.as_str()).collect());
            }
        }
        for child in &self.children {
            child.collect_lines(out);
        }
    }
}
