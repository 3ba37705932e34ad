//! Font metrics for line wrapping, using `ttf-parser`.
//!
//! Pages are drawn with the PDF base-14 Helvetica faces, so by default text
//! is measured with Helvetica-like average widths. Loading a TTF/OTF face for
//! a style switches that style to exact glyph advances.

use std::collections::HashMap;

use ttf_parser::{Face, FaceParsingError};

use crate::richtext::TextStyle;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Scale applied to subscript and superscript text.
pub const SCRIPT_SCALE: f32 = 0.7;

/// Average advance of a regular glyph, in ems.
const AVERAGE_ADVANCE: f32 = 0.5;
/// Bold glyphs run about 10 % wider.
const AVERAGE_BOLD_ADVANCE: f32 = 0.55;
/// Helvetica ascender, in ems.
const DEFAULT_ASCENDER: f32 = 0.75;

/// Only these flags select a face; decorations and baseline shifts don't.
fn face_style(style: TextStyle) -> TextStyle {
    style & (TextStyle::BOLD | TextStyle::ITALIC)
}

/// A loaded face. The bytes are kept because `ttf-parser` borrows them.
struct LoadedFace {
    bytes: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
}

impl LoadedFace {
    fn parse(bytes: Vec<u8>) -> Result<Self, FaceParsingError> {
        let face = Face::parse(&bytes, 0)?;
        let units_per_em = f32::from(face.units_per_em());
        let ascender = f32::from(face.ascender());
        Ok(Self {
            bytes,
            units_per_em,
            ascender,
        })
    }

    fn advance(&self, text: &str, font_size: f32) -> Option<f32> {
        let face = Face::parse(&self.bytes, 0).ok()?;
        let scale = font_size / self.units_per_em;
        Some(
            text.chars()
                .map(|ch| {
                    face.glyph_index(ch)
                        .and_then(|gid| face.glyph_hor_advance(gid))
                        .map_or(font_size * AVERAGE_ADVANCE, |adv| f32::from(adv) * scale)
                })
                .sum(),
        )
    }
}

/// Font faces by bold/italic combination.
#[derive(Default)]
pub struct FontManager {
    faces: HashMap<TextStyle, LoadedFace>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a face used for text drawn in `style`.
    pub fn load_face(&mut self, style: TextStyle, bytes: Vec<u8>) -> Result<(), FaceParsingError> {
        let face = LoadedFace::parse(bytes)?;
        log::debug!("loaded font face for {:?} ({} units/em)", face_style(style), face.units_per_em);
        self.faces.insert(face_style(style), face);
        Ok(())
    }

    /// Load one face and use it for every style.
    pub fn load_family(&mut self, bytes: Vec<u8>) -> Result<(), FaceParsingError> {
        for style in [
            TextStyle::empty(),
            TextStyle::BOLD,
            TextStyle::ITALIC,
            TextStyle::BOLD | TextStyle::ITALIC,
        ] {
            self.load_face(style, bytes.clone())?;
        }
        Ok(())
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    fn face(&self, style: TextStyle) -> Option<&LoadedFace> {
        self.faces
            .get(&face_style(style))
            .or_else(|| self.faces.get(&TextStyle::empty()))
    }

    /// Width of `text` in points.
    pub fn measure(&self, text: &str, font_size: f32, style: TextStyle) -> f32 {
        if let Some(width) = self.face(style).and_then(|f| f.advance(text, font_size)) {
            return width;
        }
        let em = if style.contains(TextStyle::BOLD) {
            AVERAGE_BOLD_ADVANCE
        } else {
            AVERAGE_ADVANCE
        };
        text.chars().count() as f32 * font_size * em
    }

    pub fn line_height(&self, font_size: f32) -> f32 {
        font_size * LINE_HEIGHT_FACTOR
    }

    /// Ascender of the regular face, in points.
    pub fn ascender(&self, font_size: f32) -> f32 {
        match self.face(TextStyle::empty()) {
            Some(face) => face.ascender * font_size / face.units_per_em,
            None => font_size * DEFAULT_ASCENDER,
        }
    }

    /// Greedy word wrap of plain text into lines no wider than `max_width`.
    /// Explicit newlines always break; a single word wider than the line
    /// gets a line of its own.
    pub fn wrap(&self, text: &str, font_size: f32, style: TextStyle, max_width: f32) -> Vec<String> {
        if max_width <= 0.0 || text.is_empty() {
            return vec![text.to_string()];
        }

        let mut lines = Vec::new();
        for source_line in text.split('\n') {
            let mut current = String::new();
            for word in source_line.split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let candidate = format!("{current} {word}");
                if self.measure(&candidate, font_size, style) > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            lines.push(current);
        }
        lines
    }
}
