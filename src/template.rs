//! Page templates.
//!
//! A [`PageTemplate`] describes a fixed page: its size, margins, and a
//! vertical stack of elements. At most one element is the content region
//! that flowing content is poured into. Templates are plain data; every
//! instantiation yields a fresh [`Page`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::layout_config::TextAlign;
use crate::page::Page;
use crate::richtext::Thickness;

/// A4: 210mm × 297mm = 595.28 × 841.89 points
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;
/// US Letter: 8.5in × 11in.
pub const LETTER_WIDTH_PT: f32 = 612.0;
pub const LETTER_HEIGHT_PT: f32 = 792.0;

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

fn default_font_size() -> f32 {
    10.0
}

fn default_rule_thickness() -> f32 {
    0.5
}

fn default_spacing() -> f32 {
    6.0
}

/// One element of a template's vertical stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateElement {
    /// Bound text; supports `{PageNumber}`, `{TotalNumberOfPages}` and
    /// context paths.
    Text {
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        italic: bool,
        #[serde(default)]
        align: TextAlign,
    },
    /// The region flowing content is placed into. Takes the remaining height.
    ContentRegion,
    /// A horizontal line across the content width.
    Rule {
        #[serde(default = "default_rule_thickness")]
        thickness: f32,
    },
    /// An image given as a base64 data URI.
    Image { src: String, width: f32, height: f32 },
    /// Fixed vertical space.
    Spacer { height: f32 },
}

impl TemplateElement {
    pub fn text(text: impl Into<String>) -> Self {
        TemplateElement::Text {
            text: text.into(),
            font_size: default_font_size(),
            bold: false,
            italic: false,
            align: TextAlign::Left,
        }
    }

    /// Bold text at `font_size`.
    pub fn heading(text: impl Into<String>, font_size: f32) -> Self {
        TemplateElement::Text {
            text: text.into(),
            font_size,
            bold: true,
            italic: false,
            align: TextAlign::Left,
        }
    }

    /// Right-aligned `Page n of N` footer text.
    pub fn page_footer() -> Self {
        TemplateElement::Text {
            text: "Page {PageNumber} of {TotalNumberOfPages}".into(),
            font_size: 9.0,
            bold: false,
            italic: false,
            align: TextAlign::Right,
        }
    }

    pub fn rule() -> Self {
        TemplateElement::Rule {
            thickness: default_rule_thickness(),
        }
    }
}

/// A fixed page description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTemplate {
    pub width: f32,
    pub height: f32,
    #[serde(default = "PageTemplate::default_margin")]
    pub margin: Thickness,
    /// Vertical gap between elements.
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    #[serde(default)]
    pub elements: Vec<TemplateElement>,
}

impl Default for PageTemplate {
    fn default() -> Self {
        Self::a4()
    }
}

impl PageTemplate {
    /// An empty template of the given size with default margins.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            margin: Self::default_margin(),
            spacing: default_spacing(),
            elements: Vec::new(),
        }
    }

    fn default_margin() -> Thickness {
        Thickness::uniform(PAGE_MARGIN_PT)
    }

    /// A4 portrait holding only a content region.
    pub fn a4() -> Self {
        Self::new(A4_WIDTH_PT, A4_HEIGHT_PT).with_element(TemplateElement::ContentRegion)
    }

    /// A4 landscape holding only a content region.
    pub fn a4_landscape() -> Self {
        Self::new(A4_HEIGHT_PT, A4_WIDTH_PT).with_element(TemplateElement::ContentRegion)
    }

    /// US Letter portrait holding only a content region.
    pub fn letter() -> Self {
        Self::new(LETTER_WIDTH_PT, LETTER_HEIGHT_PT).with_element(TemplateElement::ContentRegion)
    }

    /// A page with a title header, the content region, and a numbered footer.
    pub fn report(title: impl Into<String>) -> Self {
        Self::new(A4_WIDTH_PT, A4_HEIGHT_PT)
            .with_element(TemplateElement::heading(title, 14.0))
            .with_element(TemplateElement::rule())
            .with_element(TemplateElement::ContentRegion)
            .with_element(TemplateElement::rule())
            .with_element(TemplateElement::page_footer())
    }

    /// Swap width and height.
    pub fn landscape(mut self) -> Self {
        if self.height > self.width {
            std::mem::swap(&mut self.width, &mut self.height);
        }
        self
    }

    pub fn with_margin(mut self, margin: Thickness) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_element(mut self, element: TemplateElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Number of content regions declared.
    pub fn content_region_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, TemplateElement::ContentRegion))
            .count()
    }

    /// Check that the template can be laid out.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(self.width) || !valid(self.height) {
            return Err(TemplateError::InvalidSize {
                width: self.width,
                height: self.height,
            });
        }
        let m = &self.margin;
        let inner_w = self.width - m.left - m.right;
        let inner_h = self.height - m.top - m.bottom;
        if !(inner_w > 0.0 && inner_h > 0.0) {
            return Err(TemplateError::NoContentArea);
        }
        match self.content_region_count() {
            0 | 1 => Ok(()),
            n => Err(TemplateError::MultipleContentRegions(n)),
        }
    }

    /// Create a fresh, unbound page.
    pub fn instantiate(self: &Arc<Self>) -> Result<Page, TemplateError> {
        self.validate()?;
        Ok(Page::new(Arc::clone(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_have_one_content_region() {
        for t in [PageTemplate::a4(), PageTemplate::a4_landscape(), PageTemplate::letter()] {
            assert_eq!(t.content_region_count(), 1);
            assert!(t.validate().is_ok());
        }
        assert!(PageTemplate::a4_landscape().width > PageTemplate::a4_landscape().height);
        assert_eq!(PageTemplate::report("x").landscape().width, A4_HEIGHT_PT);
    }

    #[test]
    fn invalid_templates_are_rejected() {
        let zero = PageTemplate::new(0.0, 100.0);
        assert!(matches!(zero.validate(), Err(TemplateError::InvalidSize { .. })));

        let nan = PageTemplate::new(f32::NAN, 100.0);
        assert!(matches!(nan.validate(), Err(TemplateError::InvalidSize { .. })));

        let cramped = PageTemplate::new(60.0, 60.0);
        assert_eq!(cramped.validate(), Err(TemplateError::NoContentArea));

        let twice = PageTemplate::a4().with_element(TemplateElement::ContentRegion);
        assert_eq!(twice.validate(), Err(TemplateError::MultipleContentRegions(2)));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"width": 300, "height": 400, "elements": [
            {"type": "text", "text": "Header"},
            {"type": "rule"},
            {"type": "content_region"}
        ]}"#;
        let t: PageTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(t.margin, Thickness::uniform(PAGE_MARGIN_PT));
        assert_eq!(t.elements[1], TemplateElement::Rule { thickness: 0.5 });
        assert!(matches!(&t.elements[0], TemplateElement::Text { font_size, .. } if *font_size == 10.0));
    }
}
