//! Page layout – uses Taffy to stack a template's elements vertically on
//! the page and to size its content region.
//!
//! The page is a flex column whose padding is the template margin. Fixed
//! elements keep their measured height; the content region grows into
//! whatever height is left.

use once_cell::sync::Lazy;
use serde_json::Value;
use taffy::prelude::*;

use crate::binding::{interpolate_page, PageInfo};
use crate::error::TemplateError;
use crate::fonts::FontManager;
use crate::layout_config::{ImageContent, LayoutBox, TextAlign, TextContent, TextLine, TextSegment};
use crate::richtext::TextStyle;
use crate::template::{PageTemplate, TemplateElement};

/// Metrics used for template text (headers, footers).
static TEMPLATE_FONTS: Lazy<FontManager> = Lazy::new(FontManager::default);

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// An axis-aligned area of the page, in points from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Result of laying out a template for one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Boxes of the fixed template elements.
    pub boxes: Vec<LayoutBox>,
    /// Where flowing content goes, if the template has a content region.
    pub content_region: Option<Region>,
}

/// What a Taffy leaf stands for once it has a position.
enum Placed {
    Text(TextContent),
    Rule,
    Image(ImageContent),
    Region,
    Spacer,
}

fn layout_error(e: taffy::TaffyError) -> TemplateError {
    TemplateError::Layout(e.to_string())
}

/// Lay out `template` for one page, binding its text against `context`.
pub fn layout_template(
    template: &PageTemplate,
    context: &Value,
    page: PageInfo,
) -> Result<PageLayout, TemplateError> {
    template.validate()?;
    let fonts = &*TEMPLATE_FONTS;
    let m = template.margin;
    let inner_width = template.width - m.left - m.right;

    let mut taffy: TaffyTree<()> = TaffyTree::new();
    let mut leaves = Vec::with_capacity(template.elements.len());

    for element in &template.elements {
        let fixed = |height: f32, width: f32| Style {
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Length(height.max(0.0)),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };

        let (style, placed) = match element {
            TemplateElement::Text {
                text,
                font_size,
                bold,
                italic,
                align,
            } => {
                let bound = interpolate_page(text, context, page);
                let content =
                    text_content(&bound, *font_size, *bold, *italic, *align, inner_width, fonts);
                let height = content.lines.len() as f32 * content.line_height;
                (fixed(height, inner_width), Placed::Text(content))
            }
            TemplateElement::ContentRegion => {
                let style = Style {
                    size: Size {
                        width: Dimension::Length(inner_width),
                        height: Dimension::Auto,
                    },
                    min_size: Size {
                        width: Dimension::Auto,
                        height: Dimension::Length(0.0),
                    },
                    flex_grow: 1.0,
                    flex_shrink: 1.0,
                    ..Default::default()
                };
                (style, Placed::Region)
            }
            TemplateElement::Rule { thickness } => (fixed(*thickness, inner_width), Placed::Rule),
            TemplateElement::Image { src, width, height } => (
                fixed(*height, *width),
                Placed::Image(ImageContent {
                    src: src.clone(),
                    width: *width,
                    height: *height,
                }),
            ),
            TemplateElement::Spacer { height } => (fixed(*height, inner_width), Placed::Spacer),
        };
        let node = taffy.new_leaf(style).map_err(layout_error)?;
        leaves.push((node, placed));
    }

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: Dimension::Length(template.width),
            height: Dimension::Length(template.height),
        },
        padding: taffy::Rect {
            top: LengthPercentage::Length(m.top),
            right: LengthPercentage::Length(m.right),
            bottom: LengthPercentage::Length(m.bottom),
            left: LengthPercentage::Length(m.left),
        },
        gap: Size {
            width: LengthPercentage::Length(0.0),
            height: LengthPercentage::Length(template.spacing.max(0.0)),
        },
        ..Default::default()
    };
    let ids: Vec<NodeId> = leaves.iter().map(|(id, _)| *id).collect();
    let root = taffy
        .new_with_children(root_style, &ids)
        .map_err(layout_error)?;
    taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(template.width),
                height: AvailableSpace::Definite(template.height),
            },
        )
        .map_err(layout_error)?;

    let mut result = PageLayout::default();
    for (node, placed) in leaves {
        let layout = taffy.layout(node).map_err(layout_error)?;
        let (x, y) = (layout.location.x, layout.location.y);
        let (width, height) = (layout.size.width, layout.size.height);
        let mut lbox = LayoutBox::new(x, y, width, height);
        match placed {
            Placed::Text(content) => lbox.text = Some(content),
            Placed::Rule => lbox.background_color = Some(BLACK),
            Placed::Image(image) => lbox.image = Some(image),
            Placed::Region => {
                result.content_region = Some(Region {
                    x,
                    y,
                    width,
                    height,
                });
                continue;
            }
            Placed::Spacer => continue,
        }
        result.boxes.push(lbox);
    }
    Ok(result)
}

fn text_content(
    text: &str,
    font_size: f32,
    bold: bool,
    italic: bool,
    align: TextAlign,
    max_width: f32,
    fonts: &FontManager,
) -> TextContent {
    let mut style = TextStyle::empty();
    style.set(TextStyle::BOLD, bold);
    style.set(TextStyle::ITALIC, italic);
    let line_height = fonts.line_height(font_size);

    let lines = fonts
        .wrap(text, font_size, style, max_width)
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let width = fonts.measure(&line, font_size, style);
            let x_offset = match align {
                TextAlign::Left => 0.0,
                TextAlign::Center => ((max_width - width) / 2.0).max(0.0),
                TextAlign::Right => (max_width - width).max(0.0),
            };
            TextLine {
                y_offset: i as f32 * line_height,
                segments: vec![TextSegment {
                    text: line,
                    x_offset,
                    width,
                    font_size,
                    rise: 0.0,
                    style,
                    link: None,
                }],
            }
        })
        .collect();

    TextContent {
        lines,
        color: BLACK,
        line_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::PAGE_MARGIN_PT;
    use serde_json::json;

    #[test]
    fn content_region_fills_plain_page() {
        let t = PageTemplate::a4();
        let layout = layout_template(&t, &Value::Null, PageInfo::default()).unwrap();
        let region = layout.content_region.unwrap();
        assert!((region.x - PAGE_MARGIN_PT).abs() < 0.01);
        assert!((region.y - PAGE_MARGIN_PT).abs() < 0.01);
        assert!((region.width - (t.width - 2.0 * PAGE_MARGIN_PT)).abs() < 0.01);
        assert!((region.height - (t.height - 2.0 * PAGE_MARGIN_PT)).abs() < 0.01);
        assert!(layout.boxes.is_empty());
    }

    #[test]
    fn header_and_footer_shrink_content_region() {
        let t = PageTemplate::report("Title");
        let layout = layout_template(&t, &Value::Null, PageInfo::default()).unwrap();
        let region = layout.content_region.unwrap();
        assert!(region.y > PAGE_MARGIN_PT);
        assert!(region.height < t.height - 2.0 * PAGE_MARGIN_PT);
        // heading, rule, rule, footer
        assert_eq!(layout.boxes.len(), 4);
        let footer = layout.boxes.last().unwrap();
        assert!(footer.y > region.y + region.height);
    }

    #[test]
    fn footer_binds_page_numbers_and_context() {
        let t = PageTemplate::new(300.0, 300.0)
            .with_element(TemplateElement::text("{title}"))
            .with_element(TemplateElement::ContentRegion)
            .with_element(TemplateElement::page_footer());
        let info = PageInfo {
            page_number: 3,
            total_pages: 7,
        };
        let layout = layout_template(&t, &json!({"title": "Quarterly"}), info).unwrap();
        let text = |b: &LayoutBox| b.text.as_ref().unwrap().lines[0].segments[0].text.clone();
        assert_eq!(text(&layout.boxes[0]), "Quarterly");
        assert_eq!(text(&layout.boxes[1]), "Page 3 of 7");
    }

    #[test]
    fn template_without_region_has_none() {
        let t = PageTemplate::new(200.0, 200.0).with_element(TemplateElement::text("cover"));
        let layout = layout_template(&t, &Value::Null, PageInfo::default()).unwrap();
        assert!(layout.content_region.is_none());
        assert_eq!(layout.boxes.len(), 1);
    }
}
