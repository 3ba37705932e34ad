//! Bound flow content.
//!
//! A [`FlowContent`] is the declarative root of a flowing document part. It
//! is materialized into a rich text [`Section`] against a data context before
//! pagination.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binding::{interpolate, is_truthy, resolve, DataContext};
use crate::error::RenderError;
use crate::html::HtmlConverter;
use crate::richtext::{Block, Inline, Paragraph, Section};

/// Context key holding an item's position in its list.
pub const INDEX_KEY: &str = "Index";
/// Context key holding an item's alternation index.
pub const ALTERNATION_INDEX_KEY: &str = "AlternationIndex";

/// One declarative content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Fixed rich text; `{Path}` placeholders in runs are bound.
    Static { block: Block },
    /// HTML held by the context string at `path`.
    Html { path: String },
    /// `template` repeated once per element of the array at `path`.
    Items {
        path: String,
        template: Vec<ContentBlock>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alternation_count: Option<usize>,
    },
    /// One paragraph holding `template` once per element of the array at
    /// `path`.
    ItemsParagraph {
        path: String,
        template: Vec<Inline>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alternation_count: Option<usize>,
    },
    /// `blocks` shown only while the value at `path` is truthy.
    Visible {
        path: String,
        blocks: Vec<ContentBlock>,
    },
}

/// The content root of a flowing part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowContent {
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

impl FlowContent {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }

    pub fn push(&mut self, block: ContentBlock) {
        self.blocks.push(block);
    }

    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Materialize the content against `context`.
    pub fn bind(&self, context: &DataContext) -> Result<Section, RenderError> {
        let mut blocks = Vec::new();
        bind_blocks(&self.blocks, context, &mut blocks)?;
        Ok(Section::new(blocks))
    }
}

impl From<Section> for FlowContent {
    /// Static content; every top-level block becomes a [`ContentBlock::Static`].
    fn from(section: Section) -> Self {
        Self::new(
            section
                .blocks
                .into_iter()
                .map(|block| ContentBlock::Static { block })
                .collect(),
        )
    }
}

impl ContentBlock {
    pub fn html(path: impl Into<String>) -> Self {
        ContentBlock::Html { path: path.into() }
    }

    pub fn items(path: impl Into<String>, template: Vec<ContentBlock>) -> Self {
        ContentBlock::Items {
            path: path.into(),
            template,
            alternation_count: None,
        }
    }

    pub fn items_paragraph(path: impl Into<String>, template: Vec<Inline>) -> Self {
        ContentBlock::ItemsParagraph {
            path: path.into(),
            template,
            alternation_count: None,
        }
    }

    /// Set the alternation count of an items block; other blocks are
    /// returned unchanged.
    pub fn alternating(mut self, count: usize) -> Self {
        if let ContentBlock::Items { alternation_count, .. } | ContentBlock::ItemsParagraph { alternation_count, .. } =
            &mut self
        {
            *alternation_count = Some(count);
        }
        self
    }

    pub fn visible(path: impl Into<String>, blocks: Vec<ContentBlock>) -> Self {
        ContentBlock::Visible {
            path: path.into(),
            blocks,
        }
    }
}

impl From<Block> for ContentBlock {
    fn from(block: Block) -> Self {
        ContentBlock::Static { block }
    }
}

fn bind_blocks(
    blocks: &[ContentBlock],
    context: &DataContext,
    out: &mut Vec<Block>,
) -> Result<(), RenderError> {
    for block in blocks {
        match block {
            ContentBlock::Static { block } => {
                let mut block = block.clone();
                bind_static(&mut block, context);
                out.push(block);
            }
            ContentBlock::Html { path } => {
                let html = resolve(context, path).and_then(Value::as_str).unwrap_or("");
                if html.trim().is_empty() {
                    continue;
                }
                let section =
                    HtmlConverter::convert_str(html).map_err(|source| RenderError::Html {
                        path: path.clone(),
                        source,
                    })?;
                if !section.is_empty() {
                    out.push(section.into());
                }
            }
            ContentBlock::Items {
                path,
                template,
                alternation_count,
            } => {
                let Some(items) = resolve(context, path).and_then(Value::as_array) else {
                    log::debug!("items path '{path}' is not an array; nothing to repeat");
                    continue;
                };
                for (index, item) in items.iter().enumerate() {
                    let item_context = item_context(item, index, *alternation_count);
                    let mut item_blocks = Vec::new();
                    bind_blocks(template, &item_context, &mut item_blocks)?;
                    out.push(Section::new(item_blocks).into());
                }
            }
            ContentBlock::ItemsParagraph {
                path,
                template,
                alternation_count,
            } => {
                let Some(items) = resolve(context, path).and_then(Value::as_array) else {
                    log::debug!("items path '{path}' is not an array; nothing to repeat");
                    continue;
                };
                let mut inlines = Vec::with_capacity(items.len() * template.len());
                for (index, item) in items.iter().enumerate() {
                    let item_context = item_context(item, index, *alternation_count);
                    let mut item_inlines = template.clone();
                    bind_inlines(&mut item_inlines, &item_context);
                    inlines.extend(item_inlines);
                }
                if !inlines.is_empty() {
                    out.push(Paragraph::new(inlines).into());
                }
            }
            ContentBlock::Visible { path, blocks } => {
                if is_truthy(resolve(context, path)) {
                    bind_blocks(blocks, context, out)?;
                }
            }
        }
    }
    Ok(())
}

fn item_context(item: &Value, index: usize, alternation_count: Option<usize>) -> Value {
    let mut item = item.clone();
    if let Value::Object(map) = &mut item {
        let alternation = match alternation_count {
            Some(n) if n > 0 => index % n,
            _ => 0,
        };
        map.insert(INDEX_KEY.to_string(), Value::from(index));
        map.insert(ALTERNATION_INDEX_KEY.to_string(), Value::from(alternation));
    }
    item
}

fn bind_static(block: &mut Block, context: &DataContext) {
    match block {
        Block::Paragraph(p) => bind_inlines(&mut p.inlines, context),
        Block::Section(s) => s.blocks.iter_mut().for_each(|b| bind_static(b, context)),
    }
}

fn bind_inlines(inlines: &mut [Inline], context: &DataContext) {
    for inline in inlines {
        match inline {
            Inline::Run { text } => *text = interpolate(text, context),
            Inline::LineBreak => {}
            Inline::Span(span) => bind_inlines(&mut span.inlines, context),
            Inline::Hyperlink(link) => bind_inlines(&mut link.inlines, context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::richtext::{Span, TextStyle};
    use serde_json::json;

    fn texts(section: &Section) -> Vec<String> {
        section.paragraphs().iter().map(|p| p.plain_text()).collect()
    }

    #[test]
    fn static_blocks_interpolate_runs() {
        let content = FlowContent::new(vec![Block::from(Paragraph::text("Dear {name},")).into()]);
        let section = content.bind(&json!({"name": "Ada"})).unwrap();
        assert_eq!(texts(&section), vec!["Dear Ada,"]);
    }

    #[test]
    fn html_blocks_convert_context_strings() {
        let content = FlowContent::new(vec![ContentBlock::html("body"), ContentBlock::html("missing")]);
        let section = content
            .bind(&json!({"body": "<p>one</p><p>two</p>"}))
            .unwrap();
        assert_eq!(texts(&section), vec!["one", "two"]);
    }

    #[test]
    fn malformed_bound_html_is_a_render_error() {
        let content = FlowContent::new(vec![ContentBlock::html("body")]);
        let err = content.bind(&json!({"body": "<p>x<!-- never closed"})).unwrap_err();
        match err {
            RenderError::Html { path, source } => {
                assert_eq!(path, "body");
                assert!(matches!(source, ConvertError::Parse(_)));
            }
            other => panic!("Expected Html error, got {:?}", other),
        }
    }

    #[test]
    fn items_repeat_with_alternation() {
        let template = vec![Block::from(Paragraph::text("{Index}:{AlternationIndex}:{name}")).into()];
        let content = FlowContent::new(vec![ContentBlock::Items {
            path: "people".into(),
            template,
            alternation_count: Some(2),
        }]);
        let ctx = json!({"people": [{"name": "a"}, {"name": "b"}, {"name": "c"}]});
        let section = content.bind(&ctx).unwrap();
        assert_eq!(section.blocks.len(), 3);
        assert_eq!(texts(&section), vec!["0:0:a", "1:1:b", "2:0:c"]);
    }

    #[test]
    fn items_paragraph_repeats_inlines_in_one_paragraph() {
        let template = vec![
            Span::styled(TextStyle::BOLD, vec![Inline::run("{name}")]).into(),
            Inline::run("#{AlternationIndex} "),
        ];
        let content = FlowContent::new(vec![ContentBlock::items_paragraph("tags", template).alternating(2)]);
        let ctx = json!({"tags": [{"name": "a"}, {"name": "b"}, {"name": "c"}]});
        let section = content.bind(&ctx).unwrap();
        assert_eq!(section.blocks.len(), 1);
        assert_eq!(texts(&section), vec!["a#0 b#1 c#0 "]);
        let Block::Paragraph(p) = &section.blocks[0] else {
            panic!("expected a paragraph");
        };
        assert_eq!(p.inlines.len(), 6);
        assert!(matches!(&p.inlines[2], Inline::Span(s) if s.style == TextStyle::BOLD));
    }

    #[test]
    fn items_paragraph_over_empty_list_adds_nothing() {
        let content = FlowContent::new(vec![ContentBlock::items_paragraph("tags", vec![Inline::run("{name}")])]);
        assert!(content.bind(&json!({"tags": []})).unwrap().is_empty());
        assert!(content.bind(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn items_over_non_array_produce_nothing() {
        let content = FlowContent::new(vec![ContentBlock::items("people", vec![])]);
        assert!(content.bind(&json!({"people": 3})).unwrap().is_empty());
    }

    #[test]
    fn visibility_follows_truthiness() {
        let content = FlowContent::new(vec![ContentBlock::visible(
            "show",
            vec![Block::from(Paragraph::text("shown")).into()],
        )]);
        assert_eq!(texts(&content.bind(&json!({"show": true})).unwrap()), vec!["shown"]);
        assert!(content.bind(&json!({"show": false})).unwrap().is_empty());
    }

    #[test]
    fn definition_json_shape() {
        let json = r#"{"blocks": [
            {"type": "html", "path": "notes"},
            {"type": "items", "path": "rows", "alternation_count": 2, "template": [
                {"type": "static", "block": {"type": "paragraph", "inlines": [{"type": "run", "text": "{label}"}]}}
            ]},
            {"type": "items_paragraph", "path": "tags", "alternation_count": 3, "template": [
                {"type": "run", "text": "{label} "}
            ]}
        ]}"#;
        let content: FlowContent = serde_json::from_str(json).unwrap();
        assert_eq!(content.blocks.len(), 3);
        assert!(matches!(
            content.blocks[2],
            ContentBlock::ItemsParagraph { alternation_count: Some(3), .. }
        ));
        assert!(matches!(content.blocks[1], ContentBlock::Items { alternation_count: Some(2), .. }));
    }
}
