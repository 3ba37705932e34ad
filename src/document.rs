//! Documents and JSON document definitions.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::binding::DataContext;
use crate::content::FlowContent;
use crate::error::{ConvertError, NotFoundError, ParseError, RenderError};
use crate::flow::FlowPart;
use crate::page::Page;
use crate::part::{DocumentPart, FixedPagePart, MisconfigurationPolicy};
use crate::template::PageTemplate;

/// An ordered list of parts rendered into one numbered page sequence.
#[derive(Clone, Default)]
pub struct Document {
    title: String,
    parts: Vec<DocumentPart>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            parts: Vec::new(),
        }
    }

    pub fn with_part(mut self, part: impl Into<DocumentPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn push_part(&mut self, part: impl Into<DocumentPart>) {
        self.parts.push(part.into());
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn parts(&self) -> &[DocumentPart] {
        &self.parts
    }

    /// Render every part in order, then number the pages 1..=N.
    pub async fn render(&self, context: &DataContext) -> Result<Vec<Page>, RenderError> {
        let mut pages = Vec::new();
        for (i, part) in self.parts.iter().enumerate() {
            let rendered = part.render(context).await?;
            log::debug!("part {} rendered {} page(s)", i + 1, rendered.len());
            pages.extend(rendered);
        }

        let total = pages.len();
        for (i, page) in pages.iter_mut().enumerate() {
            page.set_numbering(i + 1, total)?;
        }
        log::info!("rendered '{}' into {total} page(s)", self.title);
        Ok(pages)
    }

    /// Build a document from a JSON definition.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        let definition: DocumentDefinition = serde_json::from_str(json)?;
        Ok(definition.into_document())
    }

    /// Load a JSON definition from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConvertError::NotFound(NotFoundError::File(path.to_path_buf())),
            _ => ConvertError::Io(e),
        })?;
        Ok(Self::from_json(&json)?)
    }
}

/// Serialized form of a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDefinition {
    #[serde(default)]
    pub title: String,
    /// Template used by parts that do not name their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PageTemplate>,
    #[serde(default)]
    pub parts: Vec<PartDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartDefinition {
    Fixed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<PageTemplate>,
        #[serde(default)]
        policy: MisconfigurationPolicy,
    },
    Flow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<PageTemplate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<FlowContent>,
        #[serde(default)]
        policy: MisconfigurationPolicy,
    },
}

impl DocumentDefinition {
    pub fn into_document(self) -> Document {
        let default_template = self.template;
        let mut document = Document::new(self.title);
        for part in self.parts {
            match part {
                PartDefinition::Fixed { template, policy } => {
                    let template = template.or_else(|| default_template.clone()).unwrap_or_default();
                    document.push_part(FixedPagePart::new(template).with_policy(policy));
                }
                PartDefinition::Flow {
                    template,
                    content,
                    policy,
                } => {
                    let part = FlowPart::default()
                        .with_template(template.or_else(|| default_template.clone()))
                        .with_content(content)
                        .with_policy(policy);
                    document.push_part(part);
                }
            }
        }
        document
    }
}
