//! Document parts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::binding::DataContext;
use crate::error::{RenderError, TemplateError};
use crate::flow::FlowPart;
use crate::page::Page;
use crate::template::PageTemplate;

/// What a part does when its template cannot produce a usable page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisconfigurationPolicy {
    /// Log a warning and render nothing.
    #[default]
    Empty,
    /// Fail the render with a [`RenderError`].
    Error,
}

impl MisconfigurationPolicy {
    /// Apply the policy to a configuration problem.
    pub(crate) fn handle(self, part: &str, error: RenderError) -> Result<Vec<Page>, RenderError> {
        match self {
            MisconfigurationPolicy::Empty => {
                log::warn!("{part} renders no pages: {error}");
                Ok(Vec::new())
            }
            MisconfigurationPolicy::Error => Err(error),
        }
    }
}

/// A part that renders exactly one page from its template.
#[derive(Debug, Clone)]
pub struct FixedPagePart {
    template: Arc<PageTemplate>,
    policy: MisconfigurationPolicy,
}

impl FixedPagePart {
    pub fn new(template: PageTemplate) -> Self {
        Self {
            template: Arc::new(template),
            policy: MisconfigurationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MisconfigurationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn template(&self) -> &PageTemplate {
        &self.template
    }

    pub async fn render(&self, context: &DataContext) -> Result<Vec<Page>, RenderError> {
        match self.instantiate(context) {
            Ok(page) => Ok(vec![page]),
            Err(e) => self.policy.handle("fixed page part", e.into()),
        }
    }

    fn instantiate(&self, context: &DataContext) -> Result<Page, TemplateError> {
        let mut page = self.template.instantiate()?;
        page.bind(context);
        page.update_layout()?;
        Ok(page)
    }
}

/// One section of a document.
#[derive(Clone)]
pub enum DocumentPart {
    Fixed(FixedPagePart),
    Flow(FlowPart),
}

impl DocumentPart {
    /// Render this part into its pages, in order.
    pub async fn render(&self, context: &DataContext) -> Result<Vec<Page>, RenderError> {
        match self {
            DocumentPart::Fixed(part) => part.render(context).await,
            DocumentPart::Flow(part) => part.render(context).await,
        }
    }
}

impl From<FixedPagePart> for DocumentPart {
    fn from(part: FixedPagePart) -> Self {
        DocumentPart::Fixed(part)
    }
}

impl From<FlowPart> for DocumentPart {
    fn from(part: FlowPart) -> Self {
        DocumentPart::Flow(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateElement;
    use serde_json::json;

    #[tokio::test]
    async fn fixed_part_renders_one_bound_page() {
        let template = PageTemplate::new(300.0, 300.0).with_element(TemplateElement::text("Cover for {client}"));
        let part = FixedPagePart::new(template);
        let pages = part.render(&json!({"client": "Acme"})).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].description().plain_text().contains("Cover for Acme"));
    }

    #[tokio::test]
    async fn invalid_template_follows_policy() {
        let part = FixedPagePart::new(PageTemplate::new(-1.0, 10.0));
        assert!(part.render(&json!(null)).await.unwrap().is_empty());

        let strict = part.with_policy(MisconfigurationPolicy::Error);
        let err = strict.render(&json!(null)).await.unwrap_err();
        assert!(matches!(err, RenderError::Template(TemplateError::InvalidSize { .. })));
    }
}
