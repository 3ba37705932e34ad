//! Flowing document parts and the pagination engine.
//!
//! A [`FlowPart`] pours bound content through a [`Paginator`] and places
//! each resulting chunk into a fresh page made from its template:
//!
//! 1. bind the content root against the data context;
//! 2. for page index 0, 1, ...: instantiate the template, bind it, lay it
//!    out, and find its content region;
//! 3. on the first page, size the paginator to the region and ask for the
//!    page count (zero means no output);
//! 4. fetch the chunk for the index, attach it, refresh the layout;
//! 5. continue while the index is below the count.

use std::fmt;
use std::sync::Arc;

use crate::binding::DataContext;
use crate::content::FlowContent;
use crate::error::RenderError;
use crate::page::Page;
use crate::paginator::{fetch_page, page_count, PageSize, PaginatorSource, TextPaginatorSource};
use crate::part::MisconfigurationPolicy;
use crate::template::PageTemplate;

/// A part whose content flows over as many pages as it needs.
#[derive(Clone)]
pub struct FlowPart {
    template: Option<Arc<PageTemplate>>,
    content: Option<FlowContent>,
    source: Arc<dyn PaginatorSource>,
    policy: MisconfigurationPolicy,
}

impl fmt::Debug for FlowPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowPart")
            .field("template", &self.template)
            .field("content", &self.content)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for FlowPart {
    fn default() -> Self {
        Self {
            template: None,
            content: None,
            source: Arc::new(TextPaginatorSource::default()),
            policy: MisconfigurationPolicy::default(),
        }
    }
}

impl FlowPart {
    pub fn new(template: PageTemplate, content: impl Into<FlowContent>) -> Self {
        Self {
            template: Some(Arc::new(template)),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template: Option<PageTemplate>) -> Self {
        self.template = template.map(Arc::new);
        self
    }

    pub fn with_content(mut self, content: Option<FlowContent>) -> Self {
        self.content = content;
        self
    }

    pub fn with_paginator_source(mut self, source: Arc<dyn PaginatorSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_policy(mut self, policy: MisconfigurationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn template(&self) -> Option<&PageTemplate> {
        self.template.as_deref()
    }

    pub fn content(&self) -> Option<&FlowContent> {
        self.content.as_ref()
    }

    pub async fn render(&self, context: &DataContext) -> Result<Vec<Page>, RenderError> {
        let (Some(template), Some(content)) = (&self.template, &self.content) else {
            log::debug!("flow part without template or content renders nothing");
            return Ok(Vec::new());
        };

        let section = content.bind(context)?;
        let mut paginator = self.source.create(section);
        let mut pages = Vec::new();
        let mut count = 0;
        let mut index = 0;

        loop {
            let mut page = match template.instantiate() {
                Ok(page) => page,
                Err(e) => return self.policy.handle("flow part", e.into()),
            };
            page.bind(context);
            if let Err(e) = page.update_layout() {
                return self.policy.handle("flow part", e.into());
            }
            let region = match page.content_region() {
                Some(region) if region.has_area() => region,
                _ => return self.policy.handle("flow part", RenderError::MissingContentRegion),
            };

            if index == 0 {
                paginator.set_page_size(PageSize {
                    width: region.width,
                    height: region.height,
                });
                count = page_count(paginator.as_mut()).await?;
                log::debug!("flow part paginated into {count} page(s)");
                if count == 0 {
                    return Ok(Vec::new());
                }
            }

            let chunk = fetch_page(paginator.as_mut(), index).await?;
            page.attach(chunk.boxes);
            page.update_layout()?;
            log::debug!("flow part page {} of {count} placed", index + 1);
            pages.push(page);

            index += 1;
            if index >= count {
                break;
            }
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::LayoutBox;
    use crate::paginator::{DocumentPage, PageCallback, PageCountCallback, Paginator};
    use crate::richtext::{Paragraph, Section};
    use crate::template::TemplateElement;
    use serde_json::json;
    use std::sync::Mutex;

    /// Paginator reporting a fixed page count and recording requested sizes.
    struct FixedCount {
        count: Result<usize, String>,
        sizes: Arc<Mutex<Vec<PageSize>>>,
        drop_callbacks: bool,
    }

    impl Paginator for FixedCount {
        fn set_page_size(&mut self, size: PageSize) {
            self.sizes.lock().unwrap().push(size);
        }

        fn compute_page_count(&mut self, done: PageCountCallback) {
            if !self.drop_callbacks {
                let _ = done.send(self.count.clone());
            }
        }

        fn get_page(&mut self, index: usize, done: PageCallback) {
            let _ = done.send(Ok(DocumentPage {
                size: PageSize::default(),
                boxes: vec![LayoutBox::new(0.0, index as f32, 10.0, 10.0)],
            }));
        }
    }

    struct FixedSource {
        count: Result<usize, String>,
        sizes: Arc<Mutex<Vec<PageSize>>>,
        drop_callbacks: bool,
    }

    impl FixedSource {
        fn new(count: Result<usize, String>) -> Self {
            Self {
                count,
                sizes: Arc::default(),
                drop_callbacks: false,
            }
        }
    }

    impl PaginatorSource for FixedSource {
        fn create(&self, _content: Section) -> Box<dyn Paginator> {
            Box::new(FixedCount {
                count: self.count.clone(),
                sizes: Arc::clone(&self.sizes),
                drop_callbacks: self.drop_callbacks,
            })
        }
    }

    fn content() -> FlowContent {
        Section::new(vec![Paragraph::text("text").into()]).into()
    }

    #[tokio::test]
    async fn missing_content_renders_nothing() {
        let part = FlowPart::new(PageTemplate::a4(), content()).with_content(None);
        assert!(part.render(&json!(null)).await.unwrap().is_empty());

        let part = FlowPart::new(PageTemplate::a4(), content()).with_template(None);
        assert!(part.render(&json!(null)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_page_count_renders_nothing() {
        let part = FlowPart::new(PageTemplate::a4(), content())
            .with_paginator_source(Arc::new(FixedSource::new(Ok(0))));
        assert!(part.render(&json!(null)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_fresh_page_per_chunk_sized_to_region() {
        let source = Arc::new(FixedSource::new(Ok(3)));
        let sizes = Arc::clone(&source.sizes);
        let part = FlowPart::new(PageTemplate::report("T"), content()).with_paginator_source(source);
        let pages = part.render(&json!(null)).await.unwrap();
        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.content().len(), 1);
            assert_eq!(page.content()[0].y, i as f32);
        }
        let sizes = sizes.lock().unwrap();
        assert_eq!(sizes.len(), 1, "paginator is sized once");
        let region = pages[0].content_region().unwrap();
        assert_eq!(sizes[0].width, region.width);
        assert_eq!(sizes[0].height, region.height);
    }

    #[tokio::test]
    async fn missing_content_region_follows_policy() {
        let template = PageTemplate::new(300.0, 300.0).with_element(TemplateElement::text("no region"));
        let part = FlowPart::new(template, content());
        assert!(part.render(&json!(null)).await.unwrap().is_empty());

        let strict = part.with_policy(MisconfigurationPolicy::Error);
        let err = strict.render(&json!(null)).await.unwrap_err();
        assert!(matches!(err, RenderError::MissingContentRegion));
    }

    #[tokio::test]
    async fn paginator_failures_are_errors() {
        let part = FlowPart::new(PageTemplate::a4(), content())
            .with_paginator_source(Arc::new(FixedSource::new(Err("boom".into()))));
        let err = part.render(&json!(null)).await.unwrap_err();
        assert!(matches!(err, RenderError::Paginator(ref m) if m == "boom"));

        let mut dropping = FixedSource::new(Ok(1));
        dropping.drop_callbacks = true;
        let part = FlowPart::new(PageTemplate::a4(), content()).with_paginator_source(Arc::new(dropping));
        let err = part.render(&json!(null)).await.unwrap_err();
        assert!(matches!(err, RenderError::PaginatorAborted));
    }

    #[tokio::test]
    async fn built_in_paginator_spreads_long_content() {
        let section = Section::new(
            (0..200)
                .map(|i| Paragraph::text(format!("Line {i} of a long report body")).into())
                .collect(),
        );
        let part = FlowPart::new(PageTemplate::a4(), section);
        let pages = part.render(&json!(null)).await.unwrap();
        assert!(pages.len() > 1);
        assert!(pages.iter().all(|p| !p.content().is_empty()));
    }
}
