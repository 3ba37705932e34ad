//! Instantiated pages.

use std::sync::Arc;

use serde_json::Value;

use crate::binding::{DataContext, PageInfo};
use crate::error::TemplateError;
use crate::layout::{layout_template, PageLayout, Region};
use crate::layout_config::{LayoutBox, PageDescription};
use crate::template::PageTemplate;

/// One page of a rendered document.
///
/// A page is created from a template, bound to a data context, laid out,
/// and optionally filled with content boxes. Numbering is assigned once the
/// whole document is rendered; every change re-runs the layout so bound
/// header and footer text stays current.
#[derive(Debug, Clone)]
pub struct Page {
    template: Arc<PageTemplate>,
    context: DataContext,
    info: PageInfo,
    layout: Option<PageLayout>,
    /// Content boxes, positioned relative to the content region origin.
    content: Vec<LayoutBox>,
}

impl Page {
    pub(crate) fn new(template: Arc<PageTemplate>) -> Self {
        Self {
            template,
            context: Value::Null,
            info: PageInfo::default(),
            layout: None,
            content: Vec::new(),
        }
    }

    pub fn template(&self) -> &PageTemplate {
        &self.template
    }

    pub fn bind(&mut self, context: &DataContext) {
        self.context = context.clone();
    }

    /// Recompute the template layout with the current binding and numbering.
    pub fn update_layout(&mut self) -> Result<(), TemplateError> {
        self.layout = Some(layout_template(&self.template, &self.context, self.info)?);
        Ok(())
    }

    /// The content region of the last layout pass.
    pub fn content_region(&self) -> Option<Region> {
        self.layout.as_ref().and_then(|l| l.content_region)
    }

    /// Place content boxes into the content region.
    pub fn attach(&mut self, boxes: Vec<LayoutBox>) {
        self.content.extend(boxes);
    }

    pub fn content(&self) -> &[LayoutBox] {
        &self.content
    }

    /// Assign the final page number and page count.
    pub fn set_numbering(&mut self, page_number: usize, total_pages: usize) -> Result<(), TemplateError> {
        self.info = PageInfo {
            page_number,
            total_pages,
        };
        self.update_layout()
    }

    pub fn page_number(&self) -> usize {
        self.info.page_number
    }

    pub fn total_pages(&self) -> usize {
        self.info.total_pages
    }

    /// Page size in points.
    pub fn size(&self) -> (f32, f32) {
        (self.template.width, self.template.height)
    }

    /// The frozen description of this page as the exporters see it.
    pub fn description(&self) -> PageDescription {
        let mut boxes = self
            .layout
            .as_ref()
            .map(|l| l.boxes.clone())
            .unwrap_or_default();
        let origin = self.content_region().unwrap_or(Region {
            x: self.template.margin.left,
            y: self.template.margin.top,
            ..Region::default()
        });
        boxes.extend(self.content.iter().cloned().map(|mut lbox| {
            lbox.translate(origin.x, origin.y);
            lbox
        }));
        PageDescription {
            page_number: self.info.page_number,
            total_pages: self.info.total_pages,
            width_pt: self.template.width,
            height_pt: self.template.height,
            boxes,
        }
    }
}
