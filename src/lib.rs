//! # report-forge – declarative report rendering
//!
//! Documents are ordered lists of parts rendered onto page templates and
//! exported to a page container or PDF; tables are exported to delimited
//! text or spreadsheets. The stages are:
//!
//! 1. **Convert** – HTML → DOM ([`dom`]) → rich text ([`html`], [`richtext`], [`normalize`])
//! 2. **Bind** – flow content and template text against a data context ([`content`], [`binding`])
//! 3. **Lay out** – page templates measured with Taffy ([`template`], [`layout`], [`page`])
//! 4. **Paginate** – flowing content split over pages ([`paginator`], [`flow`], [`part`], [`document`])
//! 5. **Export** – page container, PDF, CSV, XLS and XLSX ([`export`])
//!
//! [`ReportingService`] runs the whole sequence on a dedicated render
//! worker ([`worker`]) for documents looked up in a [`ContextRegistry`].

pub mod binding;
pub mod content;
pub mod document;
pub mod dom;
pub mod error;
pub mod export;
pub mod flow;
pub mod fonts;
pub mod html;
pub mod layout;
pub mod layout_config;
pub mod normalize;
pub mod page;
pub mod paginator;
pub mod part;
pub mod registry;
pub mod richtext;
pub mod service;
pub mod table;
pub mod template;
pub mod templates;
pub mod worker;

// Re-exports for convenience
pub use content::{ContentBlock, FlowContent};
pub use document::{Document, DocumentDefinition, PartDefinition};
pub use error::{
    ActivationError, ConvertError, Error, ExportError, NotFoundError, ParseError, RenderError, Result,
    TemplateError,
};
pub use export::{DocumentFormat, ExportOptions, TableFormat};
pub use flow::FlowPart;
pub use html::HtmlConverter;
pub use page::Page;
pub use part::{DocumentPart, FixedPagePart, MisconfigurationPolicy};
pub use registry::ContextRegistry;
pub use richtext::{Block, Inline, Paragraph, Section, TextStyle};
pub use service::ReportingService;
pub use table::{Column, Table, TableData};
pub use template::{PageTemplate, TemplateElement};
