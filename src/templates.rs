//! Sample reports for testing and demonstration.
//!
//! [`sample_registry`] registers an `Invoice` document built from
//! [`INVOICE_DEFINITION`] together with its `InvoiceViewModel` context, and
//! a `Handbook` document that flows [`HANDBOOK_HTML`] through a report template.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::flow::FlowPart;
use crate::html::HtmlConverter;
use crate::registry::{BoxError, ContextRegistry};
use crate::table::Table;
use crate::template::PageTemplate;

/// Rich text sample using every supported element.
pub const HANDBOOK_HTML: &str = r#"
<h1>Employee Handbook</h1>
<p>Welcome to <b>Acme</b>. This handbook explains how we <i>work</i>,
   how we <u>communicate</u>, and what you can <s>not</s> expect from us.</p>
<h2>Working hours</h2>
<p>Core hours are 10:00 to 16:00.<br/>Outside of core hours you are free to
   plan your own day.</p>
<blockquote>We trust people to manage their own time.</blockquote>
<h2>Chemistry lab</h2>
<p>Water is H<sub>2</sub>O and the area of a circle is &#960;r<sup>2</sup>.
   Safety rules are listed on the <a href="https://intranet.example.com/safety">intranet</a>
   and in the <a href="safety.html">local copy</a>.</p>
<p>As our founder put it, <q>measure twice, cut once</q>.</p>
"#;

/// Document definition of the sample invoice. Line items repeat per entry
/// of `Lines`; the notes block only shows when `Notes` is set.
pub const INVOICE_DEFINITION: &str = r#"{
    "title": "Invoice",
    "template": {
        "width": 595.28,
        "height": 841.89,
        "elements": [
            {"type": "text", "text": "Invoice {Number}", "font_size": 18, "bold": true},
            {"type": "text", "text": "{Customer.Name}, {Customer.City}"},
            {"type": "rule"},
            {"type": "content_region"},
            {"type": "rule"},
            {"type": "text", "text": "Page {PageNumber} of {TotalNumberOfPages}", "font_size": 9, "align": "right"}
        ]
    },
    "parts": [
        {
            "type": "flow",
            "content": {
                "blocks": [
                    {"type": "items", "path": "Lines", "alternation_count": 2, "template": [
                        {"type": "static", "block": {"type": "paragraph", "inlines": [
                            {"type": "run", "text": "{Description}: {Quantity} x {Price}"}
                        ]}}
                    ]},
                    {"type": "static", "block": {"type": "paragraph", "inlines": [
                        {"type": "span", "style": "BOLD", "inlines": [{"type": "run", "text": "Total: {Total}"}]}
                    ]}},
                    {"type": "visible", "path": "Notes", "blocks": [
                        {"type": "html", "path": "Notes"}
                    ]}
                ]
            }
        }
    ]
}"#;

/// Parameters of the `InvoiceViewModel` context.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceParams {
    pub number: u32,
    pub customer: Option<String>,
    /// Number of generated line items.
    pub lines: usize,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub price: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Customer {
    name: String,
    city: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InvoiceModel {
    number: u32,
    customer: Customer,
    lines: Vec<InvoiceLine>,
    total: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

fn cents(value: u64) -> String {
    format!("${}.{:02}", value / 100, value % 100)
}

/// Generated line items for the sample invoice.
pub fn invoice_lines(count: usize) -> Vec<InvoiceLine> {
    (1..=count)
        .map(|i| InvoiceLine {
            description: format!("Consulting block {i}"),
            quantity: (i % 5 + 1) as u32,
            price: cents(12_500 + (i as u64 % 7) * 1_000),
        })
        .collect()
}

fn invoice_model(params: InvoiceParams) -> InvoiceModel {
    let lines = invoice_lines(params.lines.max(1));
    let total: u64 = (1..=lines.len())
        .map(|i| (i as u64 % 5 + 1) * (12_500 + (i as u64 % 7) * 1_000))
        .sum();
    InvoiceModel {
        number: params.number,
        customer: Customer {
            name: params.customer.unwrap_or_else(|| "Client Inc".to_string()),
            city: "Los Angeles".to_string(),
        },
        lines,
        total: cents(total),
        notes: params.notes,
    }
}

/// A table of invoice lines, ready for delimited or spreadsheet export.
pub fn invoice_table(count: usize) -> Table<InvoiceLine> {
    Table::named("Invoice lines", invoice_lines(count))
        .column("Description", |l: &InvoiceLine| l.description.clone())
        .column("Quantity", |l: &InvoiceLine| l.quantity.to_string())
        .column("Price", |l: &InvoiceLine| l.price.clone())
}

/// Registry holding the sample documents.
pub fn sample_registry() -> ContextRegistry {
    ContextRegistry::builder()
        .document("Invoice", || Ok(Document::from_json(INVOICE_DEFINITION)?))
        .context("InvoiceViewModel", |params: InvoiceParams| {
            Ok::<_, BoxError>(invoice_model(params))
        })
        .document("Handbook", || {
            let section = HtmlConverter::convert_str(HANDBOOK_HTML)?;
            Ok(Document::new("Handbook").with_part(FlowPart::new(PageTemplate::report("Handbook"), section)))
        })
        .build()
}
