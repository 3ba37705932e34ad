//! Integration tests for report-forge.
//!
//! These tests validate:
//! - HTML conversion and rich text normalization
//! - Document rendering, part ordering and page numbering
//! - Page container and PDF export
//! - Delimited text and spreadsheet table export

use std::io::{Cursor, Read};
use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use report_forge::export::{cfb, convert_container, ContainerReader};
use report_forge::layout_config::LayoutBox;
use report_forge::normalize::normalize_section;
use report_forge::paginator::{DocumentPage, PageCallback, PageCountCallback, PageSize, Paginator, PaginatorSource};
use report_forge::templates::{invoice_table, sample_registry, INVOICE_DEFINITION};
use report_forge::{
    Block, ContextRegistry, Document, DocumentFormat, ExportError, FlowPart, HtmlConverter, Inline, PageTemplate,
    Paragraph, ReportingService, Section, Table, TableFormat, TextStyle,
};

// =====================================================================
// Helpers
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn first_paragraph(section: &Section) -> &Paragraph {
    match &section.blocks[0] {
        Block::Paragraph(p) => p,
        other => panic!("expected a paragraph, got {other:?}"),
    }
}

/// Paginator that reports a fixed number of pages.
struct Pages(usize);

impl Paginator for Pages {
    fn set_page_size(&mut self, _size: PageSize) {}

    fn compute_page_count(&mut self, done: PageCountCallback) {
        let _ = done.send(Ok(self.0));
    }

    fn get_page(&mut self, index: usize, done: PageCallback) {
        let _ = done.send(Ok(DocumentPage {
            size: PageSize::default(),
            boxes: vec![LayoutBox::new(0.0, index as f32, 10.0, 10.0)],
        }));
    }
}

impl PaginatorSource for Pages {
    fn create(&self, _content: Section) -> Box<dyn Paginator> {
        Box::new(Pages(self.0))
    }
}

fn flow_of(pages: usize) -> FlowPart {
    let content = Section::new(vec![Paragraph::text("flow").into()]);
    FlowPart::new(PageTemplate::a4(), content).with_paginator_source(Arc::new(Pages(pages)))
}

struct Row {
    a: &'static str,
    b: &'static str,
}

fn quoted_table() -> Table<Row> {
    Table::named("T", vec![Row { a: "1", b: "x\"y" }])
        .column("A", |r: &Row| r.a.to_string())
        .column("B", |r: &Row| r.b.to_string())
}

fn service() -> ReportingService {
    ReportingService::new(sample_registry()).unwrap()
}

// =====================================================================
// HTML conversion
// =====================================================================

#[test]
fn consecutive_spaces_collapse_into_one_run() {
    let section = HtmlConverter::convert_str("<p>a  b</p>").unwrap();
    assert_eq!(first_paragraph(&section).inlines, vec![Inline::run("a b")]);
}

#[test]
fn line_breaks_survive_conversion() {
    let section = HtmlConverter::convert_str("<p>Hello<br/><br/>World</p>").unwrap();
    assert_eq!(
        first_paragraph(&section).inlines,
        vec![
            Inline::run("Hello"),
            Inline::LineBreak,
            Inline::LineBreak,
            Inline::run("World"),
        ]
    );
}

#[test]
fn headings_get_size_and_no_margin() {
    let section = HtmlConverter::convert_str("<h2>T</h2>").unwrap();
    let p = first_paragraph(&section);
    assert_eq!(p.font_size, Some(18.0));
    let margin = p.margin.unwrap();
    assert_eq!((margin.left, margin.top, margin.right, margin.bottom), (0.0, 0.0, 0.0, 0.0));
}

#[test]
fn conversion_output_is_already_normalized() {
    let html = "<p> Lead <b> bold </b>  tail <br/> next line </p><h1>  Title  </h1><p>   </p>";
    let section = HtmlConverter::convert_str(html).unwrap();
    let mut again = section.clone();
    normalize_section(&mut again);
    assert_eq!(section, again);
}

#[test]
fn nested_styles_combine() {
    let section = HtmlConverter::convert_str("<p><b><i>both</i></b></p>").unwrap();
    let Inline::Span(outer) = &first_paragraph(&section).inlines[0] else {
        panic!("expected a span");
    };
    assert_eq!(outer.style, TextStyle::BOLD);
    let Inline::Span(inner) = &outer.inlines[0] else {
        panic!("expected a nested span");
    };
    assert_eq!(inner.style, TextStyle::ITALIC);
}

#[tokio::test]
async fn missing_html_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = HtmlConverter::convert_file_async(dir.path().join("absent.html")).await.unwrap_err();
    assert!(matches!(err, report_forge::ConvertError::NotFound(_)));
}

// =====================================================================
// Document rendering
// =====================================================================

#[tokio::test]
async fn parts_concatenate_and_number_across_the_document() {
    let document = Document::new("Numbers").with_part(flow_of(2)).with_part(flow_of(3));
    let pages = document.render(&Value::Null).await.unwrap();
    assert_eq!(pages.len(), 5);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page_number(), i + 1);
        assert_eq!(page.total_pages(), 5);
    }
}

#[tokio::test]
async fn empty_flow_parts_produce_no_pages() {
    let without_content = FlowPart::new(PageTemplate::a4(), Section::default()).with_content(None);
    let document = Document::new("Empty").with_part(without_content).with_part(flow_of(0));
    assert!(document.render(&Value::Null).await.unwrap().is_empty());
}

#[tokio::test]
async fn footer_shows_final_numbering() {
    let document = Document::new("Report")
        .with_part(flow_of(2).with_template(Some(PageTemplate::report("Report"))))
        .with_part(flow_of(1).with_template(Some(PageTemplate::report("Report"))));
    let pages = document.render(&Value::Null).await.unwrap();
    let footer = pages[1].description().plain_text();
    assert!(footer.contains("Page 2 of 3"), "{footer}");
}

#[tokio::test]
async fn sample_invoice_renders_through_the_service() {
    let pages = service().render("Invoice", json!({"number": 12, "lines": 2})).await.unwrap();
    assert_eq!(pages.len(), 1);
    let text = pages[0].description().plain_text();
    assert!(text.contains("Invoice 12"));
    assert!(text.contains("Consulting block 1"));
}

// =====================================================================
// Document export
// =====================================================================

#[tokio::test]
async fn container_keeps_every_page_in_order() {
    let mut out = Vec::new();
    service()
        .export_document("Invoice", DocumentFormat::Container, &mut out, json!({"lines": 150}))
        .await
        .unwrap();
    let rendered = service().render("Invoice", json!({"lines": 150})).await.unwrap();
    assert!(rendered.len() > 1);

    let mut reader = ContainerReader::open(&out).unwrap();
    assert_eq!(reader.page_count(), rendered.len());
    let pages = reader.pages().unwrap();
    for (stored, page) in pages.iter().zip(&rendered) {
        assert_eq!(stored, &page.description());
    }
}

#[tokio::test]
async fn pdf_conversion_keeps_the_page_count() {
    let mut container = Vec::new();
    service()
        .export_document("Handbook", DocumentFormat::Container, &mut container, Value::Null)
        .await
        .unwrap();
    let pages = ContainerReader::open(&container).unwrap().page_count();
    let (pdf, converted) = convert_container(&container).unwrap();
    assert_eq!(converted, pages);
    assert_valid_pdf(&pdf);
}

#[tokio::test]
async fn container_export_is_deterministic() {
    let service = service();
    let mut first = Vec::new();
    let mut second = Vec::new();
    for out in [&mut first, &mut second] {
        service
            .export_document("Invoice", DocumentFormat::Container, out, json!({"number": 3, "lines": 5}))
            .await
            .unwrap();
    }
    assert_eq!(Sha256::digest(&first), Sha256::digest(&second));
}

#[tokio::test]
async fn document_file_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.pdf");
    service()
        .export_document_to_file("Invoice", DocumentFormat::Pdf, &path, json!({"number": 1}))
        .await
        .unwrap();
    assert_valid_pdf(&std::fs::read(&path).unwrap());
}

#[tokio::test]
async fn failed_file_export_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.pdf");
    let err = service()
        .export_document_to_file("Missing", DocumentFormat::Pdf, &path, Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Render(_)));
    assert!(!path.exists());
}

#[tokio::test]
async fn definition_files_export_with_a_named_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.json");
    std::fs::write(&path, INVOICE_DEFINITION).unwrap();

    let mut out = Vec::new();
    service()
        .export_definition(&path, Some("InvoiceViewModel"), DocumentFormat::Pdf, &mut out, json!({"lines": 4}))
        .await
        .unwrap();
    assert_valid_pdf(&out);
}

#[tokio::test]
async fn built_documents_export_with_an_empty_registry() {
    let service = ReportingService::new(ContextRegistry::default()).unwrap();
    let section = HtmlConverter::convert_str("<p>Hello {Name}</p>").unwrap();
    let document = Document::new("Greeting").with_part(FlowPart::new(PageTemplate::a4(), section));
    let bytes = service
        .export_built_document(document, json!({"Name": "Ada"}), DocumentFormat::Container)
        .await
        .unwrap();
    let page = ContainerReader::open(&bytes).unwrap().page(0).unwrap();
    assert!(page.plain_text().contains("Hello Ada"));
}

// =====================================================================
// Table export
// =====================================================================

#[tokio::test]
async fn csv_quotes_and_escapes_cells() {
    let mut out = Vec::new();
    service().export_table(&quoted_table(), TableFormat::Csv, &mut out).await.unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "\"A\";\"B\"\n\"1\";\"x\\\"y\"");
}

#[tokio::test]
async fn xlsx_sheet_takes_the_table_name() {
    let mut out = Vec::new();
    service().export_table(&quoted_table(), TableFormat::Xlsx, &mut out).await.unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(out)).unwrap();
    let mut workbook = String::new();
    archive.by_name("xl/workbook.xml").unwrap().read_to_string(&mut workbook).unwrap();
    assert!(workbook.contains(r#"name="T""#), "{workbook}");

    let mut sheet = String::new();
    archive.by_name("xl/worksheets/sheet1.xml").unwrap().read_to_string(&mut sheet).unwrap();
    assert!(sheet.contains("x&quot;y") || sheet.contains("x\"y"), "{sheet}");
}

#[tokio::test]
async fn xls_sheet_takes_the_table_name() {
    let mut out = Vec::new();
    service().export_table(&quoted_table(), TableFormat::Xls, &mut out).await.unwrap();

    let stream = cfb::read_stream(&out, "Workbook").expect("workbook stream");
    // BOUNDSHEET: offset, visibility, type, then the 8-bit sheet name.
    let mut at = 0;
    let mut names = Vec::new();
    while at + 4 <= stream.len() {
        let kind = u16::from_le_bytes([stream[at], stream[at + 1]]);
        let len = u16::from_le_bytes([stream[at + 2], stream[at + 3]]) as usize;
        if kind == 0x0085 {
            names.push(stream[at + 4 + 6..at + 4 + len].to_vec());
        }
        if kind == 0 {
            break;
        }
        at += 4 + len;
    }
    assert_eq!(names, vec![vec![1, 0, b'T']]);
}

#[tokio::test]
async fn table_file_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lines.csv");
    let tables = [invoice_table(3)];
    service().export_tables_to_file(&tables, TableFormat::Csv, &path).await.unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("\"Description\";\"Quantity\";\"Price\"\n"));
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn formats_follow_file_extensions() {
    assert_eq!(DocumentFormat::from_path("out/report.PDF").unwrap(), DocumentFormat::Pdf);
    assert_eq!(TableFormat::from_path("lines.xlsx").unwrap(), TableFormat::Xlsx);
    assert!(matches!(
        TableFormat::from_path("lines.ods"),
        Err(ExportError::UnsupportedFormat(_))
    ));
}
