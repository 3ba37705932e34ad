//! PDF conversion – draws page descriptions with `printpdf` (v0.8 ops API).
//!
//! PDF output is always derived from the page container: the container is
//! reopened and converted page by page, so what ends up in the PDF is what
//! the container holds.

use std::collections::{BTreeSet, HashMap};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use super::container::ContainerReader;
use crate::error::ExportError;
use crate::fonts::LINE_HEIGHT_FACTOR;
use crate::layout_config::{LayoutBox, PageDescription, TextContent, TextSegment};
use crate::richtext::TextStyle;

/// Fraction of the font size between the top of the em box and the baseline.
const ASCENT_RATIO: f32 = 0.75;
const PT_TO_MM: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Convert a page container into PDF bytes.
///
/// Returns the PDF together with the number of pages converted.
pub fn convert_container(container: &[u8]) -> Result<(Vec<u8>, usize), ExportError> {
    let mut reader = ContainerReader::open(container)?;
    let title = reader.manifest().title.clone();
    let pages = reader.pages()?;
    let bytes = render_pdf(&title, &pages)?;
    Ok((bytes, pages.len()))
}

/// Draw page descriptions into a PDF document.
///
/// Images whose `src` is not a base64 data URI, or whose bytes cannot be
/// decoded, are skipped with a warning. An empty page list gives a PDF with
/// one blank A4 page.
pub fn render_pdf(title: &str, pages: &[PageDescription]) -> Result<Vec<u8>, ExportError> {
    let mut doc = PdfDocument::new(title);

    let mut srcs = BTreeSet::new();
    for page in pages {
        for lbox in &page.boxes {
            collect_image_srcs(lbox, &mut srcs);
        }
    }
    let images = register_images(&mut doc, &srcs);

    let mut pdf_pages: Vec<PdfPage> = pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for lbox in &page.boxes {
                render_box(&mut ops, lbox, page.height_pt, &images);
            }
            PdfPage::new(Mm(page.width_pt * PT_TO_MM), Mm(page.height_pt * PT_TO_MM), ops)
        })
        .collect();

    if pdf_pages.is_empty() {
        pdf_pages.push(PdfPage::new(Mm(210.0), Mm(297.0), Vec::new()));
    }

    doc.with_pages(pdf_pages);
    let mut warnings = Vec::new();
    // Raw text operators are dropped by the default secure mode.
    let options = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    let bytes = doc.save(&options, &mut warnings);
    if !bytes.starts_with(b"%PDF-") {
        return Err(ExportError::Pdf("writer produced no PDF header".to_string()));
    }
    log::debug!("converted {} page(s) to {} PDF bytes", pages.len(), bytes.len());
    Ok(bytes)
}

fn register_images(doc: &mut PdfDocument, srcs: &BTreeSet<&str>) -> HashMap<String, ImageResource> {
    let mut resources = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();

    for src in srcs {
        let bytes = match parse_data_uri(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("skipping image: {e}");
                continue;
            }
        };
        let decoded = match ::image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("skipping image: decode error: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("skipping image: PDF encode error: {e}");
                continue;
            }
        };
        resources.insert(
            src.to_string(),
            ImageResource {
                xobj_id: doc.add_image(&raw),
                px_width: decoded.width(),
                px_height: decoded.height(),
            },
        );
    }
    resources
}

/// Encode text as Windows-1252, the WinAnsiEncoding of the builtin fonts.
/// Characters outside it become `?`.
fn to_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Decode a `data:<mime>;base64,<data>` URI.
fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let preview: String = src.chars().take(80).collect();
        format!("image src must be a base64 data URI, got {preview:?}")
    })?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

fn collect_image_srcs<'a>(lbox: &'a LayoutBox, srcs: &mut BTreeSet<&'a str>) {
    if let Some(img) = &lbox.image {
        srcs.insert(img.src.as_str());
    }
    for child in &lbox.children {
        collect_image_srcs(child, srcs);
    }
}

fn rgb(color: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: color[0],
        g: color[1],
        b: color[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a box in PDF space, counter-clockwise from bottom-left.
fn corners(x: f32, top: f32, width: f32, height: f32) -> Vec<LinePoint> {
    vec![
        point(x, top - height),
        point(x + width, top - height),
        point(x + width, top),
        point(x, top),
    ]
}

fn builtin_font(style: TextStyle) -> BuiltinFont {
    match (style.contains(TextStyle::BOLD), style.contains(TextStyle::ITALIC)) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

/// Recursively render a box and its children. Layout space has its origin
/// at the top-left; PDF space at the bottom-left.
fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, page_height: f32, images: &HashMap<String, ImageResource>) {
    let top = page_height - lbox.y;

    if let Some(bg) = lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: corners(lbox.x, top, lbox.width, lbox.height),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &lbox.border {
        ops.push(Op::SetOutlineColor { col: rgb(border.color) });
        ops.push(Op::SetOutlineThickness { pt: Pt(border.width) });
        ops.push(Op::DrawLine {
            line: Line {
                points: corners(lbox.x, top, lbox.width, lbox.height),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &lbox.text {
        render_text(ops, lbox.x, top, text);
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // At 72 dpi one pixel is one point.
            let scale_x = if res.px_width > 0 { img.width / res.px_width as f32 } else { 1.0 };
            let scale_y = if res.px_height > 0 { img.height / res.px_height as f32 } else { 1.0 };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(top - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, page_height, images);
    }
}

fn render_text(ops: &mut Vec<Op>, x: f32, top: f32, text: &TextContent) {
    let base_size = text.line_height / LINE_HEIGHT_FACTOR;
    let leading = (text.line_height - base_size) / 2.0;

    for line in &text.lines {
        let baseline = top - line.y_offset - leading - base_size * ASCENT_RATIO;
        for segment in &line.segments {
            if segment.text.trim().is_empty() {
                continue;
            }
            render_segment(ops, x, baseline, text.color, segment);
        }
    }
}

fn render_segment(ops: &mut Vec<Op>, x: f32, baseline: f32, color: [f32; 4], segment: &TextSegment) {
    let font = builtin_font(segment.style);
    let sx = x + segment.x_offset;
    let sy = baseline + segment.rise;

    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(sx), y: Pt(sy) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(segment.font_size),
        font,
    });
    ops.push(Op::SetFillColor { col: rgb(color) });
    // printpdf copies builtin-font text into the stream as UTF-8, so the
    // encoded bytes go out through a raw `Tj`. The empty write keeps the font
    // in the page resources.
    ops.push(Op::WriteTextBuiltinFont { items: Vec::new(), font });
    ops.push(Op::Unknown {
        key: "Tj".to_string(),
        value: vec![DictItem::String {
            data: to_winansi(&segment.text),
            literal: false,
        }],
    });
    ops.push(Op::EndTextSection);

    let mut decorations = Vec::new();
    if segment.style.contains(TextStyle::UNDERLINE) {
        decorations.push(sy - segment.font_size * 0.1);
    }
    if segment.style.contains(TextStyle::STRIKETHROUGH) {
        decorations.push(sy + segment.font_size * 0.3);
    }
    for y in decorations {
        ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
        ops.push(Op::SetOutlineColor { col: rgb(color) });
        ops.push(Op::DrawLine {
            line: Line {
                points: vec![point(sx, y), point(sx + segment.width, y)],
                is_closed: false,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{write_container, ExportOptions};
    use crate::layout_config::{ImageContent, TextLine};

    fn text_page(n: usize) -> PageDescription {
        let mut lbox = LayoutBox::new(40.0, 40.0, 200.0, 20.0);
        lbox.text = Some(TextContent {
            lines: vec![TextLine {
                y_offset: 0.0,
                segments: vec![TextSegment {
                    text: format!("Page {n} – “quoted”"),
                    x_offset: 0.0,
                    width: 80.0,
                    font_size: 11.0,
                    rise: 0.0,
                    style: TextStyle::BOLD | TextStyle::UNDERLINE,
                    link: None,
                }],
            }],
            color: [0.0, 0.0, 0.0, 1.0],
            line_height: 13.2,
        });
        PageDescription {
            page_number: n,
            total_pages: 3,
            width_pt: 595.28,
            height_pt: 841.89,
            boxes: vec![lbox],
        }
    }

    #[test]
    fn empty_document_is_a_valid_pdf() {
        let bytes = render_pdf("empty", &[]).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn container_converts_every_page() {
        let pages: Vec<_> = (1..=3).map(text_page).collect();
        let container = write_container(&pages, &ExportOptions::titled("T")).unwrap();
        let (pdf, count) = convert_container(&container).unwrap();
        assert_eq!(count, 3);
        assert_eq!(&pdf[0..5], b"%PDF-");
    }

    #[test]
    fn unsupported_images_are_skipped() {
        let mut page = text_page(1);
        let mut lbox = LayoutBox::new(0.0, 0.0, 10.0, 10.0);
        lbox.image = Some(ImageContent {
            src: "https://example.com/logo.png".into(),
            width: 10.0,
            height: 10.0,
        });
        page.boxes.push(lbox);
        assert!(render_pdf("img", &[page]).is_ok());
    }

    #[test]
    fn data_uri_parsing() {
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert!(parse_data_uri("data:text/plain,hi").is_err());
        assert!(parse_data_uri("logo.png").is_err());
    }

    #[test]
    fn winansi_maps_typographic_characters() {
        assert_eq!(to_winansi("a–b"), vec![b'a', 0x96, b'b']);
        assert_eq!(to_winansi("é€"), vec![0xE9, 0x80]);
        assert_eq!(to_winansi("✓"), b"?".to_vec());
    }

    #[test]
    fn segments_write_encoded_bytes() {
        let segment = TextSegment {
            text: "café".to_string(),
            x_offset: 0.0,
            width: 20.0,
            font_size: 10.0,
            rise: 0.0,
            style: TextStyle::BOLD,
            link: None,
        };
        let mut ops = Vec::new();
        render_segment(&mut ops, 0.0, 100.0, [0.0, 0.0, 0.0, 1.0], &segment);
        let written: Vec<&Vec<u8>> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Unknown { key, value } if key == "Tj" => match value.as_slice() {
                    [DictItem::String { data, .. }] => Some(data),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(written, vec![&vec![b'c', b'a', b'f', 0xE9]]);
        assert!(ops
            .iter()
            .any(|op| matches!(op, Op::WriteTextBuiltinFont { font: BuiltinFont::HelveticaBold, .. })));
    }

    #[test]
    fn fonts_follow_style() {
        assert!(matches!(builtin_font(TextStyle::empty()), BuiltinFont::Helvetica));
        assert!(matches!(
            builtin_font(TextStyle::BOLD | TextStyle::ITALIC),
            BuiltinFont::HelveticaBoldOblique
        ));
    }
}
