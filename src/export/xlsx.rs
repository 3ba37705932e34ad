//! SpreadsheetML (`.xlsx`) workbook export.
//!
//! Cells are written as inline strings, so the package needs no shared
//! string table. Column widths are set from the longest cell text.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

use super::sheet_names;
use crate::error::ExportError;
use crate::table::TableData;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Widest column Excel accepts, in characters.
const MAX_COLUMN_WIDTH: usize = 255;

pub(crate) fn write_workbook(tables: &[TableData]) -> Result<Vec<u8>, ExportError> {
    let names = sheet_names(tables);

    let mut parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".into(), content_types(tables.len())),
        ("_rels/.rels".into(), root_rels()),
        ("xl/workbook.xml".into(), workbook(&names)),
        ("xl/_rels/workbook.xml.rels".into(), workbook_rels(tables.len())),
        ("xl/styles.xml".into(), styles()),
    ];
    for (i, table) in tables.iter().enumerate() {
        parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), worksheet(table, i == 0)));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    for (path, xml) in &parts {
        zip.start_file(path.as_str(), options)?;
        zip.write_all(xml.as_bytes())?;
    }
    let bytes = zip.finish()?.into_inner();
    log::info!("exported {} table(s) as XLSX ({} bytes)", tables.len(), bytes.len());
    Ok(bytes)
}

fn content_types(sheets: usize) -> String {
    let mut xml = format!(
        r#"{XML_HEADER}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#
    );
    for n in 1..=sheets {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn root_rels() -> String {
    format!(
        r#"{XML_HEADER}<Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{REL_TYPE}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
    )
}

fn workbook(names: &[String]) -> String {
    let mut xml = format!(r#"{XML_HEADER}<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">"#);
    if !names.is_empty() {
        xml.push_str(r#"<bookViews><workbookView activeTab="0"/></bookViews>"#);
    }
    xml.push_str("<sheets>");
    for (i, name) in names.iter().enumerate() {
        let n = i + 1;
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape(name.as_str())
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheets: usize) -> String {
    let mut xml = format!(r#"{XML_HEADER}<Relationships xmlns="{NS_PKG_REL}">"#);
    for n in 1..=sheets {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{REL_TYPE}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }
    xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="{REL_TYPE}/styles" Target="styles.xml"/></Relationships>"#,
        sheets + 1
    ));
    xml
}

fn styles() -> String {
    format!(
        r#"{XML_HEADER}<styleSheet xmlns="{NS_MAIN}"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#
    )
}

fn worksheet(table: &TableData, selected: bool) -> String {
    let mut xml = format!(r#"{XML_HEADER}<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">"#);
    if selected {
        xml.push_str(r#"<sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews>"#);
    }

    let widths = table.column_widths();
    if !widths.is_empty() {
        xml.push_str("<cols>");
        for (i, width) in widths.iter().enumerate() {
            xml.push_str(&format!(
                r#"<col min="{n}" max="{n}" width="{}" bestFit="1" customWidth="1"/>"#,
                column_width(*width),
                n = i + 1
            ));
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");
    for (r, row) in table.all_rows().enumerate() {
        let r = r + 1;
        xml.push_str(&format!(r#"<row r="{r}">"#));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            xml.push_str(&format!(
                r#"<c r="{}{r}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_to_letters(c as u32 + 1),
                escape(value.as_str())
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Column width in character units, with padding for cell margins.
fn column_width(chars: usize) -> usize {
    (chars + 2).min(MAX_COLUMN_WIDTH)
}

/// 1-based column number to its letter reference (`1` → `A`, `27` → `AA`).
fn column_to_letters(col: u32) -> String {
    let mut letters = String::new();
    let mut col = col;
    while col > 0 {
        col -= 1;
        letters.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }
    letters
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn table() -> TableData {
        TableData {
            name: Some("T".into()),
            header: Some(vec!["A".into(), "B".into()]),
            rows: vec![vec!["1".into(), "x<y & \"z\"".into()]],
        }
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn workbook_has_named_active_sheet() {
        let bytes = write_workbook(&[table()]).unwrap();
        let workbook = part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"<sheet name="T" sheetId="1" r:id="rId1"/>"#));
        assert!(workbook.contains(r#"activeTab="0""#));
    }

    #[test]
    fn sheet_holds_header_rows_and_widths() {
        let bytes = write_workbook(&[table()]).unwrap();
        let sheet = part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">A</t></is></c>"#));
        assert!(sheet.contains(r#"<c r="B2" t="inlineStr"><is><t xml:space="preserve">x&lt;y &amp; &quot;z&quot;</t></is></c>"#));
        assert!(sheet.contains(r#"<col min="2" max="2" width="11""#));
        assert_eq!(sheet.matches("<row ").count(), 2);
    }

    #[test]
    fn empty_cells_are_left_out() {
        let mut t = table();
        t.rows = vec![vec![String::new(), "b".into()]];
        let sheet = part(&write_workbook(&[t]).unwrap(), "xl/worksheets/sheet1.xml");
        assert!(!sheet.contains(r#"r="A2""#));
        assert!(sheet.contains(r#"r="B2""#));
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_to_letters(1), "A");
        assert_eq!(column_to_letters(26), "Z");
        assert_eq!(column_to_letters(27), "AA");
        assert_eq!(column_to_letters(703), "AAA");
    }

    #[test]
    fn no_tables_has_no_active_tab() {
        let bytes = write_workbook(&[]).unwrap();
        assert!(!part(&bytes, "xl/workbook.xml").contains("activeTab"));
    }
}
