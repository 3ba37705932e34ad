//! Legacy binary workbook (`.xls`) export.
//!
//! Writes a BIFF8 workbook stream and wraps it in a compound file. The
//! globals substream carries the default font and XF tables every reader
//! expects, followed by one BOUNDSHEET per table; each worksheet substream
//! holds COLINFO widths and LABEL cells.
//!
//! Record layouts follow [MS-XLS].

use super::{cfb, sheet_names};
use crate::error::ExportError;
use crate::table::TableData;

const BOF: u16 = 0x0809;
const EOF: u16 = 0x000A;
const CODEPAGE: u16 = 0x0042;
const WINDOW1: u16 = 0x003D;
const FONT: u16 = 0x0031;
const XF: u16 = 0x00E0;
const STYLE: u16 = 0x0293;
const BOUNDSHEET: u16 = 0x0085;
const COLINFO: u16 = 0x007D;
const DIMENSIONS: u16 = 0x0200;
const LABEL: u16 = 0x0204;
const WINDOW2: u16 = 0x023E;

const SUBSTREAM_GLOBALS: u16 = 0x0005;
const SUBSTREAM_WORKSHEET: u16 = 0x0010;
/// UTF-16LE; every string below is written either compressed or as UTF-16.
const CODEPAGE_UTF16: u16 = 1200;
/// Index of the default cell XF, after the 15 style XFs.
const DEFAULT_CELL_XF: u16 = 15;

/// Longest text a LABEL cell holds.
const MAX_LABEL_CHARS: usize = 255;
const MAX_ROWS: usize = 65_536;
const MAX_COLUMNS: usize = 256;

pub(crate) fn write_workbook(tables: &[TableData]) -> Result<Vec<u8>, ExportError> {
    let names = sheet_names(tables);
    let sheets = tables
        .iter()
        .zip(&names)
        .map(|(table, name)| worksheet(table, name))
        .collect::<Result<Vec<_>, _>>()?;

    // BOUNDSHEET records point at absolute sheet offsets, which depend on the
    // size of the globals; their own size does not depend on the offsets.
    let globals_len = globals(&names, &vec![0; names.len()]).len();
    let mut offsets = Vec::with_capacity(sheets.len());
    let mut at = globals_len;
    for sheet in &sheets {
        offsets.push(u32::try_from(at).map_err(|_| ExportError::TooLarge("workbook stream exceeds 4 GiB".into()))?);
        at += sheet.len();
    }

    let mut stream = globals(&names, &offsets);
    for sheet in &sheets {
        stream.extend_from_slice(sheet);
    }
    let bytes = cfb::write_single_stream("Workbook", &stream)?;
    log::info!("exported {} table(s) as XLS ({} bytes)", tables.len(), bytes.len());
    Ok(bytes)
}

fn record(out: &mut Vec<u8>, kind: u16, body: &[u8]) {
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

fn bof(out: &mut Vec<u8>, substream: u16) {
    let mut body = Vec::with_capacity(16);
    body.extend_from_slice(&0x0600u16.to_le_bytes()); // BIFF8
    body.extend_from_slice(&substream.to_le_bytes());
    body.extend_from_slice(&0x0DBBu16.to_le_bytes()); // build
    body.extend_from_slice(&0x07CCu16.to_le_bytes()); // build year
    body.extend_from_slice(&0u32.to_le_bytes()); // history flags
    body.extend_from_slice(&6u32.to_le_bytes()); // lowest BIFF version
    record(out, BOF, &body);
}

fn needs_utf16(text: &str) -> bool {
    text.chars().any(|c| c as u32 > 0xFF)
}

/// Character data of a BIFF8 string: option flags then the characters,
/// compressed to one byte each when every character fits in Latin-1.
fn string_chars(text: &str) -> Vec<u8> {
    if needs_utf16(text) {
        let mut out = vec![0x01];
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    } else {
        let mut out = vec![0x00];
        out.extend(text.chars().map(|c| c as u8));
        out
    }
}

/// Count of characters as stored: UTF-16 code units or Latin-1 bytes.
fn stored_len(text: &str) -> usize {
    if needs_utf16(text) {
        text.encode_utf16().count()
    } else {
        text.chars().count()
    }
}

fn globals(names: &[String], offsets: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    bof(&mut out, SUBSTREAM_GLOBALS);
    record(&mut out, CODEPAGE, &CODEPAGE_UTF16.to_le_bytes());

    let mut window = Vec::with_capacity(18);
    for value in [0u16, 0, 0x3000, 0x1E00, 0x0038] {
        window.extend_from_slice(&value.to_le_bytes());
    }
    window.extend_from_slice(&0u16.to_le_bytes()); // active sheet
    window.extend_from_slice(&0u16.to_le_bytes()); // first visible tab
    window.extend_from_slice(&1u16.to_le_bytes()); // selected tabs
    window.extend_from_slice(&0x0258u16.to_le_bytes());
    record(&mut out, WINDOW1, &window);

    // Font index 4 is never referenced, but readers expect four fonts
    // before it.
    let font = font("Arial");
    for _ in 0..5 {
        record(&mut out, FONT, &font);
    }
    for _ in 0..15 {
        record(&mut out, XF, &xf(true));
    }
    record(&mut out, XF, &xf(false));
    // Built-in "Normal" style on XF 0.
    record(&mut out, STYLE, &[0x00, 0x80, 0x00, 0xFF]);

    for (name, offset) in names.iter().zip(offsets) {
        let mut body = Vec::new();
        body.extend_from_slice(&offset.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes()); // visible worksheet
        body.push(stored_len(name) as u8);
        body.extend_from_slice(&string_chars(name));
        record(&mut out, BOUNDSHEET, &body);
    }

    record(&mut out, EOF, &[]);
    out
}

fn font(name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&200u16.to_le_bytes()); // 10pt in twips
    body.extend_from_slice(&0u16.to_le_bytes()); // attributes
    body.extend_from_slice(&0x7FFFu16.to_le_bytes()); // automatic color
    body.extend_from_slice(&400u16.to_le_bytes()); // normal weight
    body.extend_from_slice(&0u16.to_le_bytes()); // escapement
    body.extend_from_slice(&[0, 0, 0, 0]); // underline, family, charset, reserved
    body.push(stored_len(name) as u8);
    body.extend_from_slice(&string_chars(name));
    body
}

fn xf(style: bool) -> [u8; 20] {
    let mut body = [0u8; 20];
    // font 0, format 0 (General)
    let kind: u16 = if style { 0xFFF5 } else { 0x0001 };
    body[4..6].copy_from_slice(&kind.to_le_bytes());
    body[6] = 0x20; // bottom aligned
    if !style {
        // Cell XFs use their own font, alignment, border, pattern and protection.
        body[9] = 0xF8;
    }
    // pattern colours: foreground 64, background 65 (system defaults)
    body[18..20].copy_from_slice(&(64u16 | (65 << 7)).to_le_bytes());
    body
}

fn worksheet(table: &TableData, name: &str) -> Result<Vec<u8>, ExportError> {
    let rows: Vec<&Vec<String>> = table.all_rows().collect();
    let columns = table.column_count();
    if rows.len() > MAX_ROWS || columns > MAX_COLUMNS {
        return Err(ExportError::TooLarge(format!(
            "sheet '{name}' has {} rows and {columns} columns, the limit is {MAX_ROWS} x {MAX_COLUMNS}",
            rows.len()
        )));
    }

    let mut out = Vec::new();
    bof(&mut out, SUBSTREAM_WORKSHEET);

    for (col, width) in table.column_widths().into_iter().enumerate() {
        let width = ((width + 2).min(255) * 256) as u16;
        let mut body = Vec::with_capacity(12);
        body.extend_from_slice(&(col as u16).to_le_bytes());
        body.extend_from_slice(&(col as u16).to_le_bytes());
        body.extend_from_slice(&width.to_le_bytes());
        body.extend_from_slice(&DEFAULT_CELL_XF.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes()); // options
        body.extend_from_slice(&0u16.to_le_bytes()); // reserved
        record(&mut out, COLINFO, &body);
    }

    let mut dims = Vec::with_capacity(14);
    dims.extend_from_slice(&0u32.to_le_bytes());
    dims.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    dims.extend_from_slice(&0u16.to_le_bytes());
    dims.extend_from_slice(&(columns as u16).to_le_bytes());
    dims.extend_from_slice(&0u16.to_le_bytes());
    record(&mut out, DIMENSIONS, &dims);

    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let text: String = if value.chars().count() > MAX_LABEL_CHARS {
                log::warn!(
                    "sheet '{name}' cell ({}, {}) truncated to {MAX_LABEL_CHARS} characters",
                    r + 1,
                    c + 1
                );
                value.chars().take(MAX_LABEL_CHARS).collect()
            } else {
                value.clone()
            };
            let mut body = Vec::new();
            body.extend_from_slice(&(r as u16).to_le_bytes());
            body.extend_from_slice(&(c as u16).to_le_bytes());
            body.extend_from_slice(&DEFAULT_CELL_XF.to_le_bytes());
            body.extend_from_slice(&(stored_len(&text) as u16).to_le_bytes());
            body.extend_from_slice(&string_chars(&text));
            record(&mut out, LABEL, &body);
        }
    }

    let mut window = Vec::with_capacity(18);
    window.extend_from_slice(&0x06B6u16.to_le_bytes());
    window.extend_from_slice(&0u16.to_le_bytes()); // top row
    window.extend_from_slice(&0u16.to_le_bytes()); // left column
    window.extend_from_slice(&0x0040u32.to_le_bytes()); // header colour
    window.extend_from_slice(&[0u8; 8]); // zoom and reserved
    record(&mut out, WINDOW2, &window);

    record(&mut out, EOF, &[]);
    Ok(out)
}
