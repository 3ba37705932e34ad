//! Delimited text export.
//!
//! Every field is quoted, fields are separated by `;`, and a quote inside a
//! field is escaped with a backslash rather than doubled. With more than one
//! table each block starts with the table name on its own line and blocks
//! are separated by a blank line.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::ExportError;
use crate::table::TableData;

pub(crate) fn write_csv(tables: &[TableData]) -> Result<Vec<u8>, ExportError> {
    let named = tables.len() > 1;
    let mut blocks = Vec::with_capacity(tables.len());
    for table in tables {
        let mut block = String::new();
        if named {
            block.push_str(table.name.as_deref().map(str::trim).unwrap_or_default());
            block.push('\n');
        }
        block.push_str(&write_block(table)?);
        blocks.push(block);
    }
    let out = blocks.join("\n\n");
    log::info!("exported {} table(s) as delimited text ({} bytes)", tables.len(), out.len());
    Ok(out.into_bytes())
}

fn write_block(table: &TableData) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Always)
        .double_quote(false)
        .escape(b'\\')
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    for row in table.all_rows() {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
}
