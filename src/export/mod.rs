//! Serialization of rendered pages and of tables.
//!
//! Documents are written either to the native page container (a ZIP package
//! of page descriptions) or to PDF, which is always derived from the
//! container. Tables are written as delimited text or as a legacy (BIFF8) or
//! modern (SpreadsheetML) workbook.

pub mod cfb;
mod container;
mod delimited;
mod pdf;
mod xls;
mod xlsx;

use std::collections::HashSet;
use std::path::Path;

use crate::error::ExportError;
use crate::layout_config::PageDescription;
use crate::table::TableData;

pub use container::{write_container, ContainerManifest, ContainerReader, CONTAINER_EXTENSION};
pub use pdf::{convert_container, render_pdf};

/// Output format of a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Native page container (`.rfpc`).
    Container,
    /// PDF, converted from the container.
    Pdf,
}

impl DocumentFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref();
        match extension_of(path).as_deref() {
            Some(CONTAINER_EXTENSION) => Ok(Self::Container),
            Some("pdf") => Ok(Self::Pdf),
            _ => Err(ExportError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Container => CONTAINER_EXTENSION,
            Self::Pdf => "pdf",
        }
    }
}

/// Output format of a table export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    Csv,
    /// Legacy binary workbook.
    Xls,
    /// SpreadsheetML workbook.
    Xlsx,
}

impl TableFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref();
        match extension_of(path).as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("xls") => Ok(Self::Xls),
            Some("xlsx") => Ok(Self::Xlsx),
            _ => Err(ExportError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Document-level export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub title: String,
}

impl ExportOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

/// Serialize rendered pages into `format`.
pub fn write_document(
    pages: &[PageDescription],
    format: DocumentFormat,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let container = write_container(pages, options)?;
    match format {
        DocumentFormat::Container => Ok(container),
        DocumentFormat::Pdf => {
            let (pdf, converted) = convert_container(&container)?;
            if converted != pages.len() {
                return Err(ExportError::Pdf(format!(
                    "converted {converted} of {} page(s)",
                    pages.len()
                )));
            }
            Ok(pdf)
        }
    }
}

/// Serialize materialized tables into `format`.
pub fn write_tables(tables: &[TableData], format: TableFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        TableFormat::Csv => delimited::write_csv(tables),
        TableFormat::Xls => xls::write_workbook(tables),
        TableFormat::Xlsx => xlsx::write_workbook(tables),
    }
}

const MAX_SHEET_NAME: usize = 31;
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Worksheet names for `tables`, in order.
///
/// Names come from the table name with characters spreadsheets reject
/// removed and cut to 31 characters. Unnamed tables (or names that end up
/// empty) get `Sheet{n}`. Duplicates are suffixed ` (2)`, ` (3)`, ...
pub(crate) fn sheet_names(tables: &[TableData]) -> Vec<String> {
    let mut used = HashSet::new();
    tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            let base = table
                .name
                .as_deref()
                .map(sanitize_sheet_name)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("Sheet{}", i + 1));

            let mut name = base.clone();
            let mut n = 2;
            while !used.insert(name.to_lowercase()) {
                let suffix = format!(" ({n})");
                let keep = MAX_SHEET_NAME - suffix.chars().count();
                name = base.chars().take(keep).collect::<String>() + &suffix;
                n += 1;
            }
            name
        })
        .collect()
}

fn sanitize_sheet_name(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_SHEET_CHARS.contains(c))
        .take(MAX_SHEET_NAME)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: Option<&str>) -> TableData {
        TableData {
            name: name.map(str::to_string),
            ..TableData::default()
        }
    }

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(DocumentFormat::from_path("out.PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path("out.rfpc").unwrap(), DocumentFormat::Container);
        assert_eq!(TableFormat::from_path("t.csv").unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path("t.xls").unwrap(), TableFormat::Xls);
        assert_eq!(TableFormat::from_path("t.xlsx").unwrap(), TableFormat::Xlsx);
        assert!(matches!(
            TableFormat::from_path("t.ods"),
            Err(ExportError::UnsupportedFormat(_))
        ));
        assert!(DocumentFormat::from_path("noext").is_err());
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        let tables = [
            named(Some("Q1/Q2 [draft]")),
            named(None),
            named(Some("Totals")),
            named(Some("totals")),
            named(Some("???")),
            named(Some("An extremely long worksheet name that overflows")),
        ];
        let names = sheet_names(&tables);
        assert_eq!(names[0], "Q1Q2 draft");
        assert_eq!(names[1], "Sheet2");
        assert_eq!(names[2], "Totals");
        assert_eq!(names[3], "totals (2)");
        assert_eq!(names[4], "Sheet5");
        assert_eq!(names[5].chars().count(), 31);
    }
}
