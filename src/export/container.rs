//! The native page container.
//!
//! A ZIP package holding one JSON page description per page:
//!
//! ```text
//! [Content_Types].xml
//! Document.json        manifest: title, page count, page part names, page size
//! Pages/1.json
//! Pages/2.json
//! ...
//! ```
//!
//! Entries carry a fixed timestamp so identical pages give identical bytes.

use std::io::{Cursor, Read, Seek, Write};

use serde::{Deserialize, Serialize};
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

use super::ExportOptions;
use crate::error::ExportError;
use crate::layout_config::PageDescription;

/// File extension of the page container.
pub const CONTAINER_EXTENSION: &str = "rfpc";

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const MANIFEST_PART: &str = "Document.json";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="json" ContentType="application/json"/><Default Extension="xml" ContentType="application/xml"/></Types>"#;

/// Contents of `Document.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerManifest {
    pub title: String,
    pub page_count: usize,
    /// Part names of the pages, in page order.
    pub pages: Vec<String>,
    /// Size of the first page in points; `[0, 0]` for an empty document.
    pub page_size: [f32; 2],
}

fn page_part_name(page_number: usize) -> String {
    format!("Pages/{page_number}.json")
}

/// Write `pages` into a new container.
pub fn write_container(pages: &[PageDescription], options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let manifest = ContainerManifest {
        title: options.title.clone(),
        page_count: pages.len(),
        pages: (1..=pages.len()).map(page_part_name).collect(),
        page_size: pages
            .first()
            .map(|p| [p.width_pt, p.height_pt])
            .unwrap_or_default(),
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    zip.start_file(CONTENT_TYPES_PART, file_options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file(MANIFEST_PART, file_options)?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    for (part, page) in manifest.pages.iter().zip(pages) {
        zip.start_file(part.as_str(), file_options)?;
        zip.write_all(page.to_json()?.as_bytes())?;
    }

    let bytes = zip.finish()?.into_inner();
    log::debug!("wrote page container with {} page(s), {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}

/// Read access to a page container.
pub struct ContainerReader<R> {
    archive: ZipArchive<R>,
    manifest: ContainerManifest,
}

impl<'a> ContainerReader<Cursor<&'a [u8]>> {
    /// Open a container held in memory.
    pub fn open(bytes: &'a [u8]) -> Result<Self, ExportError> {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ContainerReader<R> {
    pub fn new(reader: R) -> Result<Self, ExportError> {
        let mut archive = ZipArchive::new(reader)?;
        let manifest = serde_json::from_str(&read_part(&mut archive, MANIFEST_PART)?)?;
        Ok(Self { archive, manifest })
    }

    pub fn manifest(&self) -> &ContainerManifest {
        &self.manifest
    }

    pub fn page_count(&self) -> usize {
        self.manifest.page_count
    }

    /// Page at `index` (0-based).
    pub fn page(&mut self, index: usize) -> Result<PageDescription, ExportError> {
        let part = self
            .manifest
            .pages
            .get(index)
            .cloned()
            .ok_or_else(|| ExportError::MissingPart(page_part_name(index + 1)))?;
        let json = read_part(&mut self.archive, &part)?;
        Ok(PageDescription::from_json(&json)?)
    }

    /// All pages, in order.
    pub fn pages(&mut self) -> Result<Vec<PageDescription>, ExportError> {
        (0..self.page_count()).map(|i| self.page(i)).collect()
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, ExportError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Err(ExportError::MissingPart(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::LayoutBox;

    fn page(n: usize) -> PageDescription {
        PageDescription {
            page_number: n,
            total_pages: 2,
            width_pt: 300.0,
            height_pt: 400.0,
            boxes: vec![LayoutBox::new(10.0, n as f32, 50.0, 20.0)],
        }
    }

    #[test]
    fn container_lists_pages_in_order() {
        let bytes = write_container(&[page(1), page(2)], &ExportOptions::titled("Doc")).unwrap();
        let mut reader = ContainerReader::open(&bytes).unwrap();
        let manifest = reader.manifest().clone();
        assert_eq!(manifest.title, "Doc");
        assert_eq!(manifest.page_count, 2);
        assert_eq!(manifest.pages, vec!["Pages/1.json", "Pages/2.json"]);
        assert_eq!(manifest.page_size, [300.0, 400.0]);
        assert_eq!(reader.pages().unwrap(), vec![page(1), page(2)]);
    }

    #[test]
    fn empty_document_still_has_a_manifest() {
        let bytes = write_container(&[], &ExportOptions::default()).unwrap();
        let reader = ContainerReader::open(&bytes).unwrap();
        assert_eq!(reader.page_count(), 0);
        assert_eq!(reader.manifest().page_size, [0.0, 0.0]);
    }

    #[test]
    fn missing_manifest_is_reported() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(
            ContainerReader::open(&bytes),
            Err(ExportError::MissingPart(ref p)) if p == MANIFEST_PART
        ));
    }

    #[test]
    fn output_is_deterministic() {
        let a = write_container(&[page(1)], &ExportOptions::titled("x")).unwrap();
        let b = write_container(&[page(1)], &ExportOptions::titled("x")).unwrap();
        assert_eq!(a, b);
    }
}
