//! The reporting service: activation, rendering and export entry points.
//!
//! Every render and serialization runs as one job on the service's
//! [`RenderWorker`]. Only the finished byte buffer comes back to the caller,
//! who then writes it out with async I/O. Nothing reaches the destination
//! unless the whole export succeeded.

use std::io;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::binding::DataContext;
use crate::document::Document;
use crate::error::{ExportError, RenderError};
use crate::export::{write_document, write_tables, DocumentFormat, ExportOptions, TableFormat};
use crate::page::Page;
use crate::registry::ContextRegistry;
use crate::table::{Table, TableData};
use crate::worker::RenderWorker;

/// Renders registered documents and exports documents and tables.
#[derive(Clone)]
pub struct ReportingService {
    registry: Arc<ContextRegistry>,
    worker: Arc<RenderWorker>,
}

impl ReportingService {
    /// Create a service with its own render worker.
    pub fn new(registry: ContextRegistry) -> io::Result<Self> {
        Ok(Self::with_worker(registry, Arc::new(RenderWorker::spawn()?)))
    }

    /// Create a service sharing an existing render worker.
    pub fn with_worker(registry: ContextRegistry, worker: Arc<RenderWorker>) -> Self {
        Self {
            registry: Arc::new(registry),
            worker,
        }
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Activate the document registered as `name` and render it.
    pub async fn render(&self, name: &str, params: Value) -> Result<Vec<Page>, RenderError> {
        let registry = Arc::clone(&self.registry);
        let name = name.to_string();
        self.worker
            .run(move || async move {
                let (document, context) = registry.activate(&name, params)?;
                document.render(&context).await
            })
            .await?
    }

    /// Render a document that is already built, against `context`, and
    /// serialize it into `format`.
    pub async fn export_built_document(
        &self,
        document: Document,
        context: DataContext,
        format: DocumentFormat,
    ) -> Result<Vec<u8>, ExportError> {
        self.worker
            .run(move || async move { render_to_bytes(&document, &context, format).await })
            .await?
    }

    /// Export the document registered as `name` to `output`.
    pub async fn export_document<W>(
        &self,
        name: &str,
        format: DocumentFormat,
        output: &mut W,
        params: Value,
    ) -> Result<(), ExportError>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.document_bytes(name, format, params).await?;
        write_out(output, &bytes).await
    }

    /// Export the document registered as `name` to a file. The file is only
    /// created once the export has succeeded.
    pub async fn export_document_to_file(
        &self,
        name: &str,
        format: DocumentFormat,
        path: impl AsRef<Path>,
        params: Value,
    ) -> Result<(), ExportError> {
        let bytes = self.document_bytes(name, format, params).await?;
        tokio::fs::write(path.as_ref(), &bytes).await?;
        log::info!("wrote {} bytes to {}", bytes.len(), path.as_ref().display());
        Ok(())
    }

    /// Export a JSON document definition loaded from `path`.
    ///
    /// With a context name, the registered context is activated with
    /// `params`; without one, `params` itself is the data context.
    pub async fn export_definition<W>(
        &self,
        path: impl AsRef<Path>,
        context: Option<&str>,
        format: DocumentFormat,
        output: &mut W,
        params: Value,
    ) -> Result<(), ExportError>
    where
        W: AsyncWrite + Unpin,
    {
        let path = path.as_ref().to_path_buf();
        let registry = Arc::clone(&self.registry);
        let context = context.map(str::to_string);
        let bytes = self
            .worker
            .run(move || async move {
                let document = Document::load(&path).map_err(RenderError::Definition)?;
                let context = match context {
                    Some(name) => registry.create_context(&name, params).map_err(RenderError::from)?,
                    None => params,
                };
                render_to_bytes(&document, &context, format).await
            })
            .await??;
        write_out(output, &bytes).await
    }

    /// Export tables to `output`, one block or sheet per table.
    pub async fn export_tables<T, W>(
        &self,
        tables: &[Table<T>],
        format: TableFormat,
        output: &mut W,
    ) -> Result<(), ExportError>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.table_bytes(tables, format).await?;
        write_out(output, &bytes).await
    }

    /// Export tables to a file, created only once serialization succeeded.
    pub async fn export_tables_to_file<T>(
        &self,
        tables: &[Table<T>],
        format: TableFormat,
        path: impl AsRef<Path>,
    ) -> Result<(), ExportError> {
        let bytes = self.table_bytes(tables, format).await?;
        tokio::fs::write(path.as_ref(), &bytes).await?;
        log::info!("wrote {} bytes to {}", bytes.len(), path.as_ref().display());
        Ok(())
    }

    /// Export a single table to `output`.
    pub async fn export_table<T, W>(&self, table: &Table<T>, format: TableFormat, output: &mut W) -> Result<(), ExportError>
    where
        W: AsyncWrite + Unpin,
    {
        self.export_tables(std::slice::from_ref(table), format, output).await
    }

    async fn document_bytes(&self, name: &str, format: DocumentFormat, params: Value) -> Result<Vec<u8>, ExportError> {
        let registry = Arc::clone(&self.registry);
        let name = name.to_string();
        self.worker
            .run(move || async move {
                let (document, context) = registry.activate(&name, params).map_err(RenderError::from)?;
                render_to_bytes(&document, &context, format).await
            })
            .await?
    }

    async fn table_bytes<T>(&self, tables: &[Table<T>], format: TableFormat) -> Result<Vec<u8>, ExportError> {
        // Formatters run here; only plain cell text moves to the worker.
        let data: Vec<TableData> = tables.iter().map(Table::materialize).collect();
        self.worker.run(move || async move { write_tables(&data, format) }).await?
    }
}

async fn render_to_bytes(document: &Document, context: &DataContext, format: DocumentFormat) -> Result<Vec<u8>, ExportError> {
    let pages = document.render(context).await?;
    let descriptions: Vec<_> = pages.iter().map(Page::description).collect();
    let bytes = write_document(&descriptions, format, &ExportOptions::titled(document.title()))?;
    log::info!(
        "exported '{}': {} page(s) as {:?}, {} bytes",
        document.title(),
        descriptions.len(),
        format,
        bytes.len()
    );
    Ok(bytes)
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, bytes: &[u8]) -> Result<(), ExportError> {
    output.write_all(bytes).await?;
    output.flush().await?;
    Ok(())
}
