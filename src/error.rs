//! Error types for report-forge.
//!
//! Low-level failures (I/O, parsing, activation) are wrapped into the error
//! of the public operation that observed them, keeping the original cause
//! reachable through [`std::error::Error::source`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for report-forge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed HTML or a malformed document definition.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input bytes are not valid UTF-8.
    #[error("input is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The HTML tokenizer hit the end of input inside a construct.
    #[error("malformed HTML at byte {position}: {message}")]
    Html { position: usize, message: String },

    /// A JSON document definition could not be deserialized.
    #[error("malformed document definition: {0}")]
    Definition(#[from] serde_json::Error),
}

/// A file or a registered resource does not exist.
#[derive(Error, Debug)]
pub enum NotFoundError {
    #[error("file not found: {}", .0.display())]
    File(PathBuf),

    #[error("resource not found: {0}")]
    Uri(String),

    #[error("no document registered under '{0}'")]
    Document(String),

    #[error("no data context registered under '{0}'")]
    Context(String),
}

/// Errors raised by the public HTML conversion entry points.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("HTML could not be read: {0}")]
    Io(#[from] io::Error),

    #[error("invalid URI '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    /// Transport failures and error statuses other than 404.
    #[error("HTML could not be retrieved from {uri}")]
    Retrieval {
        uri: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A page template could not be instantiated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("invalid page size {width}x{height}")]
    InvalidSize { width: f32, height: f32 },

    #[error("page margins leave no room for content")]
    NoContentArea,

    #[error("template declares {0} content regions, expected at most one")]
    MultipleContentRegions(usize),

    #[error("page layout failed: {0}")]
    Layout(String),
}

/// Document or data context construction failed.
#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("document '{name}' could not be instantiated")]
    Document {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("data context '{name}' could not be instantiated")]
    Context {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("parameters for data context '{name}' are invalid")]
    Parameters {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// Any failure while rendering document parts into pages.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("page template could not be instantiated")]
    Template(#[from] TemplateError),

    #[error("page template has no content region")]
    MissingContentRegion,

    #[error("paginator failed: {0}")]
    Paginator(String),

    #[error("paginator dropped its completion callback")]
    PaginatorAborted,

    #[error("bound HTML at '{path}' could not be converted")]
    Html {
        path: String,
        #[source]
        source: ConvertError,
    },

    #[error("document could not be loaded")]
    Definition(#[source] ConvertError),

    #[error("data context could not be activated")]
    Activation(#[from] ActivationError),

    #[error("render worker is not running")]
    WorkerStopped,

    #[error("render job panicked: {0}")]
    WorkerPanicked(String),
}

/// Any failure while serializing pages or tables.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("document could not be rendered")]
    Render(#[from] RenderError),

    #[error("package error: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("page description error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF conversion failed: {0}")]
    Pdf(String),

    #[error("page container is missing part '{0}'")]
    MissingPart(String),

    #[error("workbook exceeds the legacy format limit: {0}")]
    TooLarge(String),

    #[error("unsupported output format for '{}'", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("output could not be written: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error for callers that do not care which stage failed.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
