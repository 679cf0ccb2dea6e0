//! Error types
//!
//! User-input mistakes (deleting protected content, undo with an empty
//! stack, stale ids) are not errors: those operations return `bool` or
//! `Option` and do nothing.

use crate::annotation::{AnnotationId, ImageEncoding};

/// Document loading and page addressing errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("page {page} has a non-positive size")]
    InvalidPageSize { page: u32 },

    #[error("document has no pages")]
    EmptyDocument,
}

/// Export errors
///
/// Image errors are per object and never escape a page; only
/// `Cancelled` and `AllPagesFailed` reach callers of a document export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("image {id} could not be decoded: {reason}")]
    ImageDecode { id: AnnotationId, reason: String },

    #[error("image {id} has unsupported encoding {encoding:?}")]
    UnsupportedImage {
        id: AnnotationId,
        encoding: ImageEncoding,
    },

    #[error("content stream encoding failed: {0}")]
    Encode(String),

    #[error("export cancelled before page {page}")]
    Cancelled { page: u32 },

    #[error("all {page_count} pages failed to serialize")]
    AllPagesFailed { page_count: u32 },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl From<lopdf::Error> for ExportError {
    fn from(err: lopdf::Error) -> Self {
        ExportError::Encode(err.to_string())
    }
}

/// Text extraction errors reported by a [`crate::indexing::TextSource`]
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("text extraction failed for page {page}: {reason}")]
    Extraction { page: u32, reason: String },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type DocumentResult<T> = Result<T, DocumentError>;
pub type ExportResult<T> = Result<T, ExportError>;
pub type IndexResult<T> = Result<T, IndexError>;
