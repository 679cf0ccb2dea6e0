//! Overlay Core Library
//!
//! Annotation engine for paginated documents: places, edits and removes
//! visual objects over read-only page content, keeps per-page undo history,
//! searches and replaces original text, and serializes the result into
//! drawing instructions in the output coordinate system.
//!
//! # Example
//!
//! ```
//! use overlay_core::{AnnotationObject, Document, DocumentSource, Point, Size, TextContent};
//! use overlay_scheduler::CancellationToken;
//!
//! let doc = Document::load(DocumentSource::uniform(2, Size::new(600.0, 800.0))).unwrap();
//! let hello = AnnotationObject::text(0, Point::new(100.0, 100.0), TextContent::new("Hello", "Helvetica", 16.0));
//! doc.add(0, hello).unwrap();
//!
//! let output = doc.export(&CancellationToken::new()).unwrap();
//! assert_eq!(output.pages[0].instructions.len(), 1);
//! assert!(output.pages[1].instructions.is_empty());
//! ```

pub mod annotation;
pub mod config;
pub mod content_stream;
pub mod document;
pub mod error;
pub mod find_replace;
pub mod fonts;
pub mod geometry;
pub mod history;
pub mod indexing;
pub mod scene;
pub mod serializer;
pub mod text_layout;
pub mod tool;

pub use annotation::{
    AnnotationId, AnnotationObject, FontStyle, FontWeight, ImageContent, ImageEncoding, ImageSource,
    KindTag, LinkTarget, ObjectKind, ObjectPatch, ObjectStyle, RasterHandle, Subtype, TextContent,
};
pub use config::EditorConfig;
pub use content_stream::{encode_page, EncodedPage};
pub use document::{Document, DocumentSource, PageSource};
pub use error::{
    ConfigError, DocumentError, DocumentResult, ExportError, ExportResult, IndexError, IndexResult,
};
pub use find_replace::{FindReplace, ReplaceOutcome};
pub use fonts::{FontFamily, FontVariant, StandardFont};
pub use geometry::{Color, Flip, Point, Rect, Scale, Size};
pub use history::{CheckpointOutcome, PageHistory};
pub use indexing::{IndexBuilder, IndexOutcome, TextSource};
pub use scene::{PageScene, SceneSnapshot};
pub use serializer::{
    serialize_document, serialize_page, DrawInstruction, ExportOutput, ImageEmbedReport, PageOutput,
};
pub use text_layout::{IndexStats, PageTextLayout, SearchMatch, TextLayoutIndex, TextRun};
pub use tool::{
    generate_handles, is_interactive, HandleType, Key, ManipulationHandle, ToolEvent, ToolInput,
    ToolMode, ToolState,
};
