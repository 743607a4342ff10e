//! Source documents, text snapshots and positioned views.
//!
//! This module provides:
//! - `TextSnapshot`, the immutable text every other layer works on
//! - `LineIndex` for byte offset <-> LSP position conversion
//! - `SourceFile` and `DocumentStore` for the document lifecycle
//! - `DocumentRegistry` caching positioned views of source and generated text

mod registry;
mod snapshot;
mod state;
mod text;

pub use registry::{embedded_uri, DocumentRegistry, PositionedDocument};
pub use snapshot::{SnapshotId, TextSnapshot};
pub use state::{DocumentStore, SourceFile};
pub use text::LineIndex;
