//! Positioned documents for source and generated text.
//!
//! The registry caches one [`PositionedDocument`] per URI. An entry is valid
//! for exactly one snapshot; asking with a newer snapshot rebuilds it on the
//! spot. Entries are only removed by explicit calls made by the session,
//! when a document closes or a rebuild drops embedded files.

use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::{Position, Url};
use tracing::trace;

use super::snapshot::{SnapshotId, TextSnapshot};
use super::text::LineIndex;

/// A text document wrapper that resolves line/character positions.
#[derive(Debug, Clone)]
pub struct PositionedDocument {
    pub uri: Url,
    pub language_id: String,
    snapshot: TextSnapshot,
    line_index: LineIndex,
}

impl PositionedDocument {
    pub fn new(uri: Url, language_id: impl Into<String>, snapshot: TextSnapshot) -> Self {
        let line_index = LineIndex::new(snapshot.shared_text());
        Self {
            uri,
            language_id: language_id.into(),
            snapshot,
            line_index,
        }
    }

    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot.id()
    }

    pub fn text(&self) -> &str {
        self.snapshot.text()
    }

    pub fn position_at(&self, offset: usize) -> Position {
        self.line_index.offset_to_position(offset)
    }

    pub fn offset_at(&self, position: Position) -> usize {
        self.line_index.position_to_offset(position)
    }

    pub fn range_at(&self, span: &Range<usize>) -> tower_lsp::lsp_types::Range {
        self.line_index.span_to_range(span)
    }

    pub fn span_at(&self, range: tower_lsp::lsp_types::Range) -> Range<usize> {
        self.line_index.range_to_span(range)
    }
}

/// Cache of positioned documents keyed by URI and snapshot identity.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: DashMap<Url, Arc<PositionedDocument>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Get the document for `uri` at `snapshot`, rebuilding a stale entry.
    pub fn get(&self, uri: &Url, language_id: &str, snapshot: &TextSnapshot) -> Arc<PositionedDocument> {
        if let Some(existing) = self.documents.get(uri) {
            if existing.snapshot_id() == snapshot.id() && existing.language_id == language_id {
                return Arc::clone(existing.value());
            }
        }

        trace!("Building positioned document for {} ({})", uri, language_id);
        let document = Arc::new(PositionedDocument::new(
            uri.clone(),
            language_id,
            snapshot.clone(),
        ));
        self.documents.insert(uri.clone(), Arc::clone(&document));
        document
    }

    /// Cached entry for `uri`, whatever snapshot it was built from.
    pub fn peek(&self, uri: &Url) -> Option<Arc<PositionedDocument>> {
        self.documents.get(uri).map(|r| Arc::clone(r.value()))
    }

    pub fn dispose(&self, uri: &Url) {
        self.documents.remove(uri);
    }

    /// Drop a source document and every generated document derived from it.
    pub fn dispose_source(&self, source: &Url) {
        self.documents
            .retain(|uri, _| !is_same_or_embedded(uri, source));
    }

    /// Drop generated documents of `source` whose id is not in `live`.
    /// Called after a rebuild, which may remove or rename embedded files.
    pub fn dispose_stale_embedded<'a>(&self, source: &Url, live: impl IntoIterator<Item = &'a str>) {
        let live: Vec<Url> = live.into_iter().map(|id| embedded_uri(source, id)).collect();
        self.documents.retain(|uri, _| {
            uri == source || !is_same_or_embedded(uri, source) || live.contains(uri)
        });
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// URI of the generated document `id` inside `source`.
pub fn embedded_uri(source: &Url, id: &str) -> Url {
    let mut uri = source.clone();
    uri.set_fragment(Some(id));
    uri
}

fn is_same_or_embedded(uri: &Url, source: &Url) -> bool {
    let mut base = uri.clone();
    base.set_fragment(None);
    &base == source
}
