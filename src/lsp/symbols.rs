//! Block-level document symbols and folding ranges.
//!
//! Both are derived from the projected tree alone: every embedded file whose
//! mappings allow the feature contributes its source extent.

use tower_lsp::lsp_types::{DocumentSymbol, FoldingRange, FoldingRangeKind, SymbolKind};

use crate::document::{PositionedDocument, SourceFile};
use crate::mapping::Feature;
use crate::router::FeatureRouter;
use crate::virtual_file::{EmbeddedFile, EmbeddedKind};

fn symbol_kind(kind: &EmbeddedKind) -> SymbolKind {
    match kind {
        EmbeddedKind::Root => SymbolKind::FILE,
        EmbeddedKind::Template => SymbolKind::OBJECT,
        EmbeddedKind::TemplateCode => SymbolKind::FUNCTION,
        EmbeddedKind::Script { .. } => SymbolKind::MODULE,
        EmbeddedKind::Style { .. } => SymbolKind::NAMESPACE,
        EmbeddedKind::Custom { .. } => SymbolKind::STRUCT,
    }
}

#[allow(deprecated)]
fn symbol_for(file: &EmbeddedFile, source: &PositionedDocument) -> Option<DocumentSymbol> {
    let extent = FeatureRouter::new(file).source_extent(Feature::DocumentSymbol)?;
    let range = source.range_at(&extent);
    let children: Vec<DocumentSymbol> = file
        .children
        .iter()
        .filter_map(|child| symbol_for(child, source))
        .collect();

    Some(DocumentSymbol {
        name: file.kind.to_string(),
        detail: Some(file.language_id.clone()),
        kind: symbol_kind(&file.kind),
        tags: None,
        deprecated: None,
        range,
        selection_range: range,
        children: (!children.is_empty()).then_some(children),
    })
}

/// One symbol per embedded file, nested the way the tree is.
pub fn document_symbols(file: &SourceFile, source: &PositionedDocument) -> Vec<DocumentSymbol> {
    file.root
        .children
        .iter()
        .filter_map(|embedded| symbol_for(embedded, source))
        .collect()
}

/// A fold for every embedded file spanning more than one line.
pub fn folding_ranges(file: &SourceFile, source: &PositionedDocument) -> Vec<FoldingRange> {
    let mut ranges: Vec<FoldingRange> = file
        .root
        .descendants()
        .filter_map(|embedded| FeatureRouter::new(embedded).source_extent(Feature::FoldingRange))
        .filter_map(|extent| {
            let start = source.position_at(extent.start).line;
            let end = source.position_at(extent.end).line;
            (end > start).then(|| FoldingRange {
                start_line: start,
                start_character: None,
                end_line: end,
                end_character: None,
                kind: Some(FoldingRangeKind::Region),
                collapsed_text: None,
            })
        })
        .collect();

    ranges.sort_by_key(|r| (r.start_line, r.end_line));
    ranges.dedup_by_key(|r| (r.start_line, r.end_line));
    ranges
}
