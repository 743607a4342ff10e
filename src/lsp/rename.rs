//! Rename across embedded files.
//!
//! A rename enters generated documents through `incoming` rename mappings
//! and its edits come back through `outgoing` ones. Edits that have no way
//! back are dropped rather than degraded: half a rename is worse than none.

use std::collections::HashMap;
use std::ops::Range;

use tower_lsp::lsp_types::{TextEdit, Url, WorkspaceEdit};
use tracing::trace;

use crate::analyzer::GeneratedEdit;
use crate::document::{DocumentRegistry, PositionedDocument, SourceFile};
use crate::mapping::Feature;
use crate::router::FeatureRouter;
use crate::virtual_file::EmbeddedFile;

/// Embedded files a rename at `offset` enters, with the generated offset.
pub fn rename_targets(file: &SourceFile, offset: usize) -> Vec<(&EmbeddedFile, usize)> {
    file.route_from_source(Feature::Rename, offset..offset)
        .into_iter()
        .map(|(embedded, generated)| (embedded, generated.start))
        .collect()
}

/// Map analyzer edits back into `file`.
///
/// Every edit must target one of `file`'s embedded documents. Duplicate
/// source edits (reached through a teleport and directly) collapse to one.
pub fn map_rename_edits(
    file: &SourceFile,
    registry: &DocumentRegistry,
    source: &PositionedDocument,
    edits: &[GeneratedEdit],
) -> Option<WorkspaceEdit> {
    let mut spans: Vec<(Range<usize>, &str)> = Vec::new();
    for edit in edits {
        let Some(embedded) = embedded_for(file, &edit.uri) else {
            trace!("Rename edit for unknown document {}", edit.uri);
            continue;
        };
        let generated = registry.get(&edit.uri, &embedded.language_id, &embedded.snapshot);
        let span = generated.span_at(edit.range);
        match FeatureRouter::new(embedded).route(Feature::Rename, span.clone()) {
            Some(source_span) => spans.push((source_span, edit.new_text.as_str())),
            None => trace!("Rename edit at {:?} in '{}' has no route", span, embedded.id),
        }
    }

    spans.sort_by_key(|(span, _)| (span.start, span.end));
    spans.dedup();
    if spans.is_empty() {
        return None;
    }

    let text_edits = spans
        .into_iter()
        .map(|(span, new_text)| TextEdit {
            range: source.range_at(&span),
            new_text: new_text.to_string(),
        })
        .collect();
    Some(WorkspaceEdit {
        changes: Some(HashMap::from([(file.uri.clone(), text_edits)])),
        document_changes: None,
        change_annotations: None,
    })
}

fn embedded_for<'a>(file: &'a SourceFile, uri: &Url) -> Option<&'a EmbeddedFile> {
    let id = uri.fragment()?;
    let mut source = uri.clone();
    source.set_fragment(None);
    (source == file.uri)
        .then(|| file.embedded(id))
        .flatten()
        .filter(|embedded| !embedded.is_root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{embedded_uri, TextSnapshot};
    use crate::virtual_file::ProjectionContext;
    use tower_lsp::lsp_types::{Position, Range as LspRange};

    const COMPONENT: &str = "<script setup>\nconst count = 1\n</script>\n";

    fn open() -> (SourceFile, PositionedDocument) {
        let uri = Url::parse("file:///app/Counter.vue").unwrap();
        let file = SourceFile::create(
            &ProjectionContext::default(),
            uri.clone(),
            TextSnapshot::new(COMPONENT),
            1,
        );
        let source = PositionedDocument::new(uri, "vue", file.snapshot.clone());
        (file, source)
    }

    #[test]
    fn rename_enters_the_setup_script() {
        let (file, _) = open();
        // `count` starts at 21 in the source.
        let targets = rename_targets(&file, 21);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0.id, "script_setup");
        assert_eq!(targets[0].1, 7);
    }

    #[test]
    fn edits_through_the_binding_export_collapse() {
        let (file, source) = open();
        let registry = DocumentRegistry::new();
        let uri = embedded_uri(&file.uri, "script_setup");
        let script = file.embedded("script_setup").unwrap();
        let generated = registry.get(&uri, &script.language_id, &script.snapshot);

        let declaration = 7..12;
        let export_start = script.text().rfind("count").unwrap();
        let edits = vec![
            GeneratedEdit {
                uri: uri.clone(),
                range: generated.range_at(&declaration),
                new_text: "total".to_string(),
            },
            GeneratedEdit {
                uri: uri.clone(),
                range: generated.range_at(&(export_start..export_start + 5)),
                new_text: "total".to_string(),
            },
        ];

        let workspace = map_rename_edits(&file, &registry, &source, &edits).unwrap();
        let changes = &workspace.changes.unwrap()[&file.uri];
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].range,
            LspRange::new(Position::new(1, 6), Position::new(1, 11))
        );
        assert_eq!(changes[0].new_text, "total");
    }

    #[test]
    fn edits_for_other_documents_are_ignored() {
        let (file, source) = open();
        let registry = DocumentRegistry::new();
        let other = Url::parse("file:///app/Other.vue#script_setup").unwrap();
        let edits = vec![GeneratedEdit {
            uri: other,
            range: LspRange::new(Position::new(0, 0), Position::new(0, 1)),
            new_text: "x".to_string(),
        }];
        assert!(map_rename_edits(&file, &registry, &source, &edits).is_none());
    }
}
