//! Source file state and the per-session document store.

use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;
use tracing::debug;

use crate::incremental::{reconcile, RebuildReason, ReconcileOutcome, TextChange};
use crate::mapping::Feature;
use crate::router::FeatureRouter;
use crate::virtual_file::{project, EmbeddedFile, ProjectionContext, ProjectionDiagnostic};

use super::snapshot::TextSnapshot;

/// An open source document and its projected tree.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub uri: Url,
    pub snapshot: TextSnapshot,
    /// Document version from the client.
    pub version: i32,
    /// Whole-document node; embedded files are its children.
    pub root: EmbeddedFile,
    /// Parse errors and plugin failures, in source coordinates.
    pub diagnostics: Vec<ProjectionDiagnostic>,
}

impl SourceFile {
    /// Project `snapshot` from scratch.
    pub fn create(ctx: &ProjectionContext, uri: Url, snapshot: TextSnapshot, version: i32) -> Self {
        let projection = project(ctx, uri.path(), &snapshot);
        Self {
            uri,
            snapshot,
            version,
            root: projection.root,
            diagnostics: projection.diagnostics,
        }
    }

    /// Move to `new_snapshot`, patching in place when possible.
    pub fn update(
        &mut self,
        ctx: &ProjectionContext,
        new_snapshot: TextSnapshot,
        version: i32,
    ) -> ReconcileOutcome {
        self.version = version;
        match new_snapshot.change_from(&self.snapshot) {
            Some(change) => self.commit(ctx, &change, new_snapshot),
            None => ReconcileOutcome::Unchanged,
        }
    }

    /// Apply one edit expressed against the current text.
    pub fn apply_change(
        &mut self,
        ctx: &ProjectionContext,
        change: &TextChange,
        version: i32,
    ) -> ReconcileOutcome {
        self.version = version;
        match self.snapshot.apply(change) {
            Some(new_snapshot) => self.commit(ctx, change, new_snapshot),
            None => {
                debug!(
                    "Ignoring change {}..{} outside {} ({} bytes)",
                    change.start,
                    change.end,
                    self.uri,
                    self.snapshot.len()
                );
                ReconcileOutcome::NeedsFullRebuild(RebuildReason::InvalidChange)
            }
        }
    }

    fn commit(
        &mut self,
        ctx: &ProjectionContext,
        change: &TextChange,
        new_snapshot: TextSnapshot,
    ) -> ReconcileOutcome {
        let outcome = if ctx.incremental {
            reconcile(self, ctx, &new_snapshot, change)
        } else {
            ReconcileOutcome::NeedsFullRebuild(RebuildReason::IncrementalDisabled)
        };

        match &outcome {
            ReconcileOutcome::Patched { embedded_id, .. } => {
                debug!("Patched '{}' in {}", embedded_id, self.uri);
            }
            ReconcileOutcome::Unchanged => {}
            ReconcileOutcome::NeedsFullRebuild(reason) => {
                debug!("Rebuilding {}: {:?}", self.uri, reason);
                self.rebuild(ctx, new_snapshot);
            }
        }
        outcome
    }

    /// Re-project from scratch, keeping the identity of unchanged files.
    pub fn rebuild(&mut self, ctx: &ProjectionContext, new_snapshot: TextSnapshot) {
        let mut projection = project(ctx, self.uri.path(), &new_snapshot);
        inherit_tree(&mut projection.root, &self.root);
        self.root = projection.root;
        self.diagnostics = projection.diagnostics;
        self.snapshot = new_snapshot;
    }

    /// Embedded files serving `source_range`, with the generated range each
    /// one maps it to.
    pub fn route_from_source(
        &self,
        feature: Feature,
        source_range: Range<usize>,
    ) -> Vec<(&EmbeddedFile, Range<usize>)> {
        self.root
            .descendants()
            .filter_map(|file| {
                FeatureRouter::new(file)
                    .route_to_generated(feature, source_range.clone())
                    .map(|generated| (file, generated))
            })
            .collect()
    }

    pub fn embedded(&self, id: &str) -> Option<&EmbeddedFile> {
        self.root.find(id)
    }
}

fn inherit_tree(new: &mut EmbeddedFile, old_root: &EmbeddedFile) {
    if let Some(previous) = old_root.find(&new.id).filter(|p| p.kind == new.kind) {
        new.inherit(previous);
    }
    for child in &mut new.children {
        inherit_tree(child, old_root);
    }
}

/// Thread-safe storage for open source files.
///
/// Each entry is replaced under its own write guard, so edits to one file
/// are serialized while other files proceed. Readers clone the `Arc` and keep
/// a consistent view for as long as they need it.
#[derive(Debug, Default)]
pub struct DocumentStore {
    files: DashMap<Url, Arc<SourceFile>>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    /// Open (or reopen) a document.
    pub fn open(
        &self,
        ctx: &ProjectionContext,
        uri: Url,
        text: String,
        version: i32,
    ) -> Arc<SourceFile> {
        let file = Arc::new(SourceFile::create(
            ctx,
            uri.clone(),
            TextSnapshot::new(text),
            version,
        ));
        self.files.insert(uri, Arc::clone(&file));
        file
    }

    /// Run `f` on the file under its write guard. Readers holding an older
    /// `Arc` keep seeing the old state.
    pub fn edit<R>(&self, uri: &Url, f: impl FnOnce(&mut SourceFile) -> R) -> Option<(Arc<SourceFile>, R)> {
        let mut entry = self.files.get_mut(uri)?;
        let result = f(Arc::make_mut(entry.value_mut()));
        Some((Arc::clone(entry.value()), result))
    }

    /// Replace the whole text of a document.
    pub fn update(
        &self,
        ctx: &ProjectionContext,
        uri: &Url,
        text: String,
        version: i32,
    ) -> Option<(Arc<SourceFile>, ReconcileOutcome)> {
        self.edit(uri, |file| file.update(ctx, TextSnapshot::new(text), version))
    }

    /// Close a document.
    pub fn close(&self, uri: &Url) {
        self.files.remove(uri);
    }

    /// Get a document's state.
    pub fn get(&self, uri: &Url) -> Option<Arc<SourceFile>> {
        self.files.get(uri).map(|r| Arc::clone(r.value()))
    }

    /// Every open document.
    pub fn all(&self) -> Vec<Arc<SourceFile>> {
        self.files.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///app/Counter.vue").unwrap()
    }

    const COMPONENT: &str = "<script>\nlet a = 1\n</script>\n<style>\np {}\n</style>\n";

    #[test]
    fn edits_inside_a_block_are_patched() {
        let ctx = ProjectionContext::default();
        let mut file = SourceFile::create(&ctx, uri(), TextSnapshot::new(COMPONENT), 1);

        let outcome = file.apply_change(&ctx, &TextChange::insert(14, "bc"), 2);
        assert!(matches!(outcome, ReconcileOutcome::Patched { .. }));
        assert_eq!(file.version, 2);
        assert_eq!(file.embedded("script").unwrap().text(), "\nlet abc = 1\n");
    }

    #[test]
    fn structural_edits_rebuild_and_keep_unchanged_identities() {
        let ctx = ProjectionContext::default();
        let mut file = SourceFile::create(&ctx, uri(), TextSnapshot::new(COMPONENT), 1);
        let style_snapshot = file.embedded("style_0").unwrap().snapshot.id();

        let edited = COMPONENT.replace("let a", "let b");
        let outcome = file.update(&ctx, TextSnapshot::new(edited.clone()), 2);
        assert!(matches!(outcome, ReconcileOutcome::Patched { .. }));

        // A leading comment moves every block.
        let text = format!("<!-- c -->\n{}", edited);
        let outcome = file.update(&ctx, TextSnapshot::new(text), 3);
        assert_eq!(
            outcome,
            ReconcileOutcome::NeedsFullRebuild(RebuildReason::NoEmbeddedRegion)
        );

        let style = file.embedded("style_0").unwrap();
        assert_eq!(style.snapshot.id(), style_snapshot);
        assert_eq!(style.version, 0);
        assert_eq!(style.source_map.mappings()[0].source_range.start, 47);
    }

    #[test]
    fn unchanged_text_only_bumps_the_version() {
        let ctx = ProjectionContext::default();
        let mut file = SourceFile::create(&ctx, uri(), TextSnapshot::new(COMPONENT), 1);
        let outcome = file.update(&ctx, TextSnapshot::new(COMPONENT), 7);
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(file.version, 7);
    }

    #[test]
    fn disabled_incremental_always_rebuilds() {
        let ctx = ProjectionContext::default().with_incremental(false);
        let mut file = SourceFile::create(&ctx, uri(), TextSnapshot::new(COMPONENT), 1);
        let outcome = file.apply_change(&ctx, &TextChange::insert(14, "bc"), 2);
        assert_eq!(
            outcome,
            ReconcileOutcome::NeedsFullRebuild(RebuildReason::IncrementalDisabled)
        );
        assert_eq!(file.embedded("script").unwrap().text(), "\nlet abc = 1\n");
        assert_eq!(file.embedded("script").unwrap().version, 1);
    }

    #[test]
    fn route_from_source_finds_the_serving_file() {
        let ctx = ProjectionContext::default();
        let file = SourceFile::create(&ctx, uri(), TextSnapshot::new(COMPONENT), 1);
        let hits = file.route_from_source(Feature::Diagnostics, 13..14);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "script");
        assert_eq!(hits[0].1, 5..6);
        assert!(file.route_from_source(Feature::Diagnostics, 2..3).is_empty());
    }

    #[test]
    fn store_readers_keep_their_snapshot() {
        let ctx = ProjectionContext::default();
        let store = DocumentStore::new();
        store.open(&ctx, uri(), COMPONENT.to_string(), 1);

        let reader = store.get(&uri()).unwrap();
        let (updated, _) = store
            .update(&ctx, &uri(), COMPONENT.replace("p {}", "p { color: red }"), 2)
            .unwrap();

        assert_eq!(reader.version, 1);
        assert_eq!(reader.snapshot.text(), COMPONENT);
        assert_eq!(updated.version, 2);
        assert_eq!(store.get(&uri()).unwrap().version, 2);

        store.close(&uri());
        assert!(store.is_empty());
        assert!(store.update(&ctx, &uri(), String::new(), 3).is_none());
    }
}
