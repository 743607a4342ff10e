//! The boundary between the projection and an external language analyzer.
//!
//! Analyzers see generated documents only, through [`LanguageServiceHost`].
//! They speak line/character positions in generated documents; the caller
//! converts those to offsets and routes them back to the source.

use std::sync::Arc;

use tower_lsp::lsp_types::{DiagnosticSeverity, Position, Range, Url};

use crate::document::{embedded_uri, DocumentStore, SourceFile, TextSnapshot};
use crate::incremental::TextChangeRange;
use crate::virtual_file::EmbeddedFile;

/// What an analyzer may ask about the generated documents.
pub trait LanguageServiceHost {
    fn script_file_names(&self) -> Vec<Url>;
    fn script_version(&self, uri: &Url) -> Option<u64>;
    fn script_snapshot(&self, uri: &Url) -> Option<TextSnapshot>;
    fn script_language_id(&self, uri: &Url) -> Option<String>;
    /// Net change since `old_version`; `None` means "re-read everything".
    fn script_change_range(&self, uri: &Url, old_version: u64) -> Option<TextChangeRange>;
}

/// [`LanguageServiceHost`] over a fixed set of source files.
///
/// The host holds `Arc`s taken when it was created, so an analysis sees one
/// consistent state even while edits continue.
#[derive(Debug, Clone, Default)]
pub struct ProjectionHost {
    files: Vec<Arc<SourceFile>>,
}

impl ProjectionHost {
    pub fn new(store: &DocumentStore) -> Self {
        Self { files: store.all() }
    }

    pub fn for_file(file: Arc<SourceFile>) -> Self {
        Self { files: vec![file] }
    }

    /// The source file and embedded file a generated URI refers to.
    pub fn resolve(&self, uri: &Url) -> Option<(&SourceFile, &EmbeddedFile)> {
        let id = uri.fragment()?;
        let mut source = uri.clone();
        source.set_fragment(None);
        let file = self.files.iter().find(|f| f.uri == source)?;
        let embedded = file.root.find(id).filter(|e| !e.is_root())?;
        Some((file, embedded))
    }

    /// Source version the host was built from, for stale-result checks.
    pub fn source_version(&self, source: &Url) -> Option<i32> {
        self.files.iter().find(|f| &f.uri == source).map(|f| f.version)
    }
}

impl LanguageServiceHost for ProjectionHost {
    fn script_file_names(&self) -> Vec<Url> {
        self.files
            .iter()
            .flat_map(|file| {
                file.root
                    .descendants()
                    .map(move |embedded| embedded_uri(&file.uri, &embedded.id))
            })
            .collect()
    }

    fn script_version(&self, uri: &Url) -> Option<u64> {
        self.resolve(uri).map(|(_, embedded)| embedded.version)
    }

    fn script_snapshot(&self, uri: &Url) -> Option<TextSnapshot> {
        self.resolve(uri).map(|(_, embedded)| embedded.snapshot.clone())
    }

    fn script_language_id(&self, uri: &Url) -> Option<String> {
        self.resolve(uri)
            .map(|(_, embedded)| embedded.language_id.clone())
    }

    fn script_change_range(&self, uri: &Url, old_version: u64) -> Option<TextChangeRange> {
        self.resolve(uri)?.1.change_range_since(old_version)
    }
}

/// A diagnostic in generated coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDiagnostic {
    pub range: Range,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub code: Option<String>,
}

/// A text edit in a generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEdit {
    pub uri: Url,
    pub range: Range,
    pub new_text: String,
}

/// A result tagged with the source version it was computed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: i32,
    pub value: T,
}

impl<T> Versioned<T> {
    pub fn new(version: i32, value: T) -> Self {
        Self { version, value }
    }

    /// The value, unless the document has moved on since.
    pub fn current(self, latest: Option<i32>) -> Option<T> {
        (latest == Some(self.version)).then_some(self.value)
    }
}

/// An external analyzer for generated documents.
///
/// Failures are not part of the interface: an analyzer that cannot answer
/// returns an empty result and logs why.
#[tower_lsp::async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this analyzer understands `language_id`.
    fn handles(&self, language_id: &str) -> bool;

    async fn diagnostics(&self, host: &ProjectionHost, uri: &Url) -> Vec<GeneratedDiagnostic>;

    /// Edits renaming the symbol at `position`. Unsupported by default.
    async fn rename(
        &self,
        _host: &ProjectionHost,
        _uri: &Url,
        _position: Position,
        _new_name: &str,
    ) -> Vec<GeneratedEdit> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_file::ProjectionContext;

    fn host() -> (ProjectionHost, Url) {
        let ctx = ProjectionContext::default();
        let store = DocumentStore::new();
        let uri = Url::parse("file:///app/Counter.vue").unwrap();
        store.open(
            &ctx,
            uri.clone(),
            "<script lang=\"ts\">let a = 1</script>\n<style>p {}</style>".to_string(),
            3,
        );
        (ProjectionHost::new(&store), uri)
    }

    #[test]
    fn host_lists_generated_documents() {
        let (host, source) = host();
        let names: Vec<_> = host
            .script_file_names()
            .iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "file:///app/Counter.vue#script",
                "file:///app/Counter.vue#style_0"
            ]
        );

        let script = embedded_uri(&source, "script");
        assert_eq!(host.script_language_id(&script).as_deref(), Some("typescript"));
        assert_eq!(host.script_snapshot(&script).unwrap().text(), "let a = 1");
        assert_eq!(host.script_version(&script), Some(0));
        assert_eq!(host.script_change_range(&script, 0), None);
        assert_eq!(host.source_version(&source), Some(3));
    }

    #[test]
    fn unknown_uris_resolve_to_nothing() {
        let (host, source) = host();
        assert!(host.script_snapshot(&source).is_none());
        assert!(host
            .script_snapshot(&embedded_uri(&source, "template"))
            .is_none());
    }

    #[test]
    fn stale_results_are_dropped() {
        assert_eq!(Versioned::new(2, "ok").current(Some(2)), Some("ok"));
        assert_eq!(Versioned::new(2, "old").current(Some(3)), None);
        assert_eq!(Versioned::new(2, "closed").current(None), None);
    }
}
