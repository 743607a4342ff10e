//! Embedded-language projection engine and language server.
//!
//! Source documents that embed other languages (single-file components) are
//! projected into a tree of generated documents. Each generated document
//! carries a mapping table back to the source, so results computed on it by
//! an external analyzer can be routed back, feature by feature.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};
use tracing::{debug, info};

pub mod analyzer;
pub mod document;
pub mod error;
pub mod incremental;
pub mod logging;
pub mod lsp;
pub mod mapping;
pub mod router;
pub mod settings;
pub mod virtual_file;

pub use analyzer::{Analyzer, LanguageServiceHost, ProjectionHost};
pub use document::{DocumentRegistry, DocumentStore, SourceFile, TextSnapshot};
pub use router::FeatureRouter;
pub use settings::{discover_settings, load_settings};
pub use virtual_file::ProjectionContext;

use analyzer::Versioned;
use document::{embedded_uri, LineIndex};
use incremental::{ReconcileOutcome, TextChange};

pub struct Backend {
    client: Client,
    documents: Arc<DocumentStore>,
    registry: Arc<DocumentRegistry>,
    context: OnceLock<Arc<ProjectionContext>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    /// In-flight diagnostics task per source document.
    analyses: DashMap<Url, AbortHandle>,
}

impl Backend {
    pub(crate) fn new(client: Client, analyzer: Option<Arc<dyn Analyzer>>) -> Self {
        Self {
            client,
            documents: Arc::new(DocumentStore::new()),
            registry: Arc::new(DocumentRegistry::new()),
            context: OnceLock::new(),
            analyzer,
            analyses: DashMap::new(),
        }
    }

    /// The session's projection context. Defaults apply when `initialize`
    /// found no workspace.
    fn context(&self) -> &Arc<ProjectionContext> {
        self.context
            .get_or_init(|| Arc::new(ProjectionContext::default()))
    }

    /// Publish diagnostics for `file`, replacing any analysis still running
    /// for an older version.
    fn schedule_diagnostics(&self, file: Arc<SourceFile>) {
        let uri = file.uri.clone();
        let task = tokio::spawn(publish_diagnostics(
            self.client.clone(),
            Arc::clone(&self.documents),
            Arc::clone(&self.registry),
            self.analyzer.clone(),
            file,
        ));
        if let Some(previous) = self.analyses.insert(uri, task.abort_handle()) {
            previous.abort();
        }
    }

    fn cancel_diagnostics(&self, uri: &Url) {
        if let Some((_, task)) = self.analyses.remove(uri) {
            task.abort();
        }
    }
}

async fn publish_diagnostics(
    client: Client,
    documents: Arc<DocumentStore>,
    registry: Arc<DocumentRegistry>,
    analyzer: Option<Arc<dyn Analyzer>>,
    file: Arc<SourceFile>,
) {
    let source = registry.get(&file.uri, &file.root.language_id, &file.snapshot);
    let mut diagnostics = lsp::projection_diagnostics(&file, &source);

    if let Some(analyzer) = analyzer {
        debug!("Running analyzer '{}' on {}", analyzer.name(), file.uri);
        let host = ProjectionHost::for_file(Arc::clone(&file));
        for embedded in file.root.descendants() {
            if !analyzer.handles(&embedded.language_id) {
                continue;
            }
            let uri = embedded_uri(&file.uri, &embedded.id);
            let generated = registry.get(&uri, &embedded.language_id, &embedded.snapshot);
            let found = analyzer.diagnostics(&host, &uri).await;
            diagnostics.extend(lsp::map_generated_diagnostics(
                embedded, &generated, &source, &found,
            ));
        }
    }

    let latest = documents.get(&file.uri).map(|f| f.version);
    match Versioned::new(file.version, diagnostics).current(latest) {
        Some(diagnostics) => {
            client
                .publish_diagnostics(file.uri.clone(), diagnostics, Some(file.version))
                .await;
        }
        None => debug!(
            "Dropping diagnostics for {} v{} (now {:?})",
            file.uri, file.version, latest
        ),
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            // Discover settings by walking up the directory tree
            let (settings, settings_dir) = settings::discover_settings(&root);
            debug!("Settings directory: {}", settings_dir.display());
            let context = Arc::new(ProjectionContext::from_settings(&settings));
            if self.context.set(context).is_err() {
                debug!("Projection context already initialized; keeping the first one");
            }
        }

        let rename_provider = self
            .analyzer
            .as_ref()
            .map(|_| OneOf::Left(true));

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                document_symbol_provider: Some(OneOf::Left(true)),
                folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
                rename_provider,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let ctx = self.context();
        info!(
            "embedls initialized with {} plugin(s), incremental={}",
            ctx.plugins.len(),
            ctx.incremental
        );
        self.client
            .log_message(MessageType::INFO, "embedls initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        for entry in self.analyses.iter() {
            entry.value().abort();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let file = self
            .documents
            .open(self.context(), doc.uri, doc.text, doc.version);
        self.schedule_diagnostics(file);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let ctx = Arc::clone(self.context());
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        let edited = self.documents.edit(&uri, |file| {
            let mut outcome = ReconcileOutcome::Unchanged;
            let mut rebuilt = false;
            for change in params.content_changes {
                outcome = match change.range {
                    Some(range) => {
                        let line_index = LineIndex::new(file.snapshot.shared_text());
                        let span = line_index.range_to_span(range);
                        file.apply_change(&ctx, &TextChange::new(span, change.text), version)
                    }
                    None => file.update(&ctx, TextSnapshot::new(change.text), version),
                };
                rebuilt |= matches!(outcome, ReconcileOutcome::NeedsFullRebuild(_));
            }
            file.version = version;
            (outcome, rebuilt)
        });

        match edited {
            Some((file, (outcome, rebuilt))) => {
                debug!("{} v{}: {:?}", uri, version, outcome);
                if rebuilt {
                    let live = file.root.descendants().map(|embedded| embedded.id.as_str());
                    self.registry.dispose_stale_embedded(&uri, live);
                }
                self.schedule_diagnostics(file);
            }
            None => debug!("Change for unopened document {}", uri),
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.cancel_diagnostics(&uri);
        self.documents.close(&uri);
        self.registry.dispose_source(&uri);
        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(file) = self.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };
        let source = self
            .registry
            .get(&file.uri, &file.root.language_id, &file.snapshot);
        Ok(Some(DocumentSymbolResponse::Nested(lsp::document_symbols(
            &file, &source,
        ))))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let Some(file) = self.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };
        let source = self
            .registry
            .get(&file.uri, &file.root.language_id, &file.snapshot);
        Ok(Some(lsp::folding_ranges(&file, &source)))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let uri = params.text_document_position.text_document.uri;
        let Some(analyzer) = self.analyzer.clone() else {
            return Ok(None);
        };
        let Some(file) = self.documents.get(&uri) else {
            return Ok(None);
        };

        let source = self
            .registry
            .get(&file.uri, &file.root.language_id, &file.snapshot);
        let offset = source.offset_at(params.text_document_position.position);
        let host = ProjectionHost::for_file(Arc::clone(&file));

        let mut edits = Vec::new();
        for (embedded, generated_offset) in lsp::rename_targets(&file, offset) {
            if !analyzer.handles(&embedded.language_id) {
                continue;
            }
            let generated_uri = embedded_uri(&file.uri, &embedded.id);
            let generated =
                self.registry
                    .get(&generated_uri, &embedded.language_id, &embedded.snapshot);
            let position = generated.position_at(generated_offset);
            edits.extend(
                analyzer
                    .rename(&host, &generated_uri, position, &params.new_name)
                    .await,
            );
        }

        let workspace_edit = lsp::map_rename_edits(&file, &self.registry, &source, &edits);
        let latest = self.documents.get(&uri).map(|f| f.version);
        Ok(Versioned::new(file.version, workspace_edit)
            .current(latest)
            .flatten())
    }
}

/// Create the language server without an analyzer. Only projection-level
/// features are served.
pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(|client| Backend::new(client, None))
}

/// Create the language server with an analyzer for generated documents.
pub fn create_service_with_analyzer(
    analyzer: Arc<dyn Analyzer>,
) -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(move |client| Backend::new(client, Some(Arc::clone(&analyzer))))
}
