//! Diagnostics conversion from projection and analyzer results to LSP diagnostics.

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};
use tracing::trace;

use crate::analyzer::GeneratedDiagnostic;
use crate::document::{PositionedDocument, SourceFile};
use crate::mapping::Feature;
use crate::router::FeatureRouter;
use crate::virtual_file::{EmbeddedFile, ProjectionDiagnosticKind};

const SOURCE: &str = "embedls";

/// Convert parse errors and plugin failures recorded on `file`.
pub fn projection_diagnostics(file: &SourceFile, source: &PositionedDocument) -> Vec<Diagnostic> {
    file.diagnostics
        .iter()
        .map(|diagnostic| {
            let (severity, code) = match diagnostic.kind {
                ProjectionDiagnosticKind::Parse => (DiagnosticSeverity::ERROR, "parse-error"),
                ProjectionDiagnosticKind::PluginFailure => {
                    (DiagnosticSeverity::WARNING, "plugin-failure")
                }
            };
            Diagnostic {
                range: source.range_at(&diagnostic.range),
                severity: Some(severity),
                code: Some(NumberOrString::String(code.to_string())),
                code_description: None,
                source: Some(SOURCE.to_string()),
                message: diagnostic.message.clone(),
                related_information: None,
                tags: None,
                data: None,
            }
        })
        .collect()
}

/// Map analyzer diagnostics for `embedded` back into the source document.
///
/// Diagnostics whose range has no diagnostics-capable route are dropped.
pub fn map_generated_diagnostics(
    embedded: &EmbeddedFile,
    generated: &PositionedDocument,
    source: &PositionedDocument,
    diagnostics: &[GeneratedDiagnostic],
) -> Vec<Diagnostic> {
    let router = FeatureRouter::new(embedded);
    diagnostics
        .iter()
        .filter_map(|diagnostic| {
            let span = generated.span_at(diagnostic.range);
            let Some(source_span) = router.route(Feature::Diagnostics, span.clone()) else {
                trace!(
                    "Dropping diagnostic at {:?} in '{}': {}",
                    span,
                    embedded.id,
                    diagnostic.message
                );
                return None;
            };
            Some(Diagnostic {
                range: source.range_at(&source_span),
                severity: Some(diagnostic.severity),
                code: diagnostic.code.clone().map(NumberOrString::String),
                code_description: None,
                source: Some(embedded.language_id.clone()),
                message: diagnostic.message.clone(),
                related_information: None,
                tags: None,
                data: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{embedded_uri, TextSnapshot};
    use crate::virtual_file::ProjectionContext;
    use tower_lsp::lsp_types::{Position, Range, Url};

    fn source_file(text: &str) -> SourceFile {
        let uri = Url::parse("file:///app/Counter.vue").unwrap();
        SourceFile::create(&ProjectionContext::default(), uri, TextSnapshot::new(text), 1)
    }

    fn positioned(file: &SourceFile) -> PositionedDocument {
        PositionedDocument::new(file.uri.clone(), "vue", file.snapshot.clone())
    }

    #[test]
    fn parse_errors_become_lsp_errors() {
        let file = source_file("<template>\n<p>hi</p>\n");
        let diagnostics = projection_diagnostics(&file, &positioned(&file));

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            diagnostics[0].code,
            Some(NumberOrString::String("parse-error".to_string()))
        );
        assert_eq!(diagnostics[0].range.start, Position::new(0, 0));
        assert!(diagnostics[0].message.contains("<template>"));
    }

    #[test]
    fn generated_diagnostics_map_into_the_block() {
        let file = source_file("<template></template>\n<script>\nlet a = b\n</script>\n");
        let script = file.embedded("script").unwrap();
        let generated = PositionedDocument::new(
            embedded_uri(&file.uri, "script"),
            "javascript",
            script.snapshot.clone(),
        );

        // `b` on line 1 of the generated script.
        let diagnostic = GeneratedDiagnostic {
            range: Range::new(Position::new(1, 8), Position::new(1, 9)),
            severity: DiagnosticSeverity::ERROR,
            message: "Cannot find name 'b'.".to_string(),
            code: Some("2304".to_string()),
        };
        let mapped =
            map_generated_diagnostics(script, &generated, &positioned(&file), &[diagnostic]);

        assert_eq!(mapped.len(), 1);
        assert_eq!(
            mapped[0].range,
            Range::new(Position::new(2, 8), Position::new(2, 9))
        );
        assert_eq!(mapped[0].source.as_deref(), Some("javascript"));
    }

    #[test]
    fn diagnostics_in_unmapped_code_are_dropped() {
        let file = source_file("<template><p>{{ count }}</p></template>\n");
        let code = file.embedded("template_code").unwrap();
        let generated = PositionedDocument::new(
            embedded_uri(&file.uri, "template_code"),
            "typescript",
            code.snapshot.clone(),
        );

        // The prelude line has no source.
        let diagnostic = GeneratedDiagnostic {
            range: Range::new(Position::new(0, 0), Position::new(0, 7)),
            severity: DiagnosticSeverity::WARNING,
            message: "unused".to_string(),
            code: None,
        };
        let mapped = map_generated_diagnostics(code, &generated, &positioned(&file), &[diagnostic]);
        assert!(mapped.is_empty());
    }
}
