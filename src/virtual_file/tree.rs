//! Building the embedded file tree of a source document.
//!
//! A build runs every plugin against the source text and assembles a fresh
//! tree. Nothing is shared with the previous tree, so a failed or panicking
//! plugin can only drop its own contribution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::document::TextSnapshot;
use crate::error::PluginError;
use crate::mapping::SegmentBuilder;

use super::context::ProjectionContext;
use super::embedded::EmbeddedFile;
use super::plugin::{EmbeddedDescriptor, LanguagePlugin, ProjectionDiagnostic};

/// A freshly built tree and the diagnostics produced while building it.
#[derive(Debug, Clone)]
pub struct Projection {
    pub root: EmbeddedFile,
    pub diagnostics: Vec<ProjectionDiagnostic>,
}

/// Run `f`, turning a panic into [`PluginError::Panicked`].
pub(crate) fn contain<T>(
    plugin: &str,
    f: impl FnOnce() -> Result<T, PluginError>,
) -> Result<T, PluginError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panicked {
            plugin: plugin.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Language id of the root node, taken from the file extension.
pub fn root_language_id(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "plaintext".to_string())
}

/// Build the embedded file tree for `snapshot`.
pub fn project(ctx: &ProjectionContext, file_name: &str, snapshot: &TextSnapshot) -> Projection {
    let source = snapshot.text();
    let mut diagnostics = Vec::new();

    // Descriptors keep the position of the first plugin that claimed their id.
    let mut claimed: Vec<(EmbeddedDescriptor, Arc<dyn LanguagePlugin>)> = Vec::new();
    for plugin in ctx.plugins.iter() {
        trace!("Running plugin '{}' on {}", plugin.name(), file_name);
        let extraction = match contain(plugin.name(), || {
            plugin.get_embedded_files(file_name, source)
        }) {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!("{}", err);
                diagnostics.push(ProjectionDiagnostic::plugin_failure(&err));
                continue;
            }
        };

        diagnostics.extend(extraction.errors.into_iter().map(|mut d| {
            d.plugin.get_or_insert_with(|| plugin.name().to_string());
            d
        }));

        for descriptor in extraction.descriptors {
            match claimed.iter_mut().find(|(d, _)| d.id == descriptor.id) {
                Some(slot) => {
                    debug!(
                        "Plugin '{}' overrides embedded file '{}'",
                        plugin.name(),
                        descriptor.id
                    );
                    *slot = (descriptor, Arc::clone(plugin));
                }
                None => claimed.push((descriptor, Arc::clone(plugin))),
            }
        }
    }

    let mut root = EmbeddedFile::root(root_language_id(file_name), snapshot.clone());
    let mut nested = Vec::new();
    for (descriptor, plugin) in claimed {
        let file = match resolve(ctx, source, &descriptor, plugin.as_ref()) {
            Ok(file) => file,
            Err(err) => {
                warn!("{}", err);
                diagnostics.push(ProjectionDiagnostic::plugin_failure(&err));
                continue;
            }
        };
        match descriptor.parent {
            None => root.children.push(file),
            Some(parent) => nested.push((parent, file)),
        }
    }

    attach_nested(&mut root, nested);

    debug!(
        "Projected {} into {} embedded files ({} diagnostics)",
        file_name,
        root.descendants().count(),
        diagnostics.len()
    );

    Projection { root, diagnostics }
}

fn resolve(
    ctx: &ProjectionContext,
    source: &str,
    descriptor: &EmbeddedDescriptor,
    plugin: &dyn LanguagePlugin,
) -> Result<EmbeddedFile, PluginError> {
    if source.get(descriptor.source_range.clone()).is_none() {
        return Err(PluginError::Resolve {
            plugin: plugin.name().to_string(),
            id: descriptor.id.clone(),
            message: format!("range {:?} is not inside the source", descriptor.source_range),
        });
    }

    let mut builder = SegmentBuilder::new();
    contain(plugin.name(), || {
        plugin.resolve_embedded_file(source, descriptor, &mut builder)
    })?;

    Ok(EmbeddedFile::from_built(
        descriptor.id.clone(),
        descriptor.language_id.clone(),
        descriptor.kind.clone(),
        plugin.name(),
        builder.finish(),
        ctx.capabilities_for(&descriptor.kind),
    ))
}

/// Attach nested files under their parents. Parents may themselves be
/// nested, so keep going while progress is made.
fn attach_nested(root: &mut EmbeddedFile, mut pending: Vec<(String, EmbeddedFile)>) {
    loop {
        let before = pending.len();
        let mut waiting = Vec::new();
        for (parent, file) in pending {
            match root.find_mut(&parent).filter(|p| !p.is_root()) {
                Some(parent) => parent.children.push(file),
                None => waiting.push((parent, file)),
            }
        }
        pending = waiting;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    for (parent, file) in pending {
        warn!(
            "Dropping embedded file '{}': parent '{}' does not exist",
            file.id, parent
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Capabilities;
    use crate::virtual_file::embedded::EmbeddedKind;
    use crate::virtual_file::plugin::{Extraction, PluginRegistry, ProjectionDiagnosticKind};

    /// Emits a fixed descriptor list and re-emits each range verbatim.
    struct Fixed {
        name: &'static str,
        order: i32,
        descriptors: Vec<EmbeddedDescriptor>,
    }

    impl LanguagePlugin for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn get_embedded_files(&self, _: &str, _: &str) -> Result<Extraction, PluginError> {
            Ok(Extraction {
                descriptors: self.descriptors.clone(),
                errors: Vec::new(),
            })
        }

        fn resolve_embedded_file(
            &self,
            source: &str,
            descriptor: &EmbeddedDescriptor,
            builder: &mut SegmentBuilder,
        ) -> Result<(), PluginError> {
            builder.push_mapped(
                &source[descriptor.source_range.clone()],
                descriptor.source_range.start,
                Capabilities::all(),
            );
            Ok(())
        }
    }

    struct Panicking;

    impl LanguagePlugin for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn get_embedded_files(&self, _: &str, _: &str) -> Result<Extraction, PluginError> {
            panic!("extraction exploded");
        }

        fn resolve_embedded_file(
            &self,
            _: &str,
            _: &EmbeddedDescriptor,
            _: &mut SegmentBuilder,
        ) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn descriptor(id: &str, parent: Option<&str>, range: std::ops::Range<usize>) -> EmbeddedDescriptor {
        EmbeddedDescriptor {
            id: id.to_string(),
            parent: parent.map(str::to_string),
            kind: EmbeddedKind::Custom {
                tag: id.to_string(),
                index: 0,
            },
            language_id: "plaintext".to_string(),
            source_range: range,
        }
    }

    fn context(plugins: Vec<Arc<dyn LanguagePlugin>>) -> ProjectionContext {
        let mut registry = PluginRegistry::new();
        for plugin in plugins {
            registry.register(plugin);
        }
        ProjectionContext::new(registry)
    }

    #[test]
    fn later_plugin_replaces_descriptor_in_place() {
        let ctx = context(vec![
            Arc::new(Fixed {
                name: "first",
                order: 0,
                descriptors: vec![descriptor("a", None, 0..2), descriptor("b", None, 2..4)],
            }),
            Arc::new(Fixed {
                name: "second",
                order: 1,
                descriptors: vec![descriptor("a", None, 0..1)],
            }),
        ]);
        let projection = project(&ctx, "x.txt", &TextSnapshot::new("abcd"));

        let files: Vec<_> = projection
            .root
            .children
            .iter()
            .map(|f| (f.id.as_str(), f.plugin.as_str(), f.text()))
            .collect();
        assert_eq!(files, vec![("a", "second", "a"), ("b", "first", "cd")]);
    }

    #[test]
    fn nested_descriptors_attach_and_orphans_drop() {
        let ctx = context(vec![Arc::new(Fixed {
            name: "fixed",
            order: 0,
            descriptors: vec![
                descriptor("grandchild", Some("child"), 1..2),
                descriptor("child", Some("top"), 0..2),
                descriptor("top", None, 0..4),
                descriptor("orphan", Some("missing"), 0..1),
            ],
        })]);
        let projection = project(&ctx, "x.txt", &TextSnapshot::new("abcd"));

        let ids: Vec<_> = projection.root.descendants().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "child", "grandchild"]);
    }

    #[test]
    fn panicking_plugin_is_contained() {
        let ctx = context(vec![
            Arc::new(Panicking),
            Arc::new(Fixed {
                name: "fixed",
                order: 1,
                descriptors: vec![descriptor("a", None, 0..2)],
            }),
        ]);
        let projection = project(&ctx, "x.txt", &TextSnapshot::new("abcd"));

        assert_eq!(projection.root.children.len(), 1);
        assert_eq!(projection.diagnostics.len(), 1);
        let diagnostic = &projection.diagnostics[0];
        assert_eq!(diagnostic.kind, ProjectionDiagnosticKind::PluginFailure);
        assert_eq!(diagnostic.plugin.as_deref(), Some("panicking"));
        assert!(diagnostic.message.contains("extraction exploded"));
    }

    #[test]
    fn out_of_range_descriptor_is_a_plugin_failure() {
        let ctx = context(vec![Arc::new(Fixed {
            name: "fixed",
            order: 0,
            descriptors: vec![descriptor("a", None, 2..40)],
        })]);
        let projection = project(&ctx, "x.txt", &TextSnapshot::new("abcd"));
        assert!(projection.root.children.is_empty());
        assert_eq!(projection.diagnostics.len(), 1);
    }

    #[test]
    fn root_is_the_whole_document() {
        let ctx = context(Vec::new());
        let snapshot = TextSnapshot::new("<template></template>");
        let projection = project(&ctx, "/src/App.vue", &snapshot);
        assert!(projection.root.is_root());
        assert_eq!(projection.root.language_id, "vue");
        assert_eq!(projection.root.text(), snapshot.text());
        assert!(projection.root.source_map.is_empty());
    }
}
