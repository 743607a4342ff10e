//! Language plugins and their registry.
//!
//! A plugin contributes embedded files to a source document in two steps:
//! `get_embedded_files` finds what to generate, `resolve_embedded_file`
//! fills a [`SegmentBuilder`] for one descriptor. Plugins run in ascending
//! `order`; a later plugin may replace an earlier plugin's descriptor by
//! reusing its id.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::PluginError;
use crate::mapping::SegmentBuilder;

use super::embedded::{EmbeddedFile, EmbeddedKind};

/// What a diagnostic recorded on a source file is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionDiagnosticKind {
    /// Malformed block structure in the source document.
    Parse,
    /// A plugin returned an error or panicked.
    PluginFailure,
}

/// A diagnostic produced by the projection itself, in source coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionDiagnostic {
    pub kind: ProjectionDiagnosticKind,
    pub range: Range<usize>,
    pub message: String,
    pub plugin: Option<String>,
}

impl ProjectionDiagnostic {
    pub fn parse(range: Range<usize>, message: impl Into<String>) -> Self {
        Self {
            kind: ProjectionDiagnosticKind::Parse,
            range,
            message: message.into(),
            plugin: None,
        }
    }

    pub fn plugin_failure(error: &PluginError) -> Self {
        Self {
            kind: ProjectionDiagnosticKind::PluginFailure,
            range: 0..0,
            message: error.to_string(),
            plugin: Some(error.plugin().to_string()),
        }
    }
}

/// Request to generate one embedded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedDescriptor {
    pub id: String,
    /// Id of the embedded file this one is nested under, if any.
    pub parent: Option<String>,
    pub kind: EmbeddedKind,
    pub language_id: String,
    /// The source range the file is generated from.
    pub source_range: Range<usize>,
}

/// Result of [`LanguagePlugin::get_embedded_files`].
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub descriptors: Vec<EmbeddedDescriptor>,
    /// Structural problems found while extracting.
    pub errors: Vec<ProjectionDiagnostic>,
}

/// A source of embedded files for a source document.
pub trait LanguagePlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Lower orders run first.
    fn order(&self) -> i32 {
        0
    }

    fn get_embedded_files(&self, file_name: &str, source: &str) -> Result<Extraction, PluginError>;

    fn resolve_embedded_file(
        &self,
        source: &str,
        descriptor: &EmbeddedDescriptor,
        builder: &mut SegmentBuilder,
    ) -> Result<(), PluginError>;

    /// Whether an edit inside `file` can be patched in place.
    ///
    /// `patched` is the file's text with the edit applied and `edit` is the
    /// range the new text occupies in it. The default rejects every edit.
    fn accepts_edit(&self, _file: &EmbeddedFile, _patched: &str, _edit: Range<usize>) -> bool {
        false
    }
}

struct RegisteredPlugin {
    order: i32,
    plugin: Arc<dyn LanguagePlugin>,
}

/// Ordered set of plugins used to project source documents.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<RegisteredPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Register a plugin at its own order.
    pub fn register(&mut self, plugin: Arc<dyn LanguagePlugin>) {
        let order = plugin.order();
        self.register_with_order(plugin, order);
    }

    /// Register a plugin at an explicit order, overriding its default.
    pub fn register_with_order(&mut self, plugin: Arc<dyn LanguagePlugin>, order: i32) {
        trace!("Registering plugin: {}", plugin.name());
        let name = plugin.name().to_string();
        self.plugins.push(RegisteredPlugin { order, plugin });

        // Stable, so plugins with equal order keep registration order.
        self.plugins.sort_by_key(|p| p.order);

        debug!(
            "Registered plugin '{}' at order {} (total: {})",
            name,
            order,
            self.plugins.len()
        );
    }

    /// Plugins in the order they run.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn LanguagePlugin>> {
        self.plugins.iter().map(|p| &p.plugin)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn LanguagePlugin>> {
        self.iter().find(|p| p.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Registry built from the given plugins, honoring disabled names and
    /// order overrides.
    pub fn configured(
        plugins: impl IntoIterator<Item = Arc<dyn LanguagePlugin>>,
        disabled: &[String],
        orders: &HashMap<String, i32>,
    ) -> Self {
        let mut registry = Self::new();
        for plugin in plugins {
            if disabled.iter().any(|d| d == plugin.name()) {
                debug!("Plugin '{}' disabled by settings", plugin.name());
                continue;
            }
            let order = orders
                .get(plugin.name())
                .copied()
                .unwrap_or_else(|| plugin.order());
            registry.register_with_order(plugin, order);
        }
        registry
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| (p.plugin.name(), p.order)))
            .finish()
    }
}
