//! Per-session projection configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::mapping::Capabilities;
use crate::settings::Settings;

use super::embedded::EmbeddedKind;
use super::plugin::{LanguagePlugin, PluginRegistry};
use super::plugins::{ScriptSetupBindingsPlugin, SfcBlocksPlugin, TemplateInterpolationPlugin};

/// Everything a build or reconcile needs besides the source text.
///
/// Built once per session and passed explicitly.
#[derive(Debug)]
pub struct ProjectionContext {
    pub plugins: PluginRegistry,
    /// Upper capability bound per `EmbeddedKind::settings_key`.
    capability_bounds: HashMap<String, Capabilities>,
    /// Whether edits may be patched in place instead of rebuilding.
    pub incremental: bool,
}

impl ProjectionContext {
    pub fn new(plugins: PluginRegistry) -> Self {
        Self {
            plugins,
            capability_bounds: HashMap::new(),
            incremental: true,
        }
    }

    /// The built-in single-file component plugins.
    pub fn default_plugins() -> Vec<Arc<dyn LanguagePlugin>> {
        vec![
            Arc::new(SfcBlocksPlugin),
            Arc::new(TemplateInterpolationPlugin),
            Arc::new(ScriptSetupBindingsPlugin),
        ]
    }

    pub fn with_default_plugins() -> Self {
        let mut registry = PluginRegistry::new();
        for plugin in Self::default_plugins() {
            registry.register(plugin);
        }
        Self::new(registry)
    }

    /// Build the context described by `settings` on top of the built-in plugins.
    pub fn from_settings(settings: &Settings) -> Self {
        let (disabled, orders) = settings
            .plugins
            .as_ref()
            .map(|p| {
                (
                    p.disabled.clone().unwrap_or_default(),
                    p.order.clone().unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        let registry = PluginRegistry::configured(Self::default_plugins(), &disabled, &orders);

        let mut ctx = Self::new(registry);
        if let Some(capabilities) = &settings.capabilities {
            for (key, overrides) in capabilities {
                let bound = Capabilities::all().with_overrides(overrides);
                debug!("Capability bound for '{}': {:?}", key, bound);
                ctx.capability_bounds.insert(key.clone(), bound);
            }
        }
        if let Some(enabled) = settings.incremental.as_ref().and_then(|i| i.enabled) {
            ctx.incremental = enabled;
        }
        ctx
    }

    /// Restrict every embedded file whose kind has `key` as settings key.
    pub fn with_capability_bound(mut self, key: impl Into<String>, bound: Capabilities) -> Self {
        self.capability_bounds.insert(key.into(), bound);
        self
    }

    pub fn with_incremental(mut self, enabled: bool) -> Self {
        self.incremental = enabled;
        self
    }

    pub fn capabilities_for(&self, kind: &EmbeddedKind) -> Capabilities {
        self.capability_bounds
            .get(kind.settings_key())
            .copied()
            .unwrap_or_else(Capabilities::all)
    }
}

impl Default for ProjectionContext {
    fn default() -> Self {
        Self::with_default_plugins()
    }
}
