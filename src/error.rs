//! Error types for the projection engine.
//!
//! Only failures that cross an API boundary get a type here. Mapping misses
//! and reconciliation misses are ordinary control flow (`None`, empty
//! iterators, [`ReconcileOutcome`](crate::incremental::ReconcileOutcome)).

use std::path::PathBuf;

use thiserror::Error;

/// A failure raised by a language plugin while extracting or resolving
/// embedded files. Always contained to the plugin that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("plugin '{plugin}' failed to extract embedded files: {message}")]
    Extraction { plugin: String, message: String },

    #[error("plugin '{plugin}' failed to resolve embedded file '{id}': {message}")]
    Resolve {
        plugin: String,
        id: String,
        message: String,
    },

    #[error("plugin '{plugin}' panicked: {message}")]
    Panicked { plugin: String, message: String },
}

impl PluginError {
    /// Name of the plugin that failed.
    pub fn plugin(&self) -> &str {
        match self {
            PluginError::Extraction { plugin, .. }
            | PluginError::Resolve { plugin, .. }
            | PluginError::Panicked { plugin, .. } => plugin,
        }
    }
}

/// Failure to load a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
