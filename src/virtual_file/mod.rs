//! The embedded file tree of a source document.
//!
//! This module provides:
//! - `EmbeddedFile` and `EmbeddedKind` for tree nodes
//! - `LanguagePlugin` and `PluginRegistry` for pluggable extraction
//! - `project` for building a tree from source text
//! - built-in plugins for single-file components

mod context;
mod embedded;
mod plugin;
mod plugins;
pub mod sfc;
mod tree;

pub use context::ProjectionContext;
pub use embedded::{EmbeddedFile, EmbeddedIter, EmbeddedKind};
pub use plugin::{
    EmbeddedDescriptor, Extraction, LanguagePlugin, PluginRegistry, ProjectionDiagnostic,
    ProjectionDiagnosticKind,
};
pub use plugins::{ScriptSetupBindingsPlugin, SfcBlocksPlugin, TemplateInterpolationPlugin};
pub use tree::{project, root_language_id, Projection};

pub(crate) use tree::contain;
