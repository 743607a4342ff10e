//! LSP protocol feature implementations.
//!
//! This module provides implementations for LSP features:
//! - Diagnostics from the projection and from analyzers, mapped to the source
//! - Document symbols and folding ranges per embedded block
//! - Rename through generated documents

mod diagnostics;
mod rename;
mod symbols;

pub use diagnostics::{map_generated_diagnostics, projection_diagnostics};
pub use rename::{map_rename_edits, rename_targets};
pub use symbols::{document_symbols, folding_ranges};
