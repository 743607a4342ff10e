//! Mappings between source and generated documents.
//!
//! This module provides:
//! - `Capabilities` for per-range feature gating
//! - `SegmentBuilder` for accumulating generated text with mappings
//! - `SourceMap` for range/offset translation in both directions
//! - `TeleportMap` for alias links inside one generated document

mod builder;
mod capabilities;
mod table;
mod teleport;

pub use builder::{BuiltText, Segment, SegmentBuilder};
pub use capabilities::{
    Capabilities, CapabilityOverrides, CompletionCapability, Direction, Feature, RenameCapability,
};
pub use table::{Mapping, MappingKind, SourceMap};
pub use teleport::{TeleportCapabilities, TeleportMap, TeleportMapping};
