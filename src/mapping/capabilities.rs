//! Per-mapping feature capabilities.
//!
//! Each IDE feature consults only its own field, so bags from different
//! plugins (or from settings) can be intersected and unioned field by field.

use serde::Deserialize;

/// An IDE feature that may traverse a mapping edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Diagnostics,
    Rename,
    Completion,
    SemanticTokens,
    References,
    Definitions,
    FoldingRange,
    DocumentSymbol,
    Formatting,
}

/// Which way a request crosses a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Generated document -> source document (results flowing back out).
    ToSource,
    /// Source document -> generated document (requests flowing in).
    ToGenerated,
}

/// Rename permissions for both sides of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenameCapability {
    /// A rename started at the source location may enter the generated document.
    pub incoming: bool,
    /// Rename edits computed in the generated document may flow back to source.
    pub outgoing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompletionCapability {
    pub basic: bool,
    /// Completions from a secondary mapping (e.g. a generated helper scope).
    pub additional: bool,
}

/// Structured capability bag attached to every mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    pub diagnostics: bool,
    pub rename: RenameCapability,
    pub completion: CompletionCapability,
    pub semantic_tokens: bool,
    pub references: bool,
    pub definitions: bool,
    pub folding_range: bool,
    pub document_symbol: bool,
    pub formatting: bool,
}

impl Capabilities {
    /// Every feature enabled in both directions.
    pub const fn all() -> Self {
        Self {
            diagnostics: true,
            rename: RenameCapability {
                incoming: true,
                outgoing: true,
            },
            completion: CompletionCapability {
                basic: true,
                additional: false,
            },
            semantic_tokens: true,
            references: true,
            definitions: true,
            folding_range: true,
            document_symbol: true,
            formatting: true,
        }
    }

    /// Nothing enabled. Useful for generated-only regions.
    pub const fn none() -> Self {
        Self {
            diagnostics: false,
            rename: RenameCapability {
                incoming: false,
                outgoing: false,
            },
            completion: CompletionCapability {
                basic: false,
                additional: false,
            },
            semantic_tokens: false,
            references: false,
            definitions: false,
            folding_range: false,
            document_symbol: false,
            formatting: false,
        }
    }

    /// Navigation-only bag: rename, references and definitions.
    pub const fn navigation() -> Self {
        let mut caps = Self::none();
        caps.rename = RenameCapability {
            incoming: true,
            outgoing: true,
        };
        caps.references = true;
        caps.definitions = true;
        caps
    }

    /// Whether `feature` may cross this mapping in `direction`.
    pub fn permits(&self, feature: Feature, direction: Direction) -> bool {
        match feature {
            Feature::Diagnostics => self.diagnostics,
            Feature::Rename => match direction {
                Direction::ToGenerated => self.rename.incoming,
                Direction::ToSource => self.rename.outgoing,
            },
            Feature::Completion => self.completion.basic || self.completion.additional,
            Feature::SemanticTokens => self.semantic_tokens,
            Feature::References => self.references,
            Feature::Definitions => self.definitions,
            Feature::FoldingRange => self.folding_range,
            Feature::DocumentSymbol => self.document_symbol,
            Feature::Formatting => self.formatting,
        }
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            diagnostics: self.diagnostics && other.diagnostics,
            rename: RenameCapability {
                incoming: self.rename.incoming && other.rename.incoming,
                outgoing: self.rename.outgoing && other.rename.outgoing,
            },
            completion: CompletionCapability {
                basic: self.completion.basic && other.completion.basic,
                additional: self.completion.additional && other.completion.additional,
            },
            semantic_tokens: self.semantic_tokens && other.semantic_tokens,
            references: self.references && other.references,
            definitions: self.definitions && other.definitions,
            folding_range: self.folding_range && other.folding_range,
            document_symbol: self.document_symbol && other.document_symbol,
            formatting: self.formatting && other.formatting,
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            diagnostics: self.diagnostics || other.diagnostics,
            rename: RenameCapability {
                incoming: self.rename.incoming || other.rename.incoming,
                outgoing: self.rename.outgoing || other.rename.outgoing,
            },
            completion: CompletionCapability {
                basic: self.completion.basic || other.completion.basic,
                additional: self.completion.additional || other.completion.additional,
            },
            semantic_tokens: self.semantic_tokens || other.semantic_tokens,
            references: self.references || other.references,
            definitions: self.definitions || other.definitions,
            folding_range: self.folding_range || other.folding_range,
            document_symbol: self.document_symbol || other.document_symbol,
            formatting: self.formatting || other.formatting,
        }
    }

    /// Apply optional per-feature overrides, as read from settings.
    pub fn with_overrides(&self, overrides: &CapabilityOverrides) -> Self {
        let mut caps = *self;
        if let Some(v) = overrides.diagnostics {
            caps.diagnostics = v;
        }
        if let Some(v) = overrides.rename {
            caps.rename = RenameCapability {
                incoming: v,
                outgoing: v,
            };
        }
        if let Some(v) = overrides.completion {
            caps.completion.basic = v;
            caps.completion.additional = v && caps.completion.additional;
        }
        if let Some(v) = overrides.semantic_tokens {
            caps.semantic_tokens = v;
        }
        if let Some(v) = overrides.references {
            caps.references = v;
        }
        if let Some(v) = overrides.definitions {
            caps.definitions = v;
        }
        if let Some(v) = overrides.folding_range {
            caps.folding_range = v;
        }
        if let Some(v) = overrides.document_symbol {
            caps.document_symbol = v;
        }
        if let Some(v) = overrides.formatting {
            caps.formatting = v;
        }
        caps
    }
}

/// Optional per-feature switches, deserialized from `[capabilities.<kind>]`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CapabilityOverrides {
    pub diagnostics: Option<bool>,
    pub rename: Option<bool>,
    pub completion: Option<bool>,
    pub semantic_tokens: Option<bool>,
    pub references: Option<bool>,
    pub definitions: Option<bool>,
    pub folding_range: Option<bool>,
    pub document_symbol: Option<bool>,
    pub formatting: Option<bool>,
}
