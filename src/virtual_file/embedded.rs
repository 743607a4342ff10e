//! Embedded (generated) files and their kinds.

use std::collections::VecDeque;
use std::fmt;

use crate::document::TextSnapshot;
use crate::incremental::{combine_continuous_changes, TextChangeRange};
use crate::mapping::{
    BuiltText, Capabilities, MappingKind, Segment, SourceMap, TeleportMap,
};

/// How many change ranges an embedded file remembers.
const HISTORY_LIMIT: usize = 64;

/// What an embedded file stands for in its source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmbeddedKind {
    /// The whole source document.
    Root,
    Template,
    /// Code generated from template expressions.
    TemplateCode,
    Script { setup: bool },
    Style { index: usize, scoped: bool },
    Custom { tag: String, index: usize },
}

impl EmbeddedKind {
    /// Key used for `[capabilities.<key>]` tables in settings.
    pub fn settings_key(&self) -> &'static str {
        match self {
            EmbeddedKind::Root => "root",
            EmbeddedKind::Template => "template",
            EmbeddedKind::TemplateCode => "template_code",
            EmbeddedKind::Script { setup: false } => "script",
            EmbeddedKind::Script { setup: true } => "script_setup",
            EmbeddedKind::Style { .. } => "style",
            EmbeddedKind::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for EmbeddedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddedKind::Root => write!(f, "root"),
            EmbeddedKind::Template => write!(f, "template"),
            EmbeddedKind::TemplateCode => write!(f, "template-code"),
            EmbeddedKind::Script { setup: false } => write!(f, "script"),
            EmbeddedKind::Script { setup: true } => write!(f, "script setup"),
            EmbeddedKind::Style { index, scoped: false } => write!(f, "style #{}", index),
            EmbeddedKind::Style { index, scoped: true } => write!(f, "style #{} scoped", index),
            EmbeddedKind::Custom { tag, index } => write!(f, "<{}> #{}", tag, index),
        }
    }
}

/// One node of a projected tree.
///
/// The text lives in `snapshot`; `segments`, `source_map` and `teleport`
/// describe how it was assembled. Children are generated files derived from
/// this one (e.g. code extracted from a template).
#[derive(Debug, Clone)]
pub struct EmbeddedFile {
    pub id: String,
    pub language_id: String,
    pub kind: EmbeddedKind,
    /// Name of the plugin that produced this file.
    pub plugin: String,
    pub snapshot: TextSnapshot,
    pub segments: Vec<Segment>,
    pub source_map: SourceMap,
    pub teleport: TeleportMap,
    pub children: Vec<EmbeddedFile>,
    /// Upper bound applied on top of every mapping's own capabilities.
    pub capabilities: Capabilities,
    pub version: u64,
    history: VecDeque<(u64, TextChangeRange)>,
}

impl EmbeddedFile {
    /// The whole-document node. Its content is the source text and it has
    /// no mappings of its own.
    pub fn root(language_id: impl Into<String>, snapshot: TextSnapshot) -> Self {
        Self {
            id: String::new(),
            language_id: language_id.into(),
            kind: EmbeddedKind::Root,
            plugin: String::new(),
            snapshot,
            segments: Vec::new(),
            source_map: SourceMap::default(),
            teleport: TeleportMap::default(),
            children: Vec::new(),
            capabilities: Capabilities::all(),
            version: 0,
            history: VecDeque::new(),
        }
    }

    pub fn from_built(
        id: impl Into<String>,
        language_id: impl Into<String>,
        kind: EmbeddedKind,
        plugin: impl Into<String>,
        built: BuiltText,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            id: id.into(),
            language_id: language_id.into(),
            kind,
            plugin: plugin.into(),
            snapshot: TextSnapshot::new(built.text),
            segments: built.segments,
            source_map: built.source_map,
            teleport: built.teleport,
            children: Vec::new(),
            capabilities,
            version: 0,
            history: VecDeque::new(),
        }
    }

    pub fn text(&self) -> &str {
        self.snapshot.text()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.kind == EmbeddedKind::Root
    }

    /// Whether the text is one verbatim copy of a single source range.
    pub fn is_pure_reemission(&self) -> bool {
        let single_segment = matches!(self.segments.as_slice(), [Segment::Mapped { .. }]);
        let single_mapping = matches!(
            self.source_map.mappings(),
            [m] if m.kind == MappingKind::Offset && m.additional_source_ranges.is_empty()
        );
        single_segment && single_mapping && self.teleport.is_empty()
    }

    /// Whether `other` would produce the same generated document.
    pub fn same_projection(&self, other: &EmbeddedFile) -> bool {
        self.id == other.id
            && self.language_id == other.language_id
            && self.kind == other.kind
            && self.snapshot == other.snapshot
            && self.source_map == other.source_map
            && self.teleport == other.teleport
            && self.capabilities == other.capabilities
    }

    /// Bump the version and remember how the text changed.
    pub(crate) fn record_change(&mut self, change: TextChangeRange) {
        self.version += 1;
        self.history.push_back((self.version, change));
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Take over the identity of the previous incarnation of this file.
    ///
    /// Unchanged text keeps the old snapshot and version even when the
    /// source ranges moved. Changed text gets the next version and a diff.
    pub(crate) fn inherit(&mut self, previous: &EmbeddedFile) {
        self.history = previous.history.clone();
        self.version = previous.version;
        match self.snapshot.change_range_from(&previous.snapshot) {
            Some(change) => self.record_change(change),
            None => self.snapshot = previous.snapshot.clone(),
        }
    }

    /// Net change since `version`, or `None` when there is none or it is no
    /// longer known (the caller should then re-read the whole text).
    pub fn change_range_since(&self, version: u64) -> Option<TextChangeRange> {
        if version >= self.version {
            return None;
        }
        let oldest_known = self.history.front().map(|(v, _)| *v)?;
        if oldest_known > version + 1 {
            return None;
        }
        let changes: Vec<TextChangeRange> = self
            .history
            .iter()
            .filter(|(v, _)| *v > version)
            .map(|(_, change)| *change)
            .collect();
        combine_continuous_changes(&changes)
    }

    /// This file and all its descendants, depth first.
    pub fn iter(&self) -> EmbeddedIter<'_> {
        EmbeddedIter { stack: vec![self] }
    }

    /// All descendants, excluding this file.
    pub fn descendants(&self) -> impl Iterator<Item = &EmbeddedFile> {
        self.iter().skip(1)
    }

    pub fn find(&self, id: &str) -> Option<&EmbeddedFile> {
        self.iter().find(|f| f.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut EmbeddedFile> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }
}

/// Pre-order walk over an embedded file tree.
pub struct EmbeddedIter<'a> {
    stack: Vec<&'a EmbeddedFile>,
}

impl<'a> Iterator for EmbeddedIter<'a> {
    type Item = &'a EmbeddedFile;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.stack.pop()?;
        self.stack.extend(file.children.iter().rev());
        Some(file)
    }
}
