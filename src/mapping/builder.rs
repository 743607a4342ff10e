//! Incremental construction of generated text with source mappings.

use std::ops::Range;

use super::capabilities::Capabilities;
use super::table::{Mapping, SourceMap};
use super::teleport::{TeleportCapabilities, TeleportMap, TeleportMapping};

/// One piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Generated-only text with no source equivalent.
    Literal(String),
    /// Text derived from the source, starting at `source_offset`.
    Mapped {
        text: String,
        source_offset: usize,
        data: Capabilities,
    },
    /// Rewritten text standing for `source_range` (lengths may differ).
    Transformed {
        text: String,
        source_range: Range<usize>,
        data: Capabilities,
    },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Literal(text)
            | Segment::Mapped { text, .. }
            | Segment::Transformed { text, .. } => text,
        }
    }

    pub fn len(&self) -> usize {
        self.text().len()
    }

    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }
}

/// Output of a finished [`SegmentBuilder`].
#[derive(Debug, Clone, Default)]
pub struct BuiltText {
    pub text: String,
    pub segments: Vec<Segment>,
    pub source_map: SourceMap,
    pub teleport: TeleportMap,
}

/// Accumulates generated text, recording one mapping per source-tagged append.
///
/// Builders cannot fail; empty input produces empty output.
#[derive(Debug, Clone, Default)]
pub struct SegmentBuilder {
    text: String,
    segments: Vec<Segment>,
    mappings: Vec<Mapping>,
    links: Vec<TeleportMapping>,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generated length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Append generated-only text.
    pub fn push_str(&mut self, literal: &str) -> Range<usize> {
        let start = self.text.len();
        self.text.push_str(literal);
        if !literal.is_empty() {
            self.segments.push(Segment::Literal(literal.to_string()));
        }
        start..self.text.len()
    }

    /// Append text copied verbatim from `source_offset`, recording a mapping.
    pub fn push_mapped(&mut self, text: &str, source_offset: usize, data: Capabilities) -> Range<usize> {
        let start = self.text.len();
        self.text.push_str(text);
        self.segments.push(Segment::Mapped {
            text: text.to_string(),
            source_offset,
            data,
        });
        self.mappings
            .push(Mapping::offset(source_offset, start, text.len(), data));
        start..self.text.len()
    }

    /// Append rewritten text standing for `source_range`.
    pub fn push_transformed(
        &mut self,
        text: &str,
        source_range: Range<usize>,
        data: Capabilities,
    ) -> Range<usize> {
        let start = self.text.len();
        self.text.push_str(text);
        let generated = start..self.text.len();
        self.segments.push(Segment::Transformed {
            text: text.to_string(),
            source_range: source_range.clone(),
            data,
        });
        self.mappings
            .push(Mapping::position_preserving(source_range, generated.clone(), data));
        generated
    }

    /// Record that generated `origin` is an alias of generated `target`.
    /// Both ranges must have the same length.
    pub fn link(&mut self, origin: Range<usize>, target: Range<usize>, data: TeleportCapabilities) {
        debug_assert_eq!(origin.len(), target.len());
        self.links
            .push(Mapping::offset(origin.start, target.start, origin.len(), data));
    }

    /// Concatenate another builder's output, shifting its mappings and links.
    pub fn append(&mut self, other: SegmentBuilder) {
        let shift = self.text.len();
        self.text.push_str(&other.text);
        self.segments.extend(other.segments);
        self.mappings.extend(other.mappings.into_iter().map(|mut m| {
            m.generated_range = m.generated_range.start + shift..m.generated_range.end + shift;
            m
        }));
        self.links.extend(other.links.into_iter().map(|mut l| {
            l.source_range = l.source_range.start + shift..l.source_range.end + shift;
            l.generated_range = l.generated_range.start + shift..l.generated_range.end + shift;
            l
        }));
    }

    pub fn finish(self) -> BuiltText {
        BuiltText {
            text: self.text,
            segments: self.segments,
            source_map: SourceMap::new(self.mappings),
            teleport: TeleportMap::new(self.links),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_and_mapped_text_accumulate() {
        let mut builder = SegmentBuilder::new();
        assert_eq!(builder.push_str("("), 0..1);
        assert_eq!(builder.push_mapped("count", 42, Capabilities::all()), 1..6);
        assert_eq!(builder.push_str(");"), 6..8);

        let built = builder.finish();
        assert_eq!(built.text, "(count);");
        assert_eq!(built.segments.len(), 3);
        assert_eq!(built.source_map.len(), 1);
        assert_eq!(built.source_map.mappings()[0].source_range, 42..47);
        assert_eq!(built.source_map.mappings()[0].generated_range, 1..6);
    }

    #[test]
    fn segment_lengths_sum_to_text_length() {
        let mut builder = SegmentBuilder::new();
        builder.push_str("const x = ");
        builder.push_mapped("value", 3, Capabilities::all());
        builder.push_transformed("__ctx", 0..1, Capabilities::navigation());
        builder.push_str(";\n");
        let built = builder.finish();
        let total: usize = built.segments.iter().map(Segment::len).sum();
        assert_eq!(total, built.text.len());
    }

    #[test]
    fn empty_mapped_append_still_records_a_mapping() {
        let mut builder = SegmentBuilder::new();
        builder.push_mapped("", 7, Capabilities::all());
        let built = builder.finish();
        assert!(built.text.is_empty());
        assert_eq!(built.source_map.len(), 1);
        assert_eq!(built.source_map.mappings()[0].source_range, 7..7);
    }

    #[test]
    fn char_by_char_appends_match_single_append() {
        let source = "hello";
        let mut chars = SegmentBuilder::new();
        for (i, c) in source.char_indices() {
            chars.push_mapped(&c.to_string(), 10 + i, Capabilities::all());
        }
        let mut whole = SegmentBuilder::new();
        whole.push_mapped(source, 10, Capabilities::all());

        let chars = chars.finish();
        let whole = whole.finish();
        assert_eq!(chars.text, whole.text);
        assert_eq!(chars.source_map, whole.source_map);
        assert_eq!(chars.source_map.len(), 1);
    }

    #[test]
    fn append_offsets_mappings_and_links() {
        let mut head = SegmentBuilder::new();
        head.push_str("abc");

        let mut tail = SegmentBuilder::new();
        let target = tail.push_mapped("x", 5, Capabilities::all());
        let origin = tail.push_str("x");
        tail.link(origin, target, TeleportCapabilities::default());

        head.append(tail);
        let built = head.finish();
        assert_eq!(built.text, "abcxx");
        assert_eq!(built.source_map.mappings()[0].generated_range, 3..4);
        assert_eq!(built.teleport.links()[0].source_range, 4..5);
        assert_eq!(built.teleport.links()[0].generated_range, 3..4);
    }
}
