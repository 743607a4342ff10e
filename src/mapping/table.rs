//! The mapping table between a source document and one generated document.
//!
//! Queries are lazy and stateless: every call walks the immutable table again,
//! yielding candidates in table order. The first candidate whose data passes
//! the caller's filter is the canonical answer; callers wanting a different
//! preference encode it in the filter.

use std::ops::Range;

use super::capabilities::Capabilities;

/// How offsets inside a mapping correspond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingKind {
    /// Pure re-emission. Source and generated lengths are equal and every
    /// interior offset translates exactly.
    Offset,
    /// Length-changing correspondence. Range endpoints map to endpoints;
    /// interior offsets clamp to the shorter side.
    PositionPreserving,
}

/// One correspondence between a source range and a generated range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping<D = Capabilities> {
    pub source_range: Range<usize>,
    pub generated_range: Range<usize>,
    pub kind: MappingKind,
    pub data: D,
    /// Further source ranges the same generated text stands for.
    pub additional_source_ranges: Vec<Range<usize>>,
}

impl<D> Mapping<D> {
    /// An equal-length mapping starting at the given offsets.
    pub fn offset(source_start: usize, generated_start: usize, length: usize, data: D) -> Self {
        Self {
            source_range: source_start..source_start + length,
            generated_range: generated_start..generated_start + length,
            kind: MappingKind::Offset,
            data,
            additional_source_ranges: Vec::new(),
        }
    }

    pub fn position_preserving(
        source_range: Range<usize>,
        generated_range: Range<usize>,
        data: D,
    ) -> Self {
        Self {
            source_range,
            generated_range,
            kind: MappingKind::PositionPreserving,
            data,
            additional_source_ranges: Vec::new(),
        }
    }

    pub fn with_additional_source_range(mut self, range: Range<usize>) -> Self {
        self.additional_source_ranges.push(range);
        self
    }

    /// The primary source range followed by any additional ones.
    pub fn source_ranges(&self) -> impl Iterator<Item = &Range<usize>> {
        std::iter::once(&self.source_range).chain(self.additional_source_ranges.iter())
    }

    fn can_merge_with(&self, next: &Mapping<D>) -> bool
    where
        D: PartialEq,
    {
        self.kind == MappingKind::Offset
            && next.kind == MappingKind::Offset
            && self.additional_source_ranges.is_empty()
            && next.additional_source_ranges.is_empty()
            && self.generated_range.end == next.generated_range.start
            && self.source_range.end == next.source_range.start
            && self.data == next.data
    }
}

/// Ordered mapping table for one generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap<D = Capabilities> {
    mappings: Vec<Mapping<D>>,
}

impl<D> Default for SourceMap<D> {
    fn default() -> Self {
        Self {
            mappings: Vec::new(),
        }
    }
}

impl<D: Clone + PartialEq> SourceMap<D> {
    /// Build a table. Mappings are stable-sorted by generated start, so
    /// construction order breaks ties, then contiguous equal mappings merge.
    pub fn new(mut mappings: Vec<Mapping<D>>) -> Self {
        mappings.sort_by_key(|m| m.generated_range.start);
        Self {
            mappings: merge_adjacent(mappings),
        }
    }

    pub fn mappings(&self) -> &[Mapping<D>] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Translate a generated range into source ranges.
    pub fn to_source_ranges<'a, F>(
        &'a self,
        range: Range<usize>,
        filter: F,
    ) -> impl Iterator<Item = (Range<usize>, &'a Mapping<D>)> + 'a
    where
        F: Fn(&D) -> bool + 'a,
    {
        let end = range.end;
        self.mappings
            .iter()
            .take_while(move |m| m.generated_range.start <= end)
            .filter(move |m| filter(&m.data))
            .filter_map(move |m| overlap(&range, &m.generated_range).map(|clip| (clip, m)))
            .flat_map(|(clip, m)| {
                m.source_ranges()
                    .map(move |source| (translate_range(&clip, &m.generated_range, source), m))
            })
    }

    /// Translate a source range into generated ranges.
    pub fn to_generated_ranges<'a, F>(
        &'a self,
        range: Range<usize>,
        filter: F,
    ) -> impl Iterator<Item = (Range<usize>, &'a Mapping<D>)> + 'a
    where
        F: Fn(&D) -> bool + 'a,
    {
        self.mappings
            .iter()
            .filter(move |m| filter(&m.data))
            .flat_map(move |m| {
                let range = range.clone();
                m.source_ranges().filter_map(move |source| {
                    overlap(&range, source)
                        .map(|clip| (translate_range(&clip, source, &m.generated_range), m))
                })
            })
    }

    /// Translate a single generated offset into source offsets.
    pub fn to_source_offsets<'a, F>(
        &'a self,
        offset: usize,
        filter: F,
    ) -> impl Iterator<Item = (usize, &'a Mapping<D>)> + 'a
    where
        F: Fn(&D) -> bool + 'a,
    {
        self.mappings
            .iter()
            .take_while(move |m| m.generated_range.start <= offset)
            .filter(move |m| filter(&m.data) && contains(&m.generated_range, offset))
            .flat_map(move |m| {
                m.source_ranges()
                    .map(move |source| (translate_offset(offset, &m.generated_range, source), m))
            })
    }

    /// Translate a single source offset into generated offsets.
    pub fn to_generated_offsets<'a, F>(
        &'a self,
        offset: usize,
        filter: F,
    ) -> impl Iterator<Item = (usize, &'a Mapping<D>)> + 'a
    where
        F: Fn(&D) -> bool + 'a,
    {
        self.mappings
            .iter()
            .filter(move |m| filter(&m.data))
            .flat_map(move |m| {
                m.source_ranges()
                    .filter(move |source| contains(source, offset))
                    .map(move |source| (translate_offset(offset, source, &m.generated_range), m))
            })
    }

    /// Smallest source range covering every mapping, or `None` for an empty table.
    pub fn source_coverage(&self) -> Option<Range<usize>> {
        let mut ranges = self.mappings.iter().flat_map(|m| m.source_ranges());
        let first = ranges.next()?.clone();
        Some(ranges.fold(first, |acc, r| acc.start.min(r.start)..acc.end.max(r.end)))
    }

    pub(crate) fn mappings_mut(&mut self) -> &mut [Mapping<D>] {
        &mut self.mappings
    }
}

fn merge_adjacent<D: PartialEq>(mappings: Vec<Mapping<D>>) -> Vec<Mapping<D>> {
    let mut merged: Vec<Mapping<D>> = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        if let Some(last) = merged.last_mut() {
            if last.can_merge_with(&mapping) {
                last.source_range.end = mapping.source_range.end;
                last.generated_range.end = mapping.generated_range.end;
                continue;
            }
        }
        merged.push(mapping);
    }
    merged
}

/// Inclusive containment: a cursor at a range's end still belongs to it.
fn contains(range: &Range<usize>, offset: usize) -> bool {
    range.start <= offset && offset <= range.end
}

/// Clip `query` to `range`. Empty queries and empty ranges match on touch.
fn overlap(query: &Range<usize>, range: &Range<usize>) -> Option<Range<usize>> {
    if query.is_empty() {
        let point = query.start;
        return contains(range, point).then_some(point..point);
    }
    if range.is_empty() {
        let point = range.start;
        return contains(query, point).then_some(point..point);
    }
    let start = query.start.max(range.start);
    let end = query.end.min(range.end);
    (start < end).then_some(start..end)
}

fn translate_offset(offset: usize, from: &Range<usize>, to: &Range<usize>) -> usize {
    let relative = offset - from.start;
    if relative == 0 {
        to.start
    } else if relative >= from.len() {
        to.end
    } else {
        to.start + relative.min(to.len())
    }
}

fn translate_range(clip: &Range<usize>, from: &Range<usize>, to: &Range<usize>) -> Range<usize> {
    if clip == from {
        return to.clone();
    }
    let start = translate_offset(clip.start, from, to);
    if clip.is_empty() {
        return start..start;
    }
    let end = translate_offset(clip.end, from, to);
    start..end.max(start)
}
