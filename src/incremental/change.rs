//! Text change ranges and their composition.

use std::ops::Range;

/// A span of text: `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextSpan {
    pub start: usize,
    pub length: usize,
}

impl TextSpan {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// An edit summary: `span` of the old text was replaced by `new_length` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextChangeRange {
    pub span: TextSpan,
    pub new_length: usize,
}

impl TextChangeRange {
    pub fn new(start: usize, length: usize, new_length: usize) -> Self {
        Self {
            span: TextSpan::new(start, length),
            new_length,
        }
    }

    pub fn length_diff(&self) -> isize {
        self.new_length as isize - self.span.length as isize
    }
}

/// A concrete edit against the pre-edit text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

impl TextChange {
    pub fn new(range: Range<usize>, new_text: impl Into<String>) -> Self {
        Self {
            start: range.start,
            end: range.end,
            new_text: new_text.into(),
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::new(offset..offset, text)
    }

    pub fn range(&self) -> TextChangeRange {
        TextChangeRange::new(self.start, self.end - self.start, self.new_text.len())
    }

    pub fn length_diff(&self) -> isize {
        self.range().length_diff()
    }

    /// Whether the edit fits `text` and lands on char boundaries.
    pub fn is_valid_for(&self, text: &str) -> bool {
        self.start <= self.end
            && self.end <= text.len()
            && text.is_char_boundary(self.start)
            && text.is_char_boundary(self.end)
    }

    /// Apply the edit to `text`. Callers check [`TextChange::is_valid_for`] first.
    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.new_text.len());
        out.push_str(&text[..self.start]);
        out.push_str(&self.new_text);
        out.push_str(&text[self.end..]);
        out
    }
}

/// Shift a position by a signed delta, saturating at zero.
pub(crate) fn apply_delta(position: usize, delta: isize) -> usize {
    (position as isize).saturating_add(delta).max(0) as usize
}

/// Collapse edits applied one after another into a single net change.
///
/// Each change is expressed against the text produced by the previous one.
/// The result is expressed against the text before the first change.
pub fn combine_continuous_changes(changes: &[TextChangeRange]) -> Option<TextChangeRange> {
    let (first, rest) = changes.split_first()?;
    Some(rest.iter().fold(*first, combine_pair))
}

fn combine_pair(a: TextChangeRange, b: &TextChangeRange) -> TextChangeRange {
    let a_start = a.span.start as isize;
    let a_end = a.span.end() as isize;
    let a_diff = a.length_diff();
    let change_begin = a_start + a.span.length.min(a.new_length) as isize;

    // Map a position in the intermediate text back to the original text.
    let rollback = |position: isize| {
        if position > change_begin {
            a_start.max(position - a_diff)
        } else {
            position
        }
    };

    let b_start = rollback(b.span.start as isize);
    let b_end = rollback(b.span.end() as isize);
    let b_diff = b.length_diff();

    let start = a_start.min(b_start);
    let end = a_end.max(b_end);
    let length = end - start;
    let new_length = (a_diff + b_diff + length).max(0);

    TextChangeRange::new(start as usize, length as usize, new_length as usize)
}

/// Collapse edits that are all expressed against the same base text.
///
/// The result covers the union of the spans; unchanged gaps between them are
/// kept at their original length.
pub fn combine_multi_line_changes(changes: &[TextChangeRange]) -> Option<TextChangeRange> {
    let start = changes.iter().map(|c| c.span.start).min()?;
    let end = changes.iter().map(|c| c.span.end()).max()?;
    let diff: isize = changes.iter().map(TextChangeRange::length_diff).sum();
    let length = end - start;
    let new_length = (length as isize + diff).max(0) as usize;
    Some(TextChangeRange::new(start, length, new_length))
}
