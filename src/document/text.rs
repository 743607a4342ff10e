//! Text utilities for position conversion.
//!
//! Provides byte offset <-> LSP position conversion with proper UTF-16 handling.

use std::sync::Arc;

use tower_lsp::lsp_types::Position;

/// Pre-computed line index for efficient position lookups.
///
/// LSP positions use line/column where column is in UTF-16 code units.
/// This struct pre-computes line start offsets for O(log n) lookup.
/// Conversions never fail: out-of-range input clamps to the nearest valid
/// location.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    /// Source text (needed for UTF-16 column calculation).
    source: Arc<str>,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        let source = source.into();
        let mut line_starts = vec![0];

        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }

        Self {
            line_starts,
            source,
        }
    }

    /// Get the source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset to an LSP position.
    ///
    /// Offsets past the end clamp to the end; offsets inside a multi-byte
    /// character resolve to that character's start.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }

        // Binary search to find the line
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,                    // Exact match (start of line)
            Err(line) => line.saturating_sub(1), // In the middle of a line
        };

        let line_start = self.line_starts[line];
        let col: u32 = self.source[line_start..offset]
            .chars()
            .map(|c| c.len_utf16() as u32)
            .sum();

        Position::new(line as u32, col)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Lines past the end clamp to the end of the text; columns past the end
    /// of a line clamp to the end of that line.
    pub fn position_to_offset(&self, position: Position) -> usize {
        let line = position.line as usize;

        let Some(&line_start) = self.line_starts.get(line) else {
            return self.source.len();
        };
        let line_end = self
            .line_starts
            .get(line + 1)
            .map(|&end| end.saturating_sub(1)) // Exclude newline
            .unwrap_or(self.source.len());

        let line_slice = &self.source[line_start..line_end];

        // Walk UTF-16 code units to find byte offset
        let mut utf16_col = 0u32;
        for (i, c) in line_slice.char_indices() {
            if utf16_col >= position.character {
                return line_start + i;
            }
            utf16_col += c.len_utf16() as u32;
        }

        // Position is at or past end of line
        line_end
    }

    /// Convert a byte span to an LSP range.
    pub fn span_to_range(&self, span: &std::ops::Range<usize>) -> tower_lsp::lsp_types::Range {
        let start = self.offset_to_position(span.start);
        let end = self.offset_to_position(span.end);
        tower_lsp::lsp_types::Range::new(start, end)
    }

    /// Convert an LSP range to a byte span.
    pub fn range_to_span(&self, range: tower_lsp::lsp_types::Range) -> std::ops::Range<usize> {
        let start = self.position_to_offset(range.start);
        let end = self.position_to_offset(range.end);
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let idx = LineIndex::new("hello world");
        assert_eq!(idx.offset_to_position(0), Position::new(0, 0));
        assert_eq!(idx.offset_to_position(5), Position::new(0, 5));
        assert_eq!(idx.offset_to_position(11), Position::new(0, 11));
    }

    #[test]
    fn multi_line() {
        let idx = LineIndex::new("hello\nworld\ntest");
        assert_eq!(idx.offset_to_position(0), Position::new(0, 0));
        assert_eq!(idx.offset_to_position(5), Position::new(0, 5)); // 'o' before newline
        assert_eq!(idx.offset_to_position(6), Position::new(1, 0)); // 'w'
        assert_eq!(idx.offset_to_position(11), Position::new(1, 5)); // 'd' before newline
        assert_eq!(idx.offset_to_position(12), Position::new(2, 0)); // 't'
    }

    #[test]
    fn position_to_offset_single_line() {
        let idx = LineIndex::new("hello world");
        assert_eq!(idx.position_to_offset(Position::new(0, 0)), 0);
        assert_eq!(idx.position_to_offset(Position::new(0, 5)), 5);
        assert_eq!(idx.position_to_offset(Position::new(0, 11)), 11);
    }

    #[test]
    fn position_to_offset_multi_line() {
        let idx = LineIndex::new("hello\nworld");
        assert_eq!(idx.position_to_offset(Position::new(0, 0)), 0);
        assert_eq!(idx.position_to_offset(Position::new(0, 5)), 5);
        assert_eq!(idx.position_to_offset(Position::new(1, 0)), 6);
        assert_eq!(idx.position_to_offset(Position::new(1, 5)), 11);
    }

    #[test]
    fn utf16_handling() {
        // '😀' is 4 bytes in UTF-8 but 2 code units in UTF-16
        let idx = LineIndex::new("a😀b");
        assert_eq!(idx.offset_to_position(0), Position::new(0, 0));
        assert_eq!(idx.offset_to_position(1), Position::new(0, 1));
        // 'b' is at byte 5, col 3 (1 + 2 for emoji)
        assert_eq!(idx.offset_to_position(5), Position::new(0, 3));

        // Reverse: col 3 should give byte 5
        assert_eq!(idx.position_to_offset(Position::new(0, 3)), 5);
    }

    #[test]
    fn conversions_are_inverse_for_valid_input() {
        let text = "<script>\n  let é = 1;\n</script>\n";
        let idx = LineIndex::new(text);
        for (offset, _) in text.char_indices() {
            let position = idx.offset_to_position(offset);
            assert_eq!(idx.position_to_offset(position), offset);
        }
    }

    #[test]
    fn out_of_bounds_clamps() {
        let idx = LineIndex::new("hello\nworld");
        assert_eq!(idx.position_to_offset(Position::new(5, 0)), 11);
        assert_eq!(idx.position_to_offset(Position::new(0, 99)), 5);
        assert_eq!(idx.offset_to_position(500), Position::new(1, 5));
    }

    #[test]
    fn offset_inside_char_snaps_to_char_start() {
        let idx = LineIndex::new("a😀b");
        assert_eq!(idx.offset_to_position(3), Position::new(0, 1));
    }

    #[test]
    fn span_to_range() {
        let idx = LineIndex::new("hello\nworld");
        let range = idx.span_to_range(&(6..11));
        assert_eq!(range.start, Position::new(1, 0));
        assert_eq!(range.end, Position::new(1, 5));
        assert_eq!(idx.range_to_span(range), 6..11);
    }
}
