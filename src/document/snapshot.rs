//! Immutable text snapshots.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::incremental::{TextChange, TextChangeRange};

/// Process-unique identity of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(u64);

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable view of document text. Edits produce a new snapshot.
#[derive(Debug, Clone)]
pub struct TextSnapshot {
    id: SnapshotId,
    text: Arc<str>,
}

impl TextSnapshot {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            id: SnapshotId(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed)),
            text: text.into(),
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Substring access; `None` when the range is out of bounds or splits a char.
    pub fn slice(&self, range: Range<usize>) -> Option<&str> {
        self.text.get(range)
    }

    /// New snapshot with `change` applied, or `None` if the change doesn't fit.
    pub fn apply(&self, change: &TextChange) -> Option<TextSnapshot> {
        change
            .is_valid_for(&self.text)
            .then(|| TextSnapshot::new(change.apply(&self.text)))
    }

    /// Structural diff against an older snapshot: the common prefix and
    /// suffix are kept, the rest is reported as one replaced span.
    pub fn change_range_from(&self, old: &TextSnapshot) -> Option<TextChangeRange> {
        let old_text = old.text();
        let new_text = self.text();
        if old_text == new_text {
            return None;
        }

        let mut prefix = old_text
            .bytes()
            .zip(new_text.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        while !old_text.is_char_boundary(prefix) || !new_text.is_char_boundary(prefix) {
            prefix -= 1;
        }

        let max_suffix = old_text.len().min(new_text.len()) - prefix;
        let mut suffix = old_text
            .bytes()
            .rev()
            .zip(new_text.bytes().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        while !old_text.is_char_boundary(old_text.len() - suffix)
            || !new_text.is_char_boundary(new_text.len() - suffix)
        {
            suffix -= 1;
        }

        Some(TextChangeRange::new(
            prefix,
            old_text.len() - suffix - prefix,
            new_text.len() - suffix - prefix,
        ))
    }

    /// The concrete edit turning `old` into `self`.
    pub fn change_from(&self, old: &TextSnapshot) -> Option<TextChange> {
        let range = self.change_range_from(old)?;
        let start = range.span.start;
        let new_text = self.text.get(start..start + range.new_length)?;
        Some(TextChange::new(start..range.span.end(), new_text))
    }
}

impl PartialEq for TextSnapshot {
    /// Snapshots compare by content; use [`TextSnapshot::id`] for identity.
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for TextSnapshot {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_snapshot_gets_a_fresh_identity() {
        let a = TextSnapshot::new("same");
        let b = TextSnapshot::new("same");
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn identical_text_has_no_change_range() {
        let a = TextSnapshot::new("abc");
        let b = TextSnapshot::new("abc");
        assert_eq!(b.change_range_from(&a), None);
    }

    #[test]
    fn insertion_is_detected() {
        let old = TextSnapshot::new("let x = 1;");
        let new = TextSnapshot::new("let xyz = 1;");
        assert_eq!(
            new.change_range_from(&old),
            Some(TextChangeRange::new(5, 0, 2))
        );
        assert_eq!(
            new.change_from(&old),
            Some(TextChange::new(5..5, "yz"))
        );
    }

    #[test]
    fn deletion_and_replacement_are_detected() {
        let old = TextSnapshot::new("hello world");
        let deleted = TextSnapshot::new("hello");
        assert_eq!(
            deleted.change_range_from(&old),
            Some(TextChangeRange::new(5, 6, 0))
        );

        let replaced = TextSnapshot::new("help world");
        assert_eq!(
            replaced.change_range_from(&old),
            Some(TextChangeRange::new(3, 2, 1))
        );
    }

    #[test]
    fn repeated_characters_do_not_overlap_prefix_and_suffix() {
        let old = TextSnapshot::new("aa");
        let new = TextSnapshot::new("aaa");
        let change = new.change_range_from(&old).unwrap();
        assert_eq!(change, TextChangeRange::new(2, 0, 1));
    }

    #[test]
    fn diff_stays_on_char_boundaries() {
        // 'é' (c3 a9) and 'è' (c3 a8) share their first byte.
        let old = TextSnapshot::new("xé");
        let new = TextSnapshot::new("xè");
        let change = new.change_range_from(&old).unwrap();
        assert_eq!(change, TextChangeRange::new(1, 2, 2));
    }

    #[test]
    fn apply_produces_new_snapshot() {
        let snapshot = TextSnapshot::new("abc");
        let next = snapshot.apply(&TextChange::insert(1, "x")).unwrap();
        assert_eq!(next.text(), "axbc");
        assert_eq!(snapshot.text(), "abc");
        assert!(snapshot.apply(&TextChange::insert(10, "x")).is_none());
    }

    #[test]
    fn slice_checks_bounds() {
        let snapshot = TextSnapshot::new("héllo");
        assert_eq!(snapshot.slice(0..1), Some("h"));
        assert_eq!(snapshot.slice(1..2), None);
        assert_eq!(snapshot.slice(0..99), None);
    }
}
