//! In-place patching of a projected tree after a source edit.
//!
//! An edit is patched only when it stays inside one embedded file whose text
//! is a verbatim copy of a single source range. Anything else asks for a
//! full rebuild. The tree is left untouched unless the patch succeeds.

use std::ops::Range;

use tracing::trace;

use crate::document::{SourceFile, TextSnapshot};
use crate::mapping::Segment;
use crate::virtual_file::{contain, EmbeddedFile, ProjectionContext, ProjectionDiagnosticKind};

use super::change::{apply_delta, TextChange};

/// Why an edit could not be patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebuildReason {
    /// The change does not fit the old text or does not produce the new one.
    InvalidChange,
    /// The edit is outside every embedded file.
    NoEmbeddedRegion,
    /// The edit touches more than one embedded file.
    MultipleRegions,
    /// The edit crosses an embedded file's boundary.
    StraddlesBoundary,
    /// The touched file is not a plain copy of its source range.
    StructuralTransform,
    /// The owning plugin refused the edit.
    RejectedByPlugin,
    /// The source has unresolved block errors. An unterminated block's
    /// closing tag can appear in any later block, so no edit is local.
    UnresolvedParseErrors,
    /// Incremental updates are turned off.
    IncrementalDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The edit changed nothing.
    Unchanged,
    Patched {
        embedded_id: String,
        length_diff: isize,
    },
    NeedsFullRebuild(RebuildReason),
}

enum Placement {
    Before,
    After,
    Touched,
}

fn placement(coverage: &Range<usize>, start: usize, end: usize) -> Placement {
    if coverage.end < start {
        Placement::Before
    } else if coverage.start > end {
        Placement::After
    } else {
        Placement::Touched
    }
}

/// Try to apply `change` (which turns `file.snapshot` into `new_snapshot`)
/// to the existing tree.
pub fn reconcile(
    file: &mut SourceFile,
    ctx: &ProjectionContext,
    new_snapshot: &TextSnapshot,
    change: &TextChange,
) -> ReconcileOutcome {
    use ReconcileOutcome::NeedsFullRebuild;

    let old_text = file.snapshot.text();
    let length_diff = change.length_diff();
    let produces_new_text = change.is_valid_for(old_text)
        && apply_delta(old_text.len(), length_diff) == new_snapshot.len()
        && new_snapshot.slice(change.start..change.start + change.new_text.len())
            == Some(change.new_text.as_str());
    if !produces_new_text {
        return NeedsFullRebuild(RebuildReason::InvalidChange);
    }
    if change.start == change.end && change.new_text.is_empty() {
        return ReconcileOutcome::Unchanged;
    }
    if file
        .diagnostics
        .iter()
        .any(|d| d.kind == ProjectionDiagnosticKind::Parse)
    {
        return NeedsFullRebuild(RebuildReason::UnresolvedParseErrors);
    }

    let (start, end) = (change.start, change.end);
    let mut touched = Vec::new();
    let mut after = Vec::new();
    for embedded in file.root.descendants() {
        let Some(coverage) = embedded.source_map.source_coverage() else {
            continue;
        };
        match placement(&coverage, start, end) {
            Placement::Before => {}
            Placement::After => after.push(embedded.id.clone()),
            Placement::Touched => touched.push((embedded, coverage)),
        }
    }

    let (target, coverage) = match touched.as_slice() {
        [] => return NeedsFullRebuild(RebuildReason::NoEmbeddedRegion),
        [single] => single,
        _ => return NeedsFullRebuild(RebuildReason::MultipleRegions),
    };
    if start < coverage.start || end > coverage.end {
        return NeedsFullRebuild(RebuildReason::StraddlesBoundary);
    }
    if !target.is_pure_reemission() || !target.children.is_empty() {
        return NeedsFullRebuild(RebuildReason::StructuralTransform);
    }

    let Some(mapping) = target.source_map.mappings().first() else {
        return NeedsFullRebuild(RebuildReason::StructuralTransform);
    };
    let local_start = mapping.generated_range.start + (start - mapping.source_range.start);
    let local_end = local_start + (end - start);
    let edit = TextChange::new(local_start..local_end, change.new_text.as_str());
    if !edit.is_valid_for(target.text()) {
        return NeedsFullRebuild(RebuildReason::InvalidChange);
    }
    let patched = edit.apply(target.text());

    if !accepted_by_owner(ctx, target, &patched, local_start..local_start + change.new_text.len()) {
        return NeedsFullRebuild(RebuildReason::RejectedByPlugin);
    }

    // Everything is checked; from here on the tree is mutated.
    let embedded_id = target.id.clone();
    let Some(target) = file.root.find_mut(&embedded_id) else {
        return NeedsFullRebuild(RebuildReason::NoEmbeddedRegion);
    };
    patch_embedded(target, &edit, patched);

    for id in &after {
        if let Some(embedded) = file.root.find_mut(id) {
            shift_source_ranges(embedded, length_diff);
        }
    }

    file.root.snapshot = new_snapshot.clone();
    file.root.record_change(change.range());
    file.snapshot = new_snapshot.clone();

    trace!(
        "Patched '{}' in {} (diff {})",
        embedded_id,
        file.uri,
        length_diff
    );

    ReconcileOutcome::Patched {
        embedded_id,
        length_diff,
    }
}

fn accepted_by_owner(
    ctx: &ProjectionContext,
    target: &EmbeddedFile,
    patched: &str,
    edit: Range<usize>,
) -> bool {
    let Some(plugin) = ctx.plugins.get_by_name(&target.plugin) else {
        return false;
    };
    // A panicking check counts as a rejection.
    contain(plugin.name(), || Ok(plugin.accepts_edit(target, patched, edit))).unwrap_or(false)
}

/// Splice the edit into a pure re-emission and stretch its only mapping.
fn patch_embedded(target: &mut EmbeddedFile, edit: &TextChange, patched: String) {
    let diff = edit.length_diff();
    if let Some(mapping) = target.source_map.mappings_mut().first_mut() {
        mapping.source_range.end = apply_delta(mapping.source_range.end, diff);
        mapping.generated_range.end = apply_delta(mapping.generated_range.end, diff);
    }
    if let Some(Segment::Mapped { text, .. }) = target.segments.first_mut() {
        text.clone_from(&patched);
    }
    target.snapshot = TextSnapshot::new(patched);
    target.record_change(edit.range());
}

/// Move every source range of a file lying after the edit.
fn shift_source_ranges(embedded: &mut EmbeddedFile, diff: isize) {
    for mapping in embedded.source_map.mappings_mut() {
        mapping.source_range =
            apply_delta(mapping.source_range.start, diff)..apply_delta(mapping.source_range.end, diff);
        for range in &mut mapping.additional_source_ranges {
            *range = apply_delta(range.start, diff)..apply_delta(range.end, diff);
        }
    }
    for segment in &mut embedded.segments {
        match segment {
            Segment::Mapped { source_offset, .. } => {
                *source_offset = apply_delta(*source_offset, diff);
            }
            Segment::Transformed { source_range, .. } => {
                *source_range =
                    apply_delta(source_range.start, diff)..apply_delta(source_range.end, diff);
            }
            Segment::Literal(_) => {}
        }
    }
}
