//! Incremental updates of projected trees.
//!
//! `change` holds the text-change algebra shared by snapshots and embedded
//! file histories. `reconcile` decides whether a single source edit can be
//! patched into the existing tree or needs a full re-extraction.

mod change;
mod reconcile;

pub(crate) use change::apply_delta;
pub use change::{
    combine_continuous_changes, combine_multi_line_changes, TextChange, TextChangeRange, TextSpan,
};
pub use reconcile::{reconcile, RebuildReason, ReconcileOutcome};
