//! Alias links between two ranges of the same generated document.
//!
//! A teleport is stored as a [`Mapping`] whose `source_range` is the *origin*
//! (e.g. a name inside a generated helper) and whose `generated_range` is the
//! *target* (e.g. the declaration the helper refers to). Both ranges live in
//! generated coordinates.

use std::ops::Range;

use super::capabilities::{Capabilities, Direction, Feature};
use super::table::{Mapping, SourceMap};

/// Independent capability bags for each traversal direction of a teleport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TeleportCapabilities {
    /// Used when jumping from the target back to the origin.
    pub to_source: Capabilities,
    /// Used when jumping from the origin to the target.
    pub to_target: Capabilities,
}

impl TeleportCapabilities {
    pub fn symmetric(caps: Capabilities) -> Self {
        Self {
            to_source: caps,
            to_target: caps,
        }
    }
}

pub type TeleportMapping = Mapping<TeleportCapabilities>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeleportMap {
    map: SourceMap<TeleportCapabilities>,
}

impl TeleportMap {
    pub fn new(links: Vec<TeleportMapping>) -> Self {
        Self {
            map: SourceMap::new(links),
        }
    }

    pub fn links(&self) -> &[TeleportMapping] {
        self.map.mappings()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Ranges linked to `range` that `feature` may reach, in both directions.
    ///
    /// Origin -> target hops consult `to_target`; target -> origin hops
    /// consult `to_source`. The direction argument is the router's overall
    /// direction and is passed through to [`Capabilities::permits`].
    pub fn linked_ranges(
        &self,
        range: Range<usize>,
        feature: Feature,
        direction: Direction,
    ) -> impl Iterator<Item = Range<usize>> + '_ {
        let forward = self
            .map
            .to_generated_ranges(range.clone(), move |d| d.to_target.permits(feature, direction))
            .map(|(r, _)| r);
        let backward = self
            .map
            .to_source_ranges(range, move |d| d.to_source.permits(feature, direction))
            .map(|(r, _)| r);
        forward.chain(backward)
    }
}
