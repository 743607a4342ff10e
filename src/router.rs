//! Capability-aware routing of ranges between generated and source text.
//!
//! Every lookup is gated twice: by the capabilities of the mapping it goes
//! through and by the upper bound of the embedded file. A `None` result
//! means the feature has no business at that location.

use std::ops::Range;

use tracing::trace;

use crate::mapping::{Capabilities, Direction, Feature};
use crate::virtual_file::EmbeddedFile;

/// Routes feature requests for one embedded file.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRouter<'a> {
    file: &'a EmbeddedFile,
}

impl<'a> FeatureRouter<'a> {
    pub fn new(file: &'a EmbeddedFile) -> Self {
        Self { file }
    }

    fn permitted(&self, feature: Feature, direction: Direction) -> bool {
        self.file.capabilities.permits(feature, direction)
    }

    /// Map a generated range back to the source.
    ///
    /// Direct mappings are tried first. When none applies, teleport links are
    /// followed once and the linked range is mapped instead.
    ///
    /// Only the outgoing direction is checked. A rename that starts in the
    /// source also needs [`route_to_generated`](Self::route_to_generated) to
    /// bring the position in, so both calls must succeed.
    pub fn route(&self, feature: Feature, generated_range: Range<usize>) -> Option<Range<usize>> {
        if !self.permitted(feature, Direction::ToSource) {
            return None;
        }
        if self.file.is_root() {
            return Some(generated_range);
        }

        let filter = move |caps: &Capabilities| {
            caps.permits(feature, Direction::ToSource)
        };
        if let Some((range, _)) = self
            .file
            .source_map
            .to_source_ranges(generated_range.clone(), filter)
            .next()
        {
            return Some(range);
        }

        let routed = self
            .file
            .teleport
            .linked_ranges(generated_range.clone(), feature, Direction::ToSource)
            .find_map(|linked| {
                self.file
                    .source_map
                    .to_source_ranges(linked, filter)
                    .next()
                    .map(|(range, _)| range)
            });
        if routed.is_none() {
            trace!(
                "No {:?} route from {:?} in '{}'",
                feature,
                generated_range,
                self.file.id
            );
        }
        routed
    }

    /// Map a source range into this file.
    pub fn route_to_generated(
        &self,
        feature: Feature,
        source_range: Range<usize>,
    ) -> Option<Range<usize>> {
        if !self.permitted(feature, Direction::ToGenerated) {
            return None;
        }
        if self.file.is_root() {
            return Some(source_range);
        }
        self.file
            .source_map
            .to_generated_ranges(source_range, move |caps| {
                caps.permits(feature, Direction::ToGenerated)
            })
            .next()
            .map(|(range, _)| range)
    }

    /// Smallest source range covering every mapping that lets `feature`
    /// through. Used for block-level features such as symbols and folding.
    pub fn source_extent(&self, feature: Feature) -> Option<Range<usize>> {
        if !self.permitted(feature, Direction::ToSource) {
            return None;
        }
        if self.file.is_root() {
            return Some(0..self.file.len());
        }
        self.file
            .source_map
            .mappings()
            .iter()
            .filter(|m| m.data.permits(feature, Direction::ToSource))
            .flat_map(|m| m.source_ranges())
            .fold(None, |extent: Option<Range<usize>>, r| {
                Some(match extent {
                    Some(e) => e.start.min(r.start)..e.end.max(r.end),
                    None => r.clone(),
                })
            })
    }

    /// Map the range of an edit back to the source.
    ///
    /// When the whole range does not map, the edit degrades to an insertion
    /// at the mapped position of its end.
    pub fn route_edit(&self, feature: Feature, generated_range: Range<usize>) -> Option<Range<usize>> {
        if let Some(range) = self.route(feature, generated_range.clone()) {
            return Some(range);
        }
        if !self.permitted(feature, Direction::ToSource) {
            return None;
        }
        self.file
            .source_map
            .to_source_offsets(generated_range.end, move |caps| {
                caps.permits(feature, Direction::ToSource)
            })
            .next()
            .map(|(offset, _)| offset..offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{SegmentBuilder, TeleportCapabilities};
    use crate::virtual_file::EmbeddedKind;

    fn file(builder: SegmentBuilder, bound: Capabilities) -> EmbeddedFile {
        EmbeddedFile::from_built(
            "script",
            "typescript",
            EmbeddedKind::Script { setup: false },
            "test",
            builder.finish(),
            bound,
        )
    }

    #[test]
    fn diagnostics_follow_the_mapping_capability() {
        let mut no_diagnostics = Capabilities::all();
        no_diagnostics.diagnostics = false;

        let mut builder = SegmentBuilder::new();
        builder.push_mapped("let a", 100, no_diagnostics);
        builder.push_mapped("let b", 200, Capabilities::all());
        let file = file(builder, Capabilities::all());
        let router = FeatureRouter::new(&file);

        assert_eq!(router.route(Feature::Diagnostics, 0..3), None);
        assert_eq!(router.route(Feature::Diagnostics, 5..8), Some(200..203));
        assert_eq!(router.route(Feature::References, 0..3), Some(100..103));
    }

    #[test]
    fn file_bound_overrides_mappings() {
        let mut bound = Capabilities::all();
        bound.diagnostics = false;

        let mut builder = SegmentBuilder::new();
        builder.push_mapped("p {}", 40, Capabilities::all());
        let file = file(builder, bound);
        let router = FeatureRouter::new(&file);

        assert_eq!(router.route(Feature::Diagnostics, 0..1), None);
        assert_eq!(router.route_to_generated(Feature::Diagnostics, 40..41), None);
        assert_eq!(router.route(Feature::Formatting, 0..1), Some(40..41));
    }

    #[test]
    fn rename_needs_the_right_direction() {
        let mut outgoing_only = Capabilities::none();
        outgoing_only.rename.outgoing = true;

        let mut builder = SegmentBuilder::new();
        builder.push_mapped("count", 10, outgoing_only);
        let file = file(builder, Capabilities::all());
        let router = FeatureRouter::new(&file);

        assert_eq!(router.route_to_generated(Feature::Rename, 10..15), None);
        assert_eq!(router.route(Feature::Rename, 0..5), Some(10..15));
    }

    #[test]
    fn a_full_rename_needs_both_directions() {
        let mut incoming_only = Capabilities::none();
        incoming_only.rename.incoming = true;

        let mut builder = SegmentBuilder::new();
        builder.push_mapped("count", 10, incoming_only);
        let file = file(builder, Capabilities::all());
        let router = FeatureRouter::new(&file);

        let generated = router.route_to_generated(Feature::Rename, 10..15);
        assert_eq!(generated, Some(0..5));
        assert_eq!(router.route(Feature::Rename, 0..5), None);
    }

    #[test]
    fn teleports_are_followed_when_direct_mapping_misses() {
        let mut builder = SegmentBuilder::new();
        let target = builder.push_mapped("count", 30, Capabilities::all());
        builder.push_str("\nexport { ");
        let origin = builder.push_str("count");
        builder.push_str(" }");
        builder.link(
            origin.clone(),
            target,
            TeleportCapabilities::symmetric(Capabilities::navigation()),
        );
        let file = file(builder, Capabilities::all());
        let router = FeatureRouter::new(&file);

        assert_eq!(router.route(Feature::References, origin.clone()), Some(30..35));
        assert_eq!(router.route(Feature::Diagnostics, origin), None);
    }

    #[test]
    fn edits_degrade_to_insertions() {
        let mut builder = SegmentBuilder::new();
        builder.push_str("__ctx.");
        builder.push_mapped("count", 50, Capabilities::all());
        let file = file(builder, Capabilities::all());
        let router = FeatureRouter::new(&file);

        // Replacing `__ctx.` has no source equivalent, but its end does.
        assert_eq!(router.route(Feature::Formatting, 0..6), None);
        assert_eq!(router.route_edit(Feature::Formatting, 0..6), Some(50..50));
        assert_eq!(router.route_edit(Feature::Formatting, 6..11), Some(50..55));
    }

    #[test]
    fn source_extent_skips_gated_mappings() {
        let mut no_folding = Capabilities::all();
        no_folding.folding_range = false;

        let mut builder = SegmentBuilder::new();
        builder.push_mapped("a", 10, Capabilities::all());
        builder.push_str(";");
        builder.push_mapped("b", 20, Capabilities::all());
        builder.push_str(";");
        builder.push_mapped("c", 90, no_folding);
        let file = file(builder, Capabilities::all());
        let router = FeatureRouter::new(&file);

        assert_eq!(router.source_extent(Feature::FoldingRange), Some(10..21));
        assert_eq!(router.source_extent(Feature::Diagnostics), Some(10..91));
        assert_eq!(
            FeatureRouter::new(&self::file(SegmentBuilder::new(), Capabilities::all()))
                .source_extent(Feature::FoldingRange),
            None
        );
    }

    #[test]
    fn root_routes_identically() {
        let root = EmbeddedFile::root("vue", crate::document::TextSnapshot::new("<template/>"));
        let router = FeatureRouter::new(&root);
        assert_eq!(router.route(Feature::Diagnostics, 1..4), Some(1..4));
        assert_eq!(router.route_to_generated(Feature::Rename, 2..3), Some(2..3));
    }
}
