use arbor::NodeId;
use std::sync::Arc;

use crate::decoder::EnvelopeDecoder;
use crate::envelope::Envelope;
use crate::error::SpatialResult;

/// Predicate pair driving a pruned search traversal.
///
/// `needs_to_visit` is called on index node envelopes to decide whether a
/// subtree can contain matches; `geometry_matches` is called on the leaf
/// references of visited leaves to produce the final result set.
pub trait SearchFilter {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool;

    fn geometry_matches(&self, geometry: NodeId) -> SpatialResult<bool>;
}

/// Matches every geometry; visits the whole tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchAll;

impl SearchFilter for SearchAll {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn geometry_matches(&self, _geometry: NodeId) -> SpatialResult<bool> {
        Ok(true)
    }
}

/// Matches geometries whose envelope intersects the query envelope.
pub struct SearchIntersects {
    decoder: Arc<dyn EnvelopeDecoder>,
    query: Envelope,
}

impl SearchIntersects {
    pub fn new(decoder: Arc<dyn EnvelopeDecoder>, query: Envelope) -> Self {
        SearchIntersects { decoder, query }
    }
}

impl SearchFilter for SearchIntersects {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        envelope.intersects(&self.query)
    }

    fn geometry_matches(&self, geometry: NodeId) -> SpatialResult<bool> {
        Ok(self.decoder.decode_envelope(geometry)?.intersects(&self.query))
    }
}

/// Matches geometries whose envelope lies entirely inside the query envelope.
pub struct SearchCoveredBy {
    decoder: Arc<dyn EnvelopeDecoder>,
    query: Envelope,
}

impl SearchCoveredBy {
    pub fn new(decoder: Arc<dyn EnvelopeDecoder>, query: Envelope) -> Self {
        SearchCoveredBy { decoder, query }
    }
}

impl SearchFilter for SearchCoveredBy {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        // a covered geometry can sit in a subtree that only partially
        // overlaps the query window
        envelope.intersects(&self.query)
    }

    fn geometry_matches(&self, geometry: NodeId) -> SpatialResult<bool> {
        Ok(self.query.contains(&self.decoder.decode_envelope(geometry)?))
    }
}

/// Matches geometries whose envelope contains the query point.
pub struct SearchContainsPoint {
    decoder: Arc<dyn EnvelopeDecoder>,
    x: f64,
    y: f64,
}

impl SearchContainsPoint {
    pub fn new(decoder: Arc<dyn EnvelopeDecoder>, x: f64, y: f64) -> Self {
        SearchContainsPoint { decoder, x, y }
    }
}

impl SearchFilter for SearchContainsPoint {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        envelope.contains_point(self.x, self.y)
    }

    fn geometry_matches(&self, geometry: NodeId) -> SpatialResult<bool> {
        Ok(self
            .decoder
            .decode_envelope(geometry)?
            .contains_point(self.x, self.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDecoder(Envelope);

    impl EnvelopeDecoder for FixedDecoder {
        fn decode_envelope(&self, _geometry: NodeId) -> SpatialResult<Envelope> {
            Ok(self.0)
        }
    }

    #[test]
    fn search_all_matches_everything() {
        let filter = SearchAll;
        assert!(filter.needs_to_visit(&Envelope::new(0.0, 0.0, 1.0, 1.0)));
        assert!(filter.geometry_matches(NodeId(1)).unwrap());
    }

    #[test]
    fn intersects_prunes_disjoint_subtrees() {
        let decoder = Arc::new(FixedDecoder(Envelope::new(0.0, 0.0, 1.0, 1.0)));
        let filter = SearchIntersects::new(decoder, Envelope::new(0.5, 0.5, 2.0, 2.0));

        assert!(filter.needs_to_visit(&Envelope::new(0.0, 0.0, 1.0, 1.0)));
        assert!(!filter.needs_to_visit(&Envelope::new(3.0, 3.0, 4.0, 4.0)));
        assert!(filter.geometry_matches(NodeId(1)).unwrap());
    }

    #[test]
    fn covered_by_requires_full_containment() {
        let decoder = Arc::new(FixedDecoder(Envelope::new(0.0, 0.0, 1.0, 1.0)));
        let covering = SearchCoveredBy::new(decoder.clone(), Envelope::new(-1.0, -1.0, 2.0, 2.0));
        let partial = SearchCoveredBy::new(decoder, Envelope::new(0.5, 0.5, 2.0, 2.0));

        assert!(covering.geometry_matches(NodeId(1)).unwrap());
        assert!(!partial.geometry_matches(NodeId(1)).unwrap());
        // still needs to visit partially overlapping subtrees
        assert!(partial.needs_to_visit(&Envelope::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn contains_point_is_inclusive() {
        let decoder = Arc::new(FixedDecoder(Envelope::new(0.0, 0.0, 1.0, 1.0)));
        let filter = SearchContainsPoint::new(decoder, 1.0, 1.0);
        assert!(filter.geometry_matches(NodeId(1)).unwrap());
        assert!(filter.needs_to_visit(&Envelope::new(0.0, 0.0, 2.0, 2.0)));
        assert!(!filter.needs_to_visit(&Envelope::new(2.0, 2.0, 3.0, 3.0)));
    }
}
