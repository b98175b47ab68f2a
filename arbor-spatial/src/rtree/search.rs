//! Pruned search traversal and lazy enumerations over the index subgraph.

use arbor::NodeId;
use std::collections::VecDeque;

use super::{RTreeIndex, RTREE_CHILD, RTREE_REFERENCE};
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::filter::SearchFilter;

/// Visitor for eager traversals: subtree pruning through `needs_to_visit`,
/// one callback per reference of every visited leaf.
pub trait SpatialIndexVisitor {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool;

    fn on_index_reference(&mut self, geometry: NodeId) -> SpatialResult<()>;
}

/// Visitor that touches everything and does nothing, used to page the tree
/// in.
pub(crate) struct WarmUpVisitor;

impl SpatialIndexVisitor for WarmUpVisitor {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, _geometry: NodeId) -> SpatialResult<()> {
        Ok(())
    }
}

/// Visitor counting references, backing the exact `count()`.
#[derive(Default)]
pub(crate) struct RecordCounter {
    count: u64,
}

impl RecordCounter {
    pub(crate) fn result(&self) -> u64 {
        self.count
    }
}

impl SpatialIndexVisitor for RecordCounter {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, _geometry: NodeId) -> SpatialResult<()> {
        self.count += 1;
        Ok(())
    }
}

impl RTreeIndex {
    /// Eagerly traverses the subtree under `index_node`, pruning through the
    /// visitor and enumerating the references of every visited leaf. The
    /// whole traversal shares one transaction scope.
    pub fn visit(
        &self,
        visitor: &mut dyn SpatialIndexVisitor,
        index_node: NodeId,
    ) -> SpatialResult<()> {
        if let Some(envelope) = self.index_node_envelope(index_node)? {
            if !visitor.needs_to_visit(&envelope) {
                return Ok(());
            }
        }

        let tx = self.store.begin_tx()?;
        let children = self.store.outgoing(index_node, RTREE_CHILD)?;
        if !children.is_empty() {
            for edge in children {
                self.visit(visitor, edge.end)?;
            }
        } else {
            for edge in self.store.outgoing(index_node, RTREE_REFERENCE)? {
                visitor.on_index_reference(edge.end)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Like [`Self::visit`], but opening one transaction scope per leaf, so
    /// long teardowns do not hold a single scope over the whole tree.
    pub(crate) fn visit_in_tx(
        &self,
        visitor: &mut dyn SpatialIndexVisitor,
        index_node: NodeId,
    ) -> SpatialResult<()> {
        if let Some(envelope) = self.index_node_envelope(index_node)? {
            if !visitor.needs_to_visit(&envelope) {
                return Ok(());
            }
        }

        let children = self.index_children(index_node)?;
        if !children.is_empty() {
            for child in children {
                self.visit_in_tx(visitor, child)?;
            }
        } else {
            let tx = self.store.begin_tx()?;
            for edge in self.store.outgoing(index_node, RTREE_REFERENCE)? {
                visitor.on_index_reference(edge.end)?;
            }
            tx.commit()?;
        }
        Ok(())
    }
}

enum Visit {
    Index { node: NodeId, depth: usize },
    Geometry { node: NodeId },
}

/// Lazy, pull-based stream of geometry records matching a search filter.
///
/// The traversal is depth first; index nodes failing `needs_to_visit` prune
/// their whole subtree. Dropping the stream early leaves the remaining
/// subtrees unread. After an error the stream is fused.
pub struct SearchResults<'a> {
    index: &'a RTreeIndex,
    filter: Box<dyn SearchFilter + 'a>,
    stack: Vec<Visit>,
}

impl<'a> SearchResults<'a> {
    pub(crate) fn new(
        index: &'a RTreeIndex,
        filter: Box<dyn SearchFilter + 'a>,
        root: NodeId,
    ) -> Self {
        SearchResults {
            index,
            filter,
            stack: vec![Visit::Index {
                node: root,
                depth: 0,
            }],
        }
    }

    fn expand(&mut self, node: NodeId, depth: usize) -> SpatialResult<()> {
        for edge in self.index.store.outgoing(node, RTREE_CHILD)? {
            self.stack.push(Visit::Index {
                node: edge.end,
                depth: depth + 1,
            });
        }
        for edge in self.index.store.outgoing(node, RTREE_REFERENCE)? {
            self.stack.push(Visit::Geometry { node: edge.end });
        }
        Ok(())
    }

    fn fail(&mut self, error: SpatialError) -> Option<SpatialResult<NodeId>> {
        self.stack.clear();
        Some(Err(error))
    }
}

impl Iterator for SearchResults<'_> {
    type Item = SpatialResult<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(visit) = self.stack.pop() {
            match visit {
                Visit::Index { node, depth } => {
                    // the start node is always expanded; deeper index nodes
                    // are subject to pruning
                    if depth > 0 {
                        let envelope = match self.index.index_node_envelope(node) {
                            Ok(Some(envelope)) => envelope,
                            Ok(None) => {
                                return self.fail(SpatialError::InvariantViolated(format!(
                                    "index node {} has no bounding box",
                                    node
                                )))
                            }
                            Err(error) => return self.fail(error),
                        };
                        let monitor = self.index.monitor();
                        if self.filter.needs_to_visit(&envelope) {
                            monitor.matched_tree_node(depth, node);
                            monitor.add_case("Index Matches");
                        } else {
                            monitor.add_case("Index Does NOT Match");
                            continue;
                        }
                    }
                    if let Err(error) = self.expand(node, depth) {
                        return self.fail(error.into());
                    }
                }
                Visit::Geometry { node } => match self.filter.geometry_matches(node) {
                    Ok(true) => {
                        self.index.monitor().add_case("Geometry Matches");
                        return Some(Ok(node));
                    }
                    Ok(false) => {
                        self.index.monitor().add_case("Geometry Does NOT Match");
                    }
                    Err(error) => return self.fail(error),
                },
            }
        }
        None
    }
}

/// Lazy breadth-first enumeration of index nodes, the tree root included.
pub struct IndexNodeIterator<'a> {
    index: &'a RTreeIndex,
    queue: VecDeque<NodeId>,
}

impl<'a> IndexNodeIterator<'a> {
    pub(crate) fn new(index: &'a RTreeIndex, root: NodeId) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(root);
        IndexNodeIterator { index, queue }
    }
}

impl Iterator for IndexNodeIterator<'_> {
    type Item = SpatialResult<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        match self.index.store.outgoing(node, RTREE_CHILD) {
            Ok(edges) => {
                for edge in edges {
                    self.queue.push_back(edge.end);
                }
                Some(Ok(node))
            }
            Err(error) => {
                self.queue.clear();
                Some(Err(error.into()))
            }
        }
    }
}

/// Lazy enumeration of indexed geometry records: wraps the index-node
/// enumeration and expands each node's references on demand.
pub struct GeometryNodeIterator<'a> {
    index: &'a RTreeIndex,
    inner: IndexNodeIterator<'a>,
    pending: VecDeque<NodeId>,
}

impl<'a> GeometryNodeIterator<'a> {
    pub(crate) fn new(index: &'a RTreeIndex, root: NodeId) -> Self {
        GeometryNodeIterator {
            index,
            inner: IndexNodeIterator::new(index, root),
            pending: VecDeque::new(),
        }
    }
}

impl Iterator for GeometryNodeIterator<'_> {
    type Item = SpatialResult<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(geometry) = self.pending.pop_front() {
                return Some(Ok(geometry));
            }
            match self.inner.next()? {
                Ok(node) => match self.index.store.outgoing(node, RTREE_REFERENCE) {
                    Ok(edges) => self.pending.extend(edges.into_iter().map(|edge| edge.end)),
                    Err(error) => return Some(Err(error.into())),
                },
                Err(error) => return Some(Err(error)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::filter::{SearchAll, SearchContainsPoint, SearchIntersects};
    use crate::monitor::TreeMonitor;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct CaseMonitor {
        cases: Mutex<Vec<String>>,
        matched: Mutex<Vec<(usize, NodeId)>>,
    }

    impl TreeMonitor for CaseMonitor {
        fn add_split(&self) {}

        fn add_nbr_rebuilt(&self) {}

        fn add_case(&self, tag: &str) {
            self.cases.lock().push(tag.to_string());
        }

        fn matched_tree_node(&self, depth: usize, node: NodeId) {
            self.matched.lock().push((depth, node));
        }
    }

    fn collect(results: SearchResults<'_>) -> Vec<NodeId> {
        results.collect::<SpatialResult<Vec<_>>>().unwrap()
    }

    #[test]
    fn search_on_empty_tree_is_empty() {
        let f = fixture();
        assert!(collect(f.index.search_index(SearchAll).unwrap()).is_empty());
    }

    #[test]
    fn search_all_returns_everything() {
        let f = fixture_with_max(4);
        let mut geoms: Vec<NodeId> = (0..10)
            .map(|i| unit_square(&f.store, i as f64, 0.0))
            .collect();
        for geom in &geoms {
            f.index.add(*geom).unwrap();
        }

        let mut found = collect(f.index.search_index(SearchAll).unwrap());
        found.sort();
        geoms.sort();
        assert_eq!(found, geoms);
    }

    #[test]
    fn intersects_query_prunes_and_matches() {
        let f = fixture_with_max(4);
        for i in 0..10 {
            f.index
                .add(unit_square(&f.store, i as f64 * 10.0, 0.0))
                .unwrap();
        }
        let near_origin = unit_square(&f.store, 0.5, 0.5);
        f.index.add(near_origin).unwrap();

        let decoder = f.index.envelope_decoder();
        let query = Envelope::new(0.0, 0.0, 1.2, 1.2);
        let found = collect(
            f.index
                .search_index(SearchIntersects::new(decoder, query))
                .unwrap(),
        );
        assert_eq!(found.len(), 2, "squares at x=0 and x=0.5 intersect");
        assert!(found.contains(&near_origin));
    }

    #[test]
    fn search_is_lazy_and_stoppable() {
        let f = fixture_with_max(4);
        for i in 0..30 {
            f.index.add(unit_square(&f.store, i as f64, 0.0)).unwrap();
        }

        let mut results = f.index.search_index(SearchAll).unwrap();
        let first = results.next().unwrap().unwrap();
        assert!(f.index.is_node_indexed(first).unwrap());
        drop(results);
    }

    #[test]
    fn search_reports_monitor_cases() {
        let f = fixture_with_max(4);
        let monitor = Arc::new(CaseMonitor::default());
        f.index.add_monitor(monitor.clone());

        for i in 0..10 {
            f.index
                .add(unit_square(&f.store, i as f64 * 10.0, 0.0))
                .unwrap();
        }

        let decoder = f.index.envelope_decoder();
        let query = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let found = collect(
            f.index
                .search_index(SearchIntersects::new(decoder, query))
                .unwrap(),
        );
        assert_eq!(found.len(), 1);

        let cases = monitor.cases.lock();
        assert!(cases.iter().any(|tag| tag == "Index Matches"));
        assert!(cases.iter().any(|tag| tag == "Index Does NOT Match"));
        assert!(cases.iter().any(|tag| tag == "Geometry Matches"));
        // matched nodes are reported below the start node
        assert!(monitor.matched.lock().iter().all(|(depth, _)| *depth > 0));
    }

    #[test]
    fn contains_point_query() {
        let f = fixture_with_max(4);
        let geoms: Vec<NodeId> = (0..8)
            .map(|i| unit_square(&f.store, i as f64 * 2.0, 0.0))
            .collect();
        for geom in &geoms {
            f.index.add(*geom).unwrap();
        }

        let decoder = f.index.envelope_decoder();
        let found = collect(
            f.index
                .search_index(SearchContainsPoint::new(decoder, 4.5, 0.5))
                .unwrap(),
        );
        assert_eq!(found, vec![geoms[2]]);
    }

    #[test]
    fn internal_node_enumeration_is_breadth_first() {
        let f = fixture_with_max(4);
        for i in 0..10 {
            f.index.add(unit_square(&f.store, i as f64, 0.0)).unwrap();
        }
        let root = f.index.index_root().unwrap();

        let nodes: Vec<NodeId> = f
            .index
            .get_all_index_internal_nodes()
            .unwrap()
            .collect::<SpatialResult<Vec<_>>>()
            .unwrap();
        assert_eq!(nodes[0], root);
        let expected = 1 + count_descendants(&f, root);
        assert_eq!(nodes.len(), expected);
    }

    fn count_descendants(f: &Fixture, node: NodeId) -> usize {
        let children = f.index.index_children(node).unwrap();
        children.len()
            + children
                .iter()
                .map(|child| count_descendants(f, *child))
                .sum::<usize>()
    }

    #[test]
    fn geometry_enumeration_expands_references_lazily() {
        let f = fixture_with_max(4);
        let mut geoms: Vec<NodeId> = (0..15)
            .map(|i| unit_square(&f.store, (i % 4) as f64, (i / 4) as f64))
            .collect();
        for geom in &geoms {
            f.index.add(*geom).unwrap();
        }

        let mut found: Vec<NodeId> = f
            .index
            .get_all_indexed_nodes()
            .unwrap()
            .collect::<SpatialResult<Vec<_>>>()
            .unwrap();
        found.sort();
        geoms.sort();
        assert_eq!(found, geoms);
    }

    #[test]
    fn warm_up_touches_the_whole_tree() {
        let f = fixture_with_max(4);
        for i in 0..10 {
            f.index.add(unit_square(&f.store, i as f64, 0.0)).unwrap();
        }
        f.index.warm_up().unwrap();
    }

    #[test]
    fn visit_counts_references() {
        let f = fixture_with_max(4);
        for i in 0..9 {
            f.index.add(unit_square(&f.store, i as f64, 0.0)).unwrap();
        }
        let mut counter = RecordCounter::default();
        let root = f.index.index_root().unwrap();
        f.index.visit(&mut counter, root).unwrap();
        assert_eq!(counter.result(), 9);
    }
}
