//! Quadratic and Greene's split strategies over a node's children.

use arbor::NodeId;
use std::cmp::Ordering;

use super::{ChildKind, NodeWithEnvelope, RTreeIndex, INDEX_PROP_BBOX};
use crate::error::{SpatialError, SpatialResult};

impl RTreeIndex {
    pub(crate) fn quadratic_split(&self, node: NodeId) -> SpatialResult<NodeId> {
        let kind = self.split_kind(node)?;
        self.quadratic_split_of(node, kind)
    }

    pub(crate) fn greenes_split(&self, node: NodeId) -> SpatialResult<NodeId> {
        let kind = self.split_kind(node)?;
        self.greenes_split_of(node, kind)
    }

    fn split_kind(&self, node: NodeId) -> SpatialResult<ChildKind> {
        if self.node_is_leaf(node)? {
            Ok(ChildKind::Reference)
        } else {
            Ok(ChildKind::Subtree)
        }
    }

    /// Detaches all children of the given kind, decorated with their
    /// envelopes. The node is left bare; the caller redistributes.
    fn detach_entries(
        &self,
        node: NodeId,
        kind: ChildKind,
    ) -> SpatialResult<Vec<NodeWithEnvelope>> {
        let edges = self.store.outgoing(node, kind.edge_type())?;
        let mut entries = Vec::with_capacity(edges.len());
        for edge in edges {
            entries.push(NodeWithEnvelope {
                node: edge.end,
                envelope: self.child_envelope(edge.end, kind)?,
            });
            self.store.delete_edge(edge.id)?;
        }
        if entries.len() < 2 {
            return Err(SpatialError::InvariantViolated(format!(
                "cannot split index node {} with {} entries",
                node,
                entries.len()
            )));
        }
        Ok(entries)
    }

    /// The seed pair with maximal dead space between their envelopes;
    /// first encountered wins ties.
    fn most_distant_by_dead_space(entries: &[NodeWithEnvelope]) -> (usize, usize) {
        let mut seeds = (0, 1);
        let mut worst = f64::NEG_INFINITY;
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let dead_space = entries[i].envelope.separation(&entries[j].envelope);
                if dead_space > worst {
                    worst = dead_space;
                    seeds = (i, j);
                }
            }
        }
        seeds
    }

    /// Guttman's quadratic redistribution: seed the two groups with the most
    /// distant pair, then repeatedly place the entry whose best group needs
    /// the smallest area enlargement. Equal enlargements go to the group
    /// with the smaller current area.
    fn quadratic_split_of(&self, node: NodeId, kind: ChildKind) -> SpatialResult<NodeId> {
        let mut entries = self.detach_entries(node, kind)?;
        let (seed1, seed2) = Self::most_distant_by_dead_space(&entries);

        // remove the higher index first so the lower one stays valid
        let second = entries.remove(seed2);
        let first = entries.remove(seed1);

        let mut group1 = vec![first.node];
        let mut group1_envelope = first.envelope;
        let mut group2 = vec![second.node];
        let mut group2_envelope = second.envelope;

        while !entries.is_empty() {
            let mut best: Option<(usize, bool)> = None;
            let mut expansion_min = f64::INFINITY;
            for (i, entry) in entries.iter().enumerate() {
                let expansion1 =
                    group1_envelope.union(&entry.envelope).area() - group1_envelope.area();
                let expansion2 =
                    group2_envelope.union(&entry.envelope).area() - group2_envelope.area();

                if expansion1 < expansion2 && expansion1 < expansion_min {
                    best = Some((i, true));
                    expansion_min = expansion1;
                } else if expansion2 < expansion1 && expansion2 < expansion_min {
                    best = Some((i, false));
                    expansion_min = expansion2;
                } else if expansion1 == expansion2 && expansion1 < expansion_min {
                    best = Some((i, group1_envelope.area() < group2_envelope.area()));
                    expansion_min = expansion1;
                }
            }

            let (index, into_group1) = best.ok_or_else(|| {
                SpatialError::InvariantViolated(
                    "split could not place the remaining entries".to_string(),
                )
            })?;
            let entry = entries.remove(index);
            if into_group1 {
                group1.push(entry.node);
                group1_envelope.expand_to_include(&entry.envelope);
            } else {
                group2.push(entry.node);
                group2_envelope.expand_to_include(&entry.envelope);
            }
        }

        self.split_into_two_groups(node, &group1, &group2, kind)
    }

    /// Greene's redistribution: split along the dimension separating the
    /// seeds the most (x on ties), sorting by center and cutting the
    /// sequence in half.
    fn greenes_split_of(&self, node: NodeId, kind: ChildKind) -> SpatialResult<NodeId> {
        let mut entries = self.detach_entries(node, kind)?;
        let (seed1, seed2) = Self::most_distant_by_dead_space(&entries);

        let env1 = entries[seed1].envelope;
        let env2 = entries[seed2].envelope;
        let split_dimension = if env1.separation_along(1, &env2) > env1.separation_along(0, &env2) {
            1
        } else {
            0
        };

        entries.sort_by(|a, b| {
            a.envelope
                .centre(split_dimension)
                .partial_cmp(&b.envelope.centre(split_dimension))
                .unwrap_or(Ordering::Equal)
        });

        let split_at = entries.len() / 2;
        let right = entries.split_off(split_at);
        let group1: Vec<NodeId> = entries.iter().map(|entry| entry.node).collect();
        let group2: Vec<NodeId> = right.iter().map(|entry| entry.node).collect();
        self.split_into_two_groups(node, &group1, &group2, kind)
    }

    /// Materializes the two groups: the first re-fills `node` (its box is
    /// rebuilt from scratch), the second fills a brand new sibling, which is
    /// returned for the caller to attach.
    fn split_into_two_groups(
        &self,
        node: NodeId,
        group1: &[NodeId],
        group2: &[NodeId],
        kind: ChildKind,
    ) -> SpatialResult<NodeId> {
        self.store.remove_property(node, INDEX_PROP_BBOX)?;
        for member in group1 {
            self.add_child(node, kind, *member)?;
        }

        let new_node = self.store.create_node()?;
        for member in group2 {
            self.add_child(new_node, kind, *member)?;
        }
        Ok(new_node)
    }
}
