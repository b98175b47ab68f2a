//! Read-only navigation over the index subgraph.

use arbor::NodeId;

use super::{ChildKind, NodeWithEnvelope, RTreeIndex, INDEX_PROP_BBOX, RTREE_CHILD, RTREE_ROOT};
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};

impl RTreeIndex {
    /// Follows the layer node's unique `RTREE_ROOT` edge.
    pub(crate) fn index_root(&self) -> SpatialResult<NodeId> {
        match self.store.single_outgoing(self.layer_node, RTREE_ROOT)? {
            Some(edge) => Ok(edge.end),
            None => Err(SpatialError::InvariantViolated(format!(
                "layer node {} has no index root",
                self.layer_node
            ))),
        }
    }

    /// A node without outgoing `RTREE_CHILD` edges is a leaf.
    pub(crate) fn node_is_leaf(&self, node: NodeId) -> SpatialResult<bool> {
        Ok(self.store.outgoing(node, RTREE_CHILD)?.is_empty())
    }

    pub(crate) fn count_children(&self, node: NodeId, kind: ChildKind) -> SpatialResult<usize> {
        Ok(self.store.outgoing(node, kind.edge_type())?.len())
    }

    pub(crate) fn index_children(&self, node: NodeId) -> SpatialResult<Vec<NodeId>> {
        Ok(self
            .store
            .outgoing(node, RTREE_CHILD)?
            .into_iter()
            .map(|edge| edge.end)
            .collect())
    }

    /// All index nodes exactly `depth` levels below `node`.
    pub(crate) fn index_children_at_depth(
        &self,
        node: NodeId,
        depth: usize,
    ) -> SpatialResult<Vec<NodeId>> {
        if depth < 1 {
            return Err(SpatialError::InvalidArgument(
                "depth must be at least one".to_string(),
            ));
        }
        let children = self.index_children(node)?;
        if depth == 1 {
            return Ok(children);
        }
        let mut result = Vec::with_capacity(children.len() * 4);
        for child in children {
            result.extend(self.index_children_at_depth(child, depth - 1)?);
        }
        Ok(result)
    }

    /// The start of the unique incoming `RTREE_CHILD` edge, or `None` for
    /// the tree root.
    pub(crate) fn index_node_parent(&self, node: NodeId) -> SpatialResult<Option<NodeId>> {
        Ok(self
            .store
            .single_incoming(node, RTREE_CHILD)?
            .map(|edge| edge.start))
    }

    /// Number of levels at or below `node`, the leaf level counting as one.
    ///
    /// Relies on the balance invariant: only the first child path is walked.
    pub(crate) fn node_height(&self, node: NodeId, height: usize) -> SpatialResult<usize> {
        let children = self.store.outgoing(node, RTREE_CHILD)?;
        match children.first() {
            Some(edge) => self.node_height(edge.end, height + 1),
            None => Ok(height + 1),
        }
    }

    /// The stored envelope of an index node, or `None` when the `bbox`
    /// property is absent (an empty root, or transiently during a split).
    pub(crate) fn index_node_envelope(&self, node: NodeId) -> SpatialResult<Option<Envelope>> {
        match self.store.get_property(node, INDEX_PROP_BBOX)? {
            Some(value) => {
                let values = value.as_double_array().ok_or_else(|| {
                    SpatialError::InvariantViolated(format!(
                        "index node {} has a non-array {} property",
                        node, INDEX_PROP_BBOX
                    ))
                })?;
                Ok(Some(Envelope::from_array(values)?))
            }
            None => Ok(None),
        }
    }

    /// Envelope of a geometry record, through the caller-supplied decoder.
    pub(crate) fn geometry_envelope(&self, geometry: NodeId) -> SpatialResult<Envelope> {
        self.decoder.decode_envelope(geometry)
    }

    /// Envelope of a child reached through the given edge kind: geometry
    /// records go through the decoder, subtrees read their stored box.
    pub(crate) fn child_envelope(&self, child: NodeId, kind: ChildKind) -> SpatialResult<Envelope> {
        match kind {
            ChildKind::Reference => self.geometry_envelope(child),
            ChildKind::Subtree => self.index_node_envelope(child)?.ok_or_else(|| {
                SpatialError::InvariantViolated(format!(
                    "index node {} has no bounding box",
                    child
                ))
            }),
        }
    }

    pub(crate) fn decode_envelopes(
        &self,
        geometries: &[NodeId],
    ) -> SpatialResult<Vec<NodeWithEnvelope>> {
        geometries
            .iter()
            .map(|geometry| {
                Ok(NodeWithEnvelope {
                    node: *geometry,
                    envelope: self.geometry_envelope(*geometry)?,
                })
            })
            .collect()
    }
}
