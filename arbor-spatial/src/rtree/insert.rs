//! Single-record insertion: choose-subtree descent, leaf insert, split
//! cascade and path bounding-box adjustment.

use arbor::{NodeId, PropertyValue};

use super::{ChildKind, RTreeIndex, SplitMode, INDEX_PROP_BBOX, RTREE_ROOT};
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};

impl RTreeIndex {
    /// Indexes a single geometry record.
    pub fn add(&self, geometry: NodeId) -> SpatialResult<()> {
        let tx = self.store.begin_tx()?;
        let root = self.index_root()?;
        self.add_below(root, geometry)?;
        self.mark_count_unsaved();
        self.count_increment(1);
        tx.commit()?;
        Ok(())
    }

    /// Inserts the geometry somewhere below `parent`, splitting and
    /// adjusting bounding boxes as needed.
    pub(crate) fn add_below(&self, mut parent: NodeId, geometry: NodeId) -> SpatialResult<()> {
        while !self.node_is_leaf(parent)? {
            parent = self.choose_subtree(parent, geometry)?;
        }
        if self.count_children(parent, ChildKind::Reference)? >= self.max_node_references {
            self.insert_in_leaf(parent, geometry)?;
            self.split_and_adjust_path_bounding_box(parent)?;
        } else if self.insert_in_leaf(parent, geometry)? {
            // bbox enlargement needed
            self.adjust_path_bounding_box(parent)?;
        }
        Ok(())
    }

    /// Picks the child to descend into: first the smallest-area child whose
    /// box already contains the envelope, otherwise the child needing the
    /// least area enlargement (area breaking ties, first encountered
    /// breaking the rest).
    fn choose_subtree(&self, parent: NodeId, geometry: NodeId) -> SpatialResult<NodeId> {
        let geometry_env = self.geometry_envelope(geometry)?;
        let children = self.index_children(parent)?;

        let mut decorated = Vec::with_capacity(children.len());
        let mut containing = Vec::new();
        for child in children {
            let envelope = self.child_envelope(child, ChildKind::Subtree)?;
            if envelope.contains(&geometry_env) {
                containing.push((child, envelope));
            }
            decorated.push((child, envelope));
        }
        if !containing.is_empty() {
            return Ok(Self::with_smallest_area(&containing));
        }

        let mut minimum_enlargement = f64::INFINITY;
        let mut candidates: Vec<(NodeId, Envelope)> = Vec::new();
        for (child, envelope) in &decorated {
            let enlargement = envelope.union(&geometry_env).area() - envelope.area();
            if enlargement < minimum_enlargement {
                candidates.clear();
                candidates.push((*child, *envelope));
                minimum_enlargement = enlargement;
            } else if enlargement == minimum_enlargement {
                candidates.push((*child, *envelope));
            }
        }
        if candidates.is_empty() {
            return Err(SpatialError::InvariantViolated(format!(
                "no child available under index node {}",
                parent
            )));
        }
        Ok(Self::with_smallest_area(&candidates))
    }

    fn with_smallest_area(candidates: &[(NodeId, Envelope)]) -> NodeId {
        let mut best = &candidates[0];
        for candidate in &candidates[1..] {
            if candidate.1.area() < best.1.area() {
                best = candidate;
            }
        }
        best.0
    }

    /// Attaches the geometry reference. Returns whether the leaf box grew.
    pub(crate) fn insert_in_leaf(&self, leaf: NodeId, geometry: NodeId) -> SpatialResult<bool> {
        self.add_child(leaf, ChildKind::Reference, geometry)
    }

    /// Attaches a child of the given kind and expands the parent's box to
    /// cover it. Returns whether the parent box changed.
    pub(crate) fn add_child(
        &self,
        parent: NodeId,
        kind: ChildKind,
        child: NodeId,
    ) -> SpatialResult<bool> {
        let child_envelope = self.child_envelope(child, kind)?;
        self.store.create_edge(parent, kind.edge_type(), child)?;
        self.expand_parent_bounding_box(parent, &child_envelope.to_array())
    }

    /// Grows the parent's stored box to cover `child_bbox`, writing only on
    /// change. A parent without a box adopts the child's.
    pub(crate) fn expand_parent_bounding_box(
        &self,
        parent: NodeId,
        child_bbox: &[f64; 4],
    ) -> SpatialResult<bool> {
        let current = self.store.get_property(parent, INDEX_PROP_BBOX)?;
        let mut values = match current.as_ref().and_then(|value| value.as_double_array()) {
            Some([min_x, min_y, max_x, max_y]) => [*min_x, *min_y, *max_x, *max_y],
            _ => {
                self.store.set_property(
                    parent,
                    INDEX_PROP_BBOX,
                    PropertyValue::DoubleArray(child_bbox.to_vec()),
                )?;
                return Ok(true);
            }
        };

        let mut changed = set_min(&mut values, child_bbox, 0);
        changed = set_min(&mut values, child_bbox, 1) || changed;
        changed = set_max(&mut values, child_bbox, 2) || changed;
        changed = set_max(&mut values, child_bbox, 3) || changed;
        if changed {
            self.store.set_property(
                parent,
                INDEX_PROP_BBOX,
                PropertyValue::DoubleArray(values.to_vec()),
            )?;
        }
        Ok(changed)
    }

    /// Walks the parent chain re-tightening boxes, stopping at the first
    /// parent whose box is unchanged or at the root. Idempotent.
    pub(crate) fn adjust_path_bounding_box(&self, node: NodeId) -> SpatialResult<()> {
        let mut current = node;
        while let Some(parent) = self.index_node_parent(current)? {
            if !self.adjust_parent_bounding_box(parent, ChildKind::Subtree)? {
                break;
            }
            current = parent;
        }
        Ok(())
    }

    /// Recomputes a node's box as the union of its children of the given
    /// kind. A node left without children loses its box entirely, so an
    /// emptied root reads as an empty tree. Returns whether anything
    /// changed.
    pub(crate) fn adjust_parent_bounding_box(
        &self,
        node: NodeId,
        kind: ChildKind,
    ) -> SpatialResult<bool> {
        let old = self.index_node_envelope(node)?;

        let mut bbox: Option<Envelope> = None;
        for edge in self.store.outgoing(node, kind.edge_type())? {
            let child_envelope = self.child_envelope(edge.end, kind)?;
            match bbox.as_mut() {
                Some(envelope) => envelope.expand_to_include(&child_envelope),
                None => bbox = Some(child_envelope),
            }
        }

        match bbox {
            Some(envelope) => {
                if old.map_or(true, |old| old != envelope) {
                    self.store.set_property(
                        node,
                        INDEX_PROP_BBOX,
                        PropertyValue::DoubleArray(envelope.to_array().to_vec()),
                    )?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                if old.is_some() {
                    self.store.remove_property(node, INDEX_PROP_BBOX)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Attaches an index node as a child of `parent`, keeping the ancestor
    /// boxes consistent. Returns whether the parent box had to grow.
    pub(crate) fn insert_index_node_on_parent(
        &self,
        parent: NodeId,
        child: NodeId,
    ) -> SpatialResult<bool> {
        let num_children = self.count_children(parent, ChildKind::Subtree)?;
        let need_expansion = self.add_child(parent, ChildKind::Subtree, child)?;
        if num_children < self.max_node_references {
            if need_expansion {
                self.adjust_path_bounding_box(parent)?;
            }
        } else {
            self.split_and_adjust_path_bounding_box(parent)?;
        }
        Ok(need_expansion)
    }

    /// Splits an overfull node and propagates the consequences: a split
    /// root grows the tree by one level, otherwise the new sibling joins
    /// the parent, which may overflow and split in turn.
    pub(crate) fn split_and_adjust_path_bounding_box(&self, node: NodeId) -> SpatialResult<()> {
        self.monitor().add_split();
        let new_node = match self.split_mode() {
            SplitMode::Greene => self.greenes_split(node)?,
            SplitMode::Quadratic => self.quadratic_split(node)?,
        };
        match self.index_node_parent(node)? {
            None => self.create_new_root(node, new_node),
            Some(parent) => {
                let bbox = self.child_envelope(node, ChildKind::Subtree)?.to_array();
                self.expand_parent_bounding_box(parent, &bbox)?;
                self.add_child(parent, ChildKind::Subtree, new_node)?;
                if self.count_children(parent, ChildKind::Subtree)? > self.max_node_references {
                    self.split_and_adjust_path_bounding_box(parent)
                } else {
                    self.adjust_path_bounding_box(parent)
                }
            }
        }
    }

    fn create_new_root(&self, old_root: NodeId, split_sibling: NodeId) -> SpatialResult<()> {
        let new_root = self.store.create_node()?;
        self.add_child(new_root, ChildKind::Subtree, old_root)?;
        self.add_child(new_root, ChildKind::Subtree, split_sibling)?;

        if let Some(edge) = self.store.single_outgoing(self.layer_node, RTREE_ROOT)? {
            self.store.delete_edge(edge.id)?;
        }
        self.store.create_edge(self.layer_node, RTREE_ROOT, new_root)?;
        Ok(())
    }
}

fn set_min(parent: &mut [f64; 4], child: &[f64; 4], index: usize) -> bool {
    if parent[index] > child[index] {
        parent[index] = child[index];
        true
    } else {
        false
    }
}

fn set_max(parent: &mut [f64; 4], child: &[f64; 4], index: usize) -> bool {
    if parent[index] < child[index] {
        parent[index] = child[index];
        true
    } else {
        false
    }
}
