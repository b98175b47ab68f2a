//! Point deletion with empty-node compaction, and the mass operations
//! `remove_all` and `clear`.

use arbor::{EdgeId, NodeId};

use super::search::SpatialIndexVisitor;
use super::{ChildKind, RTreeIndex, RTREE_CHILD, RTREE_METADATA, RTREE_REFERENCE, RTREE_ROOT};
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::monitor::Listener;

impl RTreeIndex {
    /// Removes a geometry record from the index, failing if it is missing
    /// or indexed elsewhere. With `delete_record` the record itself is
    /// deleted from the store as well.
    pub fn remove(&self, geometry: NodeId, delete_record: bool) -> SpatialResult<()> {
        self.remove_with_options(geometry, delete_record, true)
    }

    /// [`Self::remove`] with an explicit strictness policy: when `strict` is
    /// false, a missing record or a record indexed in a different tree is
    /// ignored silently.
    pub fn remove_with_options(
        &self,
        geometry: NodeId,
        delete_record: bool,
        strict: bool,
    ) -> SpatialResult<()> {
        let tx = self.store.begin_tx()?;

        if !self.store.node_exists(geometry)? {
            if strict {
                return Err(SpatialError::NotFound(geometry));
            }
            tx.commit()?;
            return Ok(());
        }

        let leaf = match self.find_leaf_containing(geometry, strict)? {
            Some(leaf) => leaf,
            None => {
                tx.commit()?;
                return Ok(());
            }
        };

        if let Some(edge) = self.store.single_incoming(geometry, RTREE_REFERENCE)? {
            self.store.delete_edge(edge.id)?;
        }
        if delete_record {
            self.delete_node_with_edges(geometry)?;
        }

        // reorganize the tree if needed
        let mut index_node = leaf;
        if self.count_children(index_node, ChildKind::Reference)? == 0 {
            index_node = self.delete_empty_tree_nodes(index_node, ChildKind::Reference)?;
            self.adjust_parent_bounding_box(index_node, ChildKind::Subtree)?;
        } else {
            self.adjust_parent_bounding_box(index_node, ChildKind::Reference)?;
        }
        self.adjust_path_bounding_box(index_node)?;

        self.mark_count_unsaved();
        self.count_decrement();
        tx.commit()?;
        Ok(())
    }

    /// Resolves the leaf referencing the geometry, verifying the leaf
    /// belongs to this tree by climbing to its root. Under the non-strict
    /// policy both failures yield `None` instead of an error.
    pub(crate) fn find_leaf_containing(
        &self,
        geometry: NodeId,
        strict: bool,
    ) -> SpatialResult<Option<NodeId>> {
        let leaf = match self.store.single_incoming(geometry, RTREE_REFERENCE)? {
            Some(edge) => edge.start,
            None => {
                return if strict {
                    Err(SpatialError::NotIndexedHere(geometry))
                } else {
                    Ok(None)
                }
            }
        };

        let mut tree_root = leaf;
        while let Some(parent) = self.index_node_parent(tree_root)? {
            tree_root = parent;
        }
        if tree_root != self.index_root()? {
            if strict {
                Err(SpatialError::NotIndexedHere(geometry))
            } else {
                Ok(None)
            }
        } else {
            Ok(Some(leaf))
        }
    }

    /// Deletes emptied nodes bottom-up. The first level is checked against
    /// the given child kind, ancestors against subtrees. Returns the first
    /// surviving ancestor; the tree root always survives.
    fn delete_empty_tree_nodes(&self, node: NodeId, kind: ChildKind) -> SpatialResult<NodeId> {
        if self.count_children(node, kind)? > 0 {
            return Ok(node);
        }
        match self.index_node_parent(node)? {
            Some(parent) => {
                if let Some(edge) = self.store.single_incoming(node, RTREE_CHILD)? {
                    self.store.delete_edge(edge.id)?;
                }
                self.store.delete_node(node)?;
                self.delete_empty_tree_nodes(parent, ChildKind::Subtree)
            }
            None => Ok(node),
        }
    }

    /// Deletes a node together with every edge still attached to it.
    pub(crate) fn delete_node_with_edges(&self, node: NodeId) -> SpatialResult<()> {
        for edge in self.store.all_edges(node)? {
            self.store.delete_edge(edge.id)?;
        }
        Ok(self.store.delete_node(node)?)
    }

    /// Deletes an index subtree, the incoming edge that anchored it and any
    /// stray edges encountered on the way.
    pub(crate) fn delete_recursively_subtree(
        &self,
        node: NodeId,
        incoming: Option<EdgeId>,
    ) -> SpatialResult<()> {
        for edge in self.store.outgoing(node, RTREE_CHILD)? {
            self.delete_recursively_subtree(edge.end, Some(edge.id))?;
        }
        if let Some(edge) = incoming {
            self.store.delete_edge(edge)?;
        }
        for edge in self.store.all_edges(node)? {
            log::warn!("unexpected {} edge found on index node {}", edge.edge_type, node);
            self.store.delete_edge(edge.id)?;
        }
        Ok(self.store.delete_node(node)?)
    }

    /// Unindexes every geometry (optionally deleting the records), then
    /// deletes the index tree, the metadata node and the root anchor edge.
    /// Reference removal runs in one transaction per leaf; the teardown of
    /// the skeleton is a single transaction.
    pub fn remove_all(
        &self,
        delete_records: bool,
        listener: &dyn Listener,
    ) -> SpatialResult<()> {
        let index_root = self.index_root()?;

        listener.begin(self.count()?);
        let mut remover = ReferenceRemover {
            index: self,
            delete_records,
            listener,
        };
        let result = self.visit_in_tx(&mut remover, index_root);
        listener.done();
        result?;

        let tx = self.store.begin_tx()?;
        if let Some(edge) = self.store.single_incoming(index_root, RTREE_ROOT)? {
            self.store.delete_edge(edge.id)?;
        }
        self.delete_recursively_subtree(index_root, None)?;
        if let Some(edge) = self.store.single_outgoing(self.layer_node, RTREE_METADATA)? {
            let metadata_node = edge.end;
            self.store.delete_edge(edge.id)?;
            self.store.delete_node(metadata_node)?;
        }
        tx.commit()?;

        self.mark_count_unsaved();
        self.count_reset(0);
        Ok(())
    }

    /// Empties the index and re-creates a fresh root and metadata, leaving
    /// the geometry records untouched. The whole operation runs inside one
    /// outer transaction.
    pub fn clear(&self, listener: &dyn Listener) -> SpatialResult<()> {
        let tx = self.store.begin_tx()?;
        self.remove_all(false, listener)?;
        self.reinitialize()?;
        tx.commit()?;
        Ok(())
    }
}

/// Visitor deleting every reference it sees, reporting progress.
struct ReferenceRemover<'a> {
    index: &'a RTreeIndex,
    delete_records: bool,
    listener: &'a dyn Listener,
}

impl SpatialIndexVisitor for ReferenceRemover<'_> {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, geometry: NodeId) -> SpatialResult<()> {
        if let Some(edge) = self
            .index
            .store()
            .single_incoming(geometry, RTREE_REFERENCE)?
        {
            self.index.store().delete_edge(edge.id)?;
        }
        if self.delete_records {
            self.index.delete_node_with_edges(geometry)?;
        }
        self.listener.worked(1);
        Ok(())
    }
}
