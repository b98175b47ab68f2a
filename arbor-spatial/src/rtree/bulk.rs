//! Bulk loading: partition-based scratch builds, seeded-clustering bulk
//! insertion and the rebuild-vs-clustered decision.

use arbor::NodeId;
use std::cmp::Ordering;

use super::{
    ChildKind, NodeWithEnvelope, RTreeIndex, DEFAULT_LOADING_FACTOR, RTREE_CHILD, RTREE_REFERENCE,
};
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};

impl RTreeIndex {
    /// Indexes a batch of geometry records.
    ///
    /// A batch larger than 40% of the current tree is handled by rebuilding
    /// the whole tree from scratch; smaller batches are routed into the
    /// existing structure by seeded clustering, with entries no subtree
    /// contains inserted one by one at the top.
    pub fn add_all(&self, geometries: &[NodeId]) -> SpatialResult<()> {
        self.add_all_with_loading_factor(geometries, DEFAULT_LOADING_FACTOR)
    }

    /// [`Self::add_all`] with an explicit loading factor.
    ///
    /// # Errors
    /// `InvalidArgument` unless `0.0 < loading_factor <= 1.0`.
    pub fn add_all_with_loading_factor(
        &self,
        geometries: &[NodeId],
        loading_factor: f64,
    ) -> SpatialResult<()> {
        if !(loading_factor > 0.0 && loading_factor <= 1.0) {
            return Err(SpatialError::InvalidArgument(format!(
                "loading factor must be in (0, 1], got {}",
                loading_factor
            )));
        }

        let tx = self.store.begin_tx()?;
        if geometries.len() as f64 > self.cached_count() as f64 * 0.4 {
            self.monitor().add_nbr_rebuilt();
            log::debug!(
                "batch of {} exceeds 40% of {} indexed records, rebuilding",
                geometries.len(),
                self.cached_count()
            );
            self.rebuild_with(geometries, loading_factor)?;
        } else {
            let root = self.index_root()?;
            let root_height = self.node_height(root, 0)?;
            let entries = self.decode_envelopes(geometries)?;
            let outliers = self.bulk_insertion(root, root_height, entries, loading_factor)?;

            self.mark_count_unsaved();
            self.count_increment((geometries.len() - outliers.len()) as u64);
            for outlier in outliers {
                self.add(outlier.node)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Tears the tree down to its root and rebuilds it over the union of
    /// the currently indexed records and the new batch.
    fn rebuild_with(&self, geometries: &[NodeId], loading_factor: f64) -> SpatialResult<()> {
        let root = self.index_root()?;

        let mut nodes_to_add: Vec<NodeId> = self
            .get_all_indexed_nodes()?
            .collect::<SpatialResult<Vec<_>>>()?;
        nodes_to_add.extend_from_slice(geometries);

        let internal: Vec<NodeId> = self
            .get_all_index_internal_nodes()?
            .collect::<SpatialResult<Vec<_>>>()?;
        for node in internal {
            if node != root {
                self.delete_node_with_edges(node)?;
            }
        }
        // a root that was itself a leaf keeps its references; detach them so
        // the rebuild does not index them twice
        for edge in self.store.outgoing(root, RTREE_REFERENCE)? {
            self.store.delete_edge(edge.id)?;
        }

        let entries = self.decode_envelopes(&nodes_to_add)?;
        self.build_rtree_from_scratch(root, entries, loading_factor)?;
        self.mark_count_unsaved();
        self.count_reset(nodes_to_add.len() as u64);
        Ok(())
    }

    /// Builds a subtree over `entries` under the (empty) `root` node, using
    /// overlap-minimizing top-down partitioning.
    pub(crate) fn build_rtree_from_scratch(
        &self,
        root: NodeId,
        entries: Vec<NodeWithEnvelope>,
        loading_factor: f64,
    ) -> SpatialResult<()> {
        self.partition(root, entries, 0, loading_factor)?;
        Ok(())
    }

    /// Sorts entries along alternating axes and recursively slices them into
    /// near-equal contiguous runs until a run fits a single node. Returns
    /// whether the box of `root` had to grow.
    fn partition(
        &self,
        root: NodeId,
        mut entries: Vec<NodeWithEnvelope>,
        depth: usize,
        loading_factor: f64,
    ) -> SpatialResult<bool> {
        if depth % 2 == 0 {
            entries.sort_by(|a, b| compare_f64(a.envelope.min_x, b.envelope.min_x));
        } else {
            entries.sort_by(|a, b| compare_f64(a.envelope.min_y, b.envelope.min_y));
        }

        let target_loading =
            ((self.max_node_references as f64 * loading_factor).round() as usize).max(1);
        let entry_count = entries.len();

        let mut expand_root = false;
        if entry_count <= target_loading {
            for entry in &entries {
                expand_root |= self.insert_in_leaf(root, entry.node)?;
            }
            if expand_root {
                self.adjust_path_bounding_box(root)?;
            }
        } else {
            self.monitor().add_split();
            // a base of at least two keeps the recursion shrinking even for
            // tiny node capacities
            let base = target_loading.max(2) as f64;
            let height = ((entry_count as f64).ln() / base.ln()).ceil() as i32;
            let subtree_size = base.powi(height - 1).round() as usize;
            // at least two slices, so the recursion always shrinks
            let partitions = entry_count.div_ceil(subtree_size).max(2);

            for slice in partition_list(entries, partitions) {
                let new_index_node = self.store.create_node()?;
                expand_root |= self.partition(new_index_node, slice, depth + 1, loading_factor)?;
                expand_root |= self.insert_index_node_on_parent(root, new_index_node)?;
            }
        }
        Ok(expand_root)
    }

    /// Height a scratch tree of `size` entries is expected to have when
    /// nodes are filled to the loading factor. Leaf level counts as one.
    pub(crate) fn expected_height(&self, loading_factor: f64, size: usize) -> usize {
        if size == 1 {
            1
        } else {
            let target_loading = (self.max_node_references as f64 * loading_factor)
                .floor()
                .max(2.0);
            ((size as f64).ln() / target_loading.ln()).ceil() as usize
        }
    }

    /// Seeded-clustering bulk insertion.
    ///
    /// Entries are routed into the smallest existing child envelope that
    /// contains them (hence the area-ascending sort); the rest are returned
    /// as outliers for one-by-one insertion at the top. Each cluster is then
    /// merged according to how its expected height compares with the level
    /// below the child it was routed to.
    fn bulk_insertion(
        &self,
        root: NodeId,
        root_height: usize,
        entries: Vec<NodeWithEnvelope>,
        loading_factor: f64,
    ) -> SpatialResult<Vec<NodeWithEnvelope>> {
        let children = self.index_children(root)?;
        if children.is_empty() {
            return Ok(entries);
        }

        let mut decorated: Vec<(NodeId, Envelope)> = Vec::with_capacity(children.len());
        for child in children {
            decorated.push((child, self.child_envelope(child, ChildKind::Subtree)?));
        }
        decorated.sort_by(|a, b| compare_f64(a.1.area(), b.1.area()));

        let mut clusters: Vec<Vec<NodeWithEnvelope>> =
            (0..decorated.len()).map(|_| Vec::new()).collect();
        let mut outliers: Vec<NodeWithEnvelope> = Vec::with_capacity(entries.len() / 10);
        for entry in entries {
            match decorated
                .iter()
                .position(|(_, envelope)| envelope.contains(&entry.envelope))
            {
                Some(i) => clusters[i].push(entry),
                None => outliers.push(entry),
            }
        }

        // level of the subtrees hanging below each child
        let subtree_height = root_height as i64 - 2;
        for ((child, _), cluster) in decorated.iter().zip(clusters.into_iter()) {
            if cluster.is_empty() {
                continue;
            }
            let expected = self.expected_height(loading_factor, cluster.len()) as i64;
            if expected - subtree_height > 1 {
                return Err(SpatialError::InvariantViolated(format!(
                    "cluster of expected height {} cannot merge into a subtree of height {}",
                    expected, subtree_height
                )));
            }

            if expected < subtree_height {
                self.monitor().add_case("h_i < l_t ");
                outliers.extend(self.bulk_insertion(
                    *child,
                    root_height - 1,
                    cluster,
                    loading_factor,
                )?);
            } else if expected == subtree_height {
                if (cluster.len() as f64)
                    < self.max_node_references as f64 * loading_factor / 2.0
                {
                    self.monitor().add_case("h_i == l_t && small cluster");
                    // insert below the parent rather than the child; the
                    // additions may split, and this placement limits overlap
                    for entry in cluster {
                        self.add_below(root, entry.node)?;
                    }
                } else {
                    self.monitor().add_case("h_i == l_t && big cluster");
                    let scratch_root = self.store.create_node()?;
                    self.build_rtree_from_scratch(scratch_root, cluster, loading_factor)?;
                    self.insert_index_node_on_parent(*child, scratch_root)?;
                }
            } else {
                let scratch_root = self.store.create_node()?;
                self.build_rtree_from_scratch(scratch_root, cluster, loading_factor)?;
                let scratch_height = self.node_height(scratch_root, 0)? as i64;
                if scratch_height == 1 {
                    self.monitor().add_case("h_i > l_t (d==1)");
                    for edge in self.store.outgoing(scratch_root, RTREE_REFERENCE)? {
                        self.add_below(*child, edge.end)?;
                        self.store.delete_edge(edge.id)?;
                    }
                } else {
                    self.monitor().add_case("h_i > l_t (d>1)");
                    let graft_depth = (scratch_height - subtree_height) as usize;
                    for grafted in self.index_children_at_depth(scratch_root, graft_depth)? {
                        if let Some(edge) = self.store.single_incoming(grafted, RTREE_CHILD)? {
                            self.store.delete_edge(edge.id)?;
                        }
                        self.insert_index_node_on_parent(*child, grafted)?;
                    }
                }
                // the scratch skeleton has served its purpose
                self.delete_recursively_subtree(scratch_root, None)?;
            }
        }
        Ok(outliers)
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Splits `entries` into `partitions` contiguous, near-equal runs.
fn partition_list(
    entries: Vec<NodeWithEnvelope>,
    partitions: usize,
) -> Vec<Vec<NodeWithEnvelope>> {
    let count = entries.len();
    let mut size = count / partitions;
    if count % partitions > 0 {
        size += 1;
    }

    let mut result = Vec::with_capacity(partitions);
    let mut iter = entries.into_iter();
    loop {
        let chunk: Vec<NodeWithEnvelope> = iter.by_ref().take(size).collect();
        if chunk.is_empty() {
            break;
        }
        result.push(chunk);
    }
    result
}
