//! Persistent R-tree over a graph store.
//!
//! The tree is materialized as a subgraph: a caller-owned layer node anchors
//! the index root through a `RTREE_ROOT` edge and the index metadata through
//! a `RTREE_METADATA` edge. Index nodes own their children through
//! `RTREE_CHILD` edges (internal nodes) or `RTREE_REFERENCE` edges (leaves,
//! pointing at caller-owned geometry records), and carry their bounding box
//! in the `bbox` property. All leaves sit at the same depth and every
//! non-empty node's box is the union of its children's.

mod bulk;
mod insert;
mod remove;
mod search;
mod split;
mod topology;

pub use search::{GeometryNodeIterator, IndexNodeIterator, SearchResults, SpatialIndexVisitor};

use arbor::{EdgeType, GraphStore, NodeId, PropertyValue};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::decoder::EnvelopeDecoder;
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::filter::SearchFilter;
use crate::monitor::{EmptyMonitor, TreeMonitor};
use search::{RecordCounter, WarmUpVisitor};

/// Edge from the layer node to the index root.
pub const RTREE_ROOT: EdgeType = EdgeType::new("RTREE_ROOT");
/// Edge from the layer node to the index metadata node.
pub const RTREE_METADATA: EdgeType = EdgeType::new("RTREE_METADATA");
/// Edge from an internal index node to a child index node.
pub const RTREE_CHILD: EdgeType = EdgeType::new("RTREE_CHILD");
/// Edge from a leaf index node to an indexed geometry record.
pub const RTREE_REFERENCE: EdgeType = EdgeType::new("RTREE_REFERENCE");

/// Index node property holding `[min_x, min_y, max_x, max_y]`.
pub const INDEX_PROP_BBOX: &str = "bbox";
/// Metadata property holding the node capacity.
pub const PROP_MAX_NODE_REFERENCES: &str = "maxNodeReferences";
/// Metadata property holding the lazily persisted geometry count.
pub const PROP_TOTAL_GEOMETRY_COUNT: &str = "totalGeometryCount";

/// Configuration key selecting the split strategy.
pub const KEY_SPLIT: &str = "splitMode";
/// Configuration value for the quadratic split strategy.
pub const QUADRATIC_SPLIT: &str = "quadratic";
/// Configuration value for Greene's split strategy.
pub const GREENES_SPLIT: &str = "greene";

pub const DEFAULT_MAX_NODE_REFERENCES: usize = 100;

pub(crate) const DEFAULT_LOADING_FACTOR: f64 = 0.7;

/// Strategy used to redistribute the children of an overfull node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// Guttman's quadratic split: greedy assignment by minimal area
    /// enlargement.
    #[default]
    Quadratic,
    /// Greene's split: sort along the seed separation dimension, cut in half.
    Greene,
}

/// The kind of children an index node owns: either child subtrees or leaf
/// references to geometry records, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildKind {
    Subtree,
    Reference,
}

impl ChildKind {
    pub(crate) fn edge_type(self) -> EdgeType {
        match self {
            ChildKind::Subtree => RTREE_CHILD,
            ChildKind::Reference => RTREE_REFERENCE,
        }
    }
}

/// An entry decorated with its decoded envelope, used by splitting and bulk
/// loading to avoid re-decoding.
pub(crate) struct NodeWithEnvelope {
    pub(crate) node: NodeId,
    pub(crate) envelope: Envelope,
}

/// A persistent R-tree spatial index over a graph store.
///
/// The index owns the index-node subgraph and the `RTREE_*` edges; geometry
/// records belong to the caller and are only referenced. One writer at a
/// time is assumed; every operation runs inside a scoped store transaction.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use arbor::{GraphStore, MemoryGraphStore, PropertyValue};
/// use arbor_spatial::{Envelope, PropertyEnvelopeDecoder, RTreeIndex, SearchIntersects};
///
/// # fn main() -> arbor_spatial::SpatialResult<()> {
/// let store = GraphStore::new(MemoryGraphStore::new());
/// let layer = store.create_node()?;
/// let decoder = Arc::new(PropertyEnvelopeDecoder::new(store.clone(), "bbox"));
/// let index = RTreeIndex::new(store.clone(), layer, decoder.clone())?;
///
/// let geom = store.create_node()?;
/// store.set_property(geom, "bbox", PropertyValue::DoubleArray(vec![0.0, 0.0, 1.0, 1.0]))?;
/// index.add(geom)?;
///
/// let query = Envelope::new(0.5, 0.5, 2.0, 2.0);
/// let found: Vec<_> = index
///     .search_index(SearchIntersects::new(decoder, query))?
///     .collect::<arbor_spatial::SpatialResult<_>>()?;
/// assert_eq!(found, vec![geom]);
/// # Ok(())
/// # }
/// ```
pub struct RTreeIndex {
    store: GraphStore,
    decoder: Arc<dyn EnvelopeDecoder>,
    layer_node: NodeId,
    metadata_node: RwLock<NodeId>,
    max_node_references: usize,
    split_mode: RwLock<SplitMode>,
    monitor: RwLock<Arc<dyn TreeMonitor>>,
    total_geometry_count: AtomicU64,
    count_saved: AtomicBool,
}

impl RTreeIndex {
    /// Opens (or initializes) the index anchored at `layer_node`, with the
    /// default node capacity of [`DEFAULT_MAX_NODE_REFERENCES`].
    pub fn new(
        store: GraphStore,
        layer_node: NodeId,
        decoder: Arc<dyn EnvelopeDecoder>,
    ) -> SpatialResult<Self> {
        Self::with_max_node_references(store, layer_node, decoder, DEFAULT_MAX_NODE_REFERENCES)
    }

    /// Opens (or initializes) the index with an explicit node capacity.
    ///
    /// A previously persisted capacity on the metadata node takes precedence
    /// over the argument.
    ///
    /// # Errors
    /// `InvalidArgument` if `max_node_references < 1`.
    pub fn with_max_node_references(
        store: GraphStore,
        layer_node: NodeId,
        decoder: Arc<dyn EnvelopeDecoder>,
        max_node_references: usize,
    ) -> SpatialResult<Self> {
        if max_node_references < 1 {
            return Err(SpatialError::InvalidArgument(format!(
                "maxNodeReferences must be at least 1, got {}",
                max_node_references
            )));
        }

        let tx = store.begin_tx()?;
        Self::ensure_index_root(&store, layer_node)?;
        let (metadata_node, max_node_references) =
            Self::ensure_metadata(&store, layer_node, max_node_references)?;
        tx.commit()?;

        let index = RTreeIndex {
            store,
            decoder,
            layer_node,
            metadata_node: RwLock::new(metadata_node),
            max_node_references,
            split_mode: RwLock::new(SplitMode::default()),
            monitor: RwLock::new(Arc::new(EmptyMonitor)),
            total_geometry_count: AtomicU64::new(0),
            count_saved: AtomicBool::new(false),
        };
        index.save_count()?;
        Ok(index)
    }

    fn ensure_index_root(store: &GraphStore, layer_node: NodeId) -> SpatialResult<()> {
        if store.single_outgoing(layer_node, RTREE_ROOT)?.is_none() {
            let root = store.create_node()?;
            store.create_edge(layer_node, RTREE_ROOT, root)?;
        }
        Ok(())
    }

    fn ensure_metadata(
        store: &GraphStore,
        layer_node: NodeId,
        max_node_references: usize,
    ) -> SpatialResult<(NodeId, usize)> {
        match store.single_outgoing(layer_node, RTREE_METADATA)? {
            Some(edge) => {
                let metadata_node = edge.end;
                let stored = store
                    .get_property(metadata_node, PROP_MAX_NODE_REFERENCES)?
                    .and_then(|value| value.as_int())
                    .ok_or_else(|| {
                        SpatialError::InvariantViolated(format!(
                            "metadata node {} is missing {}",
                            metadata_node, PROP_MAX_NODE_REFERENCES
                        ))
                    })?;
                if stored < 1 {
                    return Err(SpatialError::InvariantViolated(format!(
                        "persisted {} is {}",
                        PROP_MAX_NODE_REFERENCES, stored
                    )));
                }
                Ok((metadata_node, stored as usize))
            }
            None => {
                let metadata_node = store.create_node()?;
                store.create_edge(layer_node, RTREE_METADATA, metadata_node)?;
                store.set_property(
                    metadata_node,
                    PROP_MAX_NODE_REFERENCES,
                    PropertyValue::Int(max_node_references as i64),
                )?;
                Ok((metadata_node, max_node_references))
            }
        }
    }

    /// Re-creates the index root and metadata after a [`Self::remove_all`].
    pub(crate) fn reinitialize(&self) -> SpatialResult<()> {
        Self::ensure_index_root(&self.store, self.layer_node)?;
        let (metadata_node, _) =
            Self::ensure_metadata(&self.store, self.layer_node, self.max_node_references)?;
        *self.metadata_node.write() = metadata_node;
        self.save_count()
    }

    /// Applies configuration entries.
    ///
    /// Recognized keys: [`KEY_SPLIT`] with values [`QUADRATIC_SPLIT`] or
    /// [`GREENES_SPLIT`]. Unknown keys and unknown values both fail with
    /// `InvalidArgument`.
    pub fn configure<'a>(
        &self,
        config: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> SpatialResult<()> {
        for (key, value) in config {
            match key {
                KEY_SPLIT => match value {
                    QUADRATIC_SPLIT => *self.split_mode.write() = SplitMode::Quadratic,
                    GREENES_SPLIT => *self.split_mode.write() = SplitMode::Greene,
                    _ => {
                        return Err(SpatialError::InvalidArgument(format!(
                            "no such value for '{}': {}",
                            key, value
                        )))
                    }
                },
                _ => {
                    return Err(SpatialError::InvalidArgument(format!(
                        "unknown configuration key: {}",
                        key
                    )))
                }
            }
        }
        Ok(())
    }

    /// Installs an instrumentation monitor, replacing the current one.
    pub fn add_monitor(&self, monitor: Arc<dyn TreeMonitor>) {
        *self.monitor.write() = monitor;
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn envelope_decoder(&self) -> Arc<dyn EnvelopeDecoder> {
        self.decoder.clone()
    }

    pub fn max_node_references(&self) -> usize {
        self.max_node_references
    }

    pub fn split_mode(&self) -> SplitMode {
        *self.split_mode.read()
    }

    pub(crate) fn monitor(&self) -> Arc<dyn TreeMonitor> {
        self.monitor.read().clone()
    }

    pub(crate) fn metadata_node(&self) -> NodeId {
        *self.metadata_node.read()
    }

    /// The envelope of the index root, or `None` while the tree is empty.
    pub fn get_bounding_box(&self) -> SpatialResult<Option<Envelope>> {
        let tx = self.store.begin_tx()?;
        let result = self.index_node_envelope(self.index_root()?)?;
        tx.commit()?;
        Ok(result)
    }

    /// Exact number of indexed geometries.
    ///
    /// When the cached count is zero the tree is recounted by traversal
    /// before the value is returned; an unsaved count is persisted to the
    /// metadata node.
    pub fn count(&self) -> SpatialResult<u64> {
        self.save_count()?;
        Ok(self.total_geometry_count.load(Ordering::SeqCst))
    }

    /// True iff the index root has no bounding box, i.e. nothing was ever
    /// inserted or everything has been removed.
    pub fn is_empty(&self) -> SpatialResult<bool> {
        let tx = self.store.begin_tx()?;
        let root = self.index_root()?;
        let result = self.store.get_property(root, INDEX_PROP_BBOX)?.is_none();
        tx.commit()?;
        Ok(result)
    }

    /// Whether the geometry record is referenced by a leaf of this tree.
    ///
    /// # Errors
    /// `NotFound` if the record does not exist in the store at all.
    pub fn is_node_indexed(&self, geometry: NodeId) -> SpatialResult<bool> {
        let tx = self.store.begin_tx()?;
        if !self.store.node_exists(geometry)? {
            return Err(SpatialError::NotFound(geometry));
        }
        let result = self.find_leaf_containing(geometry, false)?.is_some();
        tx.commit()?;
        Ok(result)
    }

    /// Runs a pruned depth-first search, returning a lazy stream of matching
    /// geometry records. Consumers may stop early; unvisited subtrees are
    /// never read.
    pub fn search_index<'a>(
        &'a self,
        filter: impl SearchFilter + 'a,
    ) -> SpatialResult<SearchResults<'a>> {
        let tx = self.store.begin_tx()?;
        let root = self.index_root()?;
        tx.commit()?;
        Ok(SearchResults::new(self, Box::new(filter), root))
    }

    /// Lazily enumerates every index node, breadth first, root included.
    pub fn get_all_index_internal_nodes(&self) -> SpatialResult<IndexNodeIterator<'_>> {
        let root = self.index_root()?;
        Ok(IndexNodeIterator::new(self, root))
    }

    /// Lazily enumerates every indexed geometry record.
    pub fn get_all_indexed_nodes(&self) -> SpatialResult<GeometryNodeIterator<'_>> {
        let root = self.index_root()?;
        Ok(GeometryNodeIterator::new(self, root))
    }

    /// Traverses the whole tree with a no-op visitor, paging it in.
    pub fn warm_up(&self) -> SpatialResult<()> {
        let root = self.index_root()?;
        self.visit(&mut WarmUpVisitor, root)
    }

    /// The number of tree levels, leaf level included. A root that is itself
    /// a leaf has height 1; a root with leaf children has height 2.
    pub fn height(&self) -> SpatialResult<usize> {
        let tx = self.store.begin_tx()?;
        let root = self.index_root()?;
        let result = self.node_height(root, 0)?;
        tx.commit()?;
        Ok(result)
    }

    pub(crate) fn mark_count_unsaved(&self) {
        self.count_saved.store(false, Ordering::SeqCst);
    }

    pub(crate) fn count_increment(&self, delta: u64) {
        self.total_geometry_count.fetch_add(delta, Ordering::SeqCst);
    }

    pub(crate) fn count_decrement(&self) {
        let current = self.total_geometry_count.load(Ordering::SeqCst);
        self.total_geometry_count
            .store(current.saturating_sub(1), Ordering::SeqCst);
    }

    pub(crate) fn count_reset(&self, value: u64) {
        self.total_geometry_count.store(value, Ordering::SeqCst);
    }

    pub(crate) fn cached_count(&self) -> u64 {
        self.total_geometry_count.load(Ordering::SeqCst)
    }

    /// Persists the geometry count if it has not been saved yet. A cached
    /// count of zero is first recomputed by an exhaustive traversal, so a
    /// freshly opened index reports the persisted tree correctly.
    pub(crate) fn save_count(&self) -> SpatialResult<()> {
        if self.total_geometry_count.load(Ordering::SeqCst) == 0 {
            let root = self.index_root()?;
            let mut counter = RecordCounter::default();
            self.visit(&mut counter, root)?;
            let total = counter.result();
            self.total_geometry_count.store(total, Ordering::SeqCst);

            let saved = self
                .store
                .get_property(self.metadata_node(), PROP_TOTAL_GEOMETRY_COUNT)?
                .and_then(|value| value.as_int())
                .unwrap_or(0)
                .max(0) as u64;
            self.count_saved.store(saved == total, Ordering::SeqCst);
        }

        if !self.count_saved.load(Ordering::SeqCst) {
            let tx = self.store.begin_tx()?;
            self.store.set_property(
                self.metadata_node(),
                PROP_TOTAL_GEOMETRY_COUNT,
                PropertyValue::Int(self.total_geometry_count.load(Ordering::SeqCst) as i64),
            )?;
            self.count_saved.store(true, Ordering::SeqCst);
            tx.commit()?;
        }
        Ok(())
    }
}
