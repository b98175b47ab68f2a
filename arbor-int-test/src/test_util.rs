//! Test fixtures and invariant checkers shared by the integration suites.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor::{GraphStore, MemoryGraphStore, NodeId, PropertyValue};
use arbor_spatial::{
    Envelope, PropertyEnvelopeDecoder, RTreeIndex, SpatialResult, TreeMonitor, RTREE_CHILD,
    RTREE_REFERENCE,
};

pub const GEOMETRY_PROP_BBOX: &str = "bbox";

/// A store with one layer node and an index opened on it.
pub struct TestContext {
    pub store: GraphStore,
    pub layer: NodeId,
    pub index: RTreeIndex,
}

pub fn create_test_context(max_node_references: usize) -> TestContext {
    let store = GraphStore::new(MemoryGraphStore::new());
    let layer = store.create_node().unwrap();
    let index = open_index(&store, layer, max_node_references);
    TestContext {
        store,
        layer,
        index,
    }
}

pub fn open_index(store: &GraphStore, layer: NodeId, max_node_references: usize) -> RTreeIndex {
    let decoder = Arc::new(PropertyEnvelopeDecoder::new(
        store.clone(),
        GEOMETRY_PROP_BBOX,
    ));
    RTreeIndex::with_max_node_references(store.clone(), layer, decoder, max_node_references)
        .unwrap()
}

/// Creates a geometry record carrying the envelope in its `bbox` property.
pub fn add_geometry(store: &GraphStore, envelope: Envelope) -> NodeId {
    let node = store.create_node().unwrap();
    store
        .set_property(
            node,
            GEOMETRY_PROP_BBOX,
            PropertyValue::DoubleArray(envelope.to_array().to_vec()),
        )
        .unwrap();
    node
}

/// Unit square with its lower-left corner at `(x, y)`.
pub fn unit_square(store: &GraphStore, x: f64, y: f64) -> NodeId {
    add_geometry(store, Envelope::new(x, y, x + 1.0, y + 1.0))
}

pub fn envelope_of(store: &GraphStore, geometry: NodeId) -> Envelope {
    let value = store
        .get_property(geometry, GEOMETRY_PROP_BBOX)
        .unwrap()
        .unwrap();
    Envelope::from_array(value.as_double_array().unwrap()).unwrap()
}

/// Monitor recording split counts, rebuild counts and case tags.
#[derive(Default)]
pub struct RecordingMonitor {
    splits: AtomicUsize,
    rebuilds: AtomicUsize,
    cases: Mutex<Vec<String>>,
}

impl RecordingMonitor {
    pub fn splits(&self) -> usize {
        self.splits.load(Ordering::SeqCst)
    }

    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }

    pub fn cases(&self) -> Vec<String> {
        self.cases.lock().clone()
    }
}

impl TreeMonitor for RecordingMonitor {
    fn add_split(&self) {
        self.splits.fetch_add(1, Ordering::SeqCst);
    }

    fn add_nbr_rebuilt(&self) {
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
    }

    fn add_case(&self, tag: &str) {
        self.cases.lock().push(tag.to_string());
    }

    fn matched_tree_node(&self, _depth: usize, _node: NodeId) {}
}

/// Asserts the structural invariants of the tree: balance, box tightness,
/// capacity, child-kind exclusivity and the exact geometry count.
pub fn check_tree_invariants(ctx: &TestContext) {
    let root = root_of(ctx);

    let mut leaf_depths = Vec::new();
    let mut reference_count = 0u64;
    check_node(ctx, root, 0, &mut leaf_depths, &mut reference_count);

    assert!(
        leaf_depths.windows(2).all(|pair| pair[0] == pair[1]),
        "leaves at unequal depths: {:?}",
        leaf_depths
    );
    assert_eq!(
        ctx.index.count().unwrap(),
        reference_count,
        "count out of sync with reachable references"
    );
}

fn root_of(ctx: &TestContext) -> NodeId {
    ctx.store
        .single_outgoing(ctx.layer, arbor_spatial::RTREE_ROOT)
        .unwrap()
        .unwrap()
        .end
}

fn check_node(
    ctx: &TestContext,
    node: NodeId,
    depth: usize,
    leaf_depths: &mut Vec<usize>,
    reference_count: &mut u64,
) {
    let children = ctx.store.outgoing(node, RTREE_CHILD).unwrap();
    let references = ctx.store.outgoing(node, RTREE_REFERENCE).unwrap();
    assert!(
        children.is_empty() || references.is_empty(),
        "index node {} owns both subtrees and references",
        node
    );

    let max = ctx.index.max_node_references();
    assert!(children.len() <= max, "node {} has {} children", node, children.len());
    assert!(
        references.len() <= max,
        "node {} has {} references",
        node,
        references.len()
    );

    let stored = ctx
        .store
        .get_property(node, arbor_spatial::INDEX_PROP_BBOX)
        .unwrap()
        .map(|value| Envelope::from_array(value.as_double_array().unwrap()).unwrap());

    let mut union: Option<Envelope> = None;
    for edge in &children {
        let child_env = ctx
            .store
            .get_property(edge.end, arbor_spatial::INDEX_PROP_BBOX)
            .unwrap()
            .map(|value| Envelope::from_array(value.as_double_array().unwrap()).unwrap())
            .expect("child index node without bounding box");
        expand(&mut union, child_env);
    }
    for edge in &references {
        expand(&mut union, envelope_of(&ctx.store, edge.end));
    }

    if let Some(union) = union {
        assert_eq!(
            stored,
            Some(union),
            "stored box of node {} is not the union of its children",
            node
        );
    }

    if children.is_empty() {
        leaf_depths.push(depth);
        *reference_count += references.len() as u64;
    } else {
        for edge in children {
            check_node(ctx, edge.end, depth + 1, leaf_depths, reference_count);
        }
    }
}

fn expand(union: &mut Option<Envelope>, envelope: Envelope) {
    match union.as_mut() {
        Some(current) => current.expand_to_include(&envelope),
        None => *union = Some(envelope),
    }
}

/// Collects a search result stream into a sorted vector.
pub fn collect_sorted(
    results: arbor_spatial::SearchResults<'_>,
) -> Vec<NodeId> {
    let mut found: Vec<NodeId> = results
        .collect::<SpatialResult<Vec<_>>>()
        .unwrap();
    found.sort();
    found
}
