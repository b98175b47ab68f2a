//! # Arbor Spatial - R-Tree Indexing for Arbor Graph Stores
//!
//! This crate maintains a persistent 2D R-tree over an [`arbor::GraphStore`]:
//! the tree itself is a subgraph of index nodes wired with typed edges, leaf
//! nodes reference caller-owned geometry records, and every index node keeps
//! its bounding box tight over its children. The index answers overlap
//! queries by envelope pruning and stays balanced under incremental inserts,
//! bulk loads and deletions.
//!
//! ## Features
//!
//! - **Incremental insertion** with minimal-enlargement subtree choice
//! - **Two split strategies**: Guttman's quadratic split and Greene's split,
//!   selectable at runtime
//! - **Bulk loading**: overlap-minimizing top-down build for large batches,
//!   seeded clustering for batches small relative to the tree
//! - **Deletion with compaction**: emptied branches are pruned and ancestor
//!   boxes re-tightened
//! - **Lazy search**: pull-based result streams that stop reading the store
//!   as soon as the consumer stops
//! - **Instrumentation**: pluggable tree monitors and progress listeners
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use arbor::{GraphStore, MemoryGraphStore, PropertyValue};
//! use arbor_spatial::{Envelope, PropertyEnvelopeDecoder, RTreeIndex, SearchIntersects};
//!
//! # fn main() -> arbor_spatial::SpatialResult<()> {
//! let store = GraphStore::new(MemoryGraphStore::new());
//! let layer = store.create_node()?;
//! let decoder = Arc::new(PropertyEnvelopeDecoder::new(store.clone(), "bbox"));
//! let index = RTreeIndex::new(store.clone(), layer, decoder.clone())?;
//!
//! let city = store.create_node()?;
//! store.set_property(city, "bbox", PropertyValue::DoubleArray(vec![12.3, 45.1, 12.6, 45.5]))?;
//! index.add(city)?;
//!
//! let hits: Vec<_> = index
//!     .search_index(SearchIntersects::new(decoder, Envelope::new(12.0, 45.0, 13.0, 46.0)))?
//!     .collect::<arbor_spatial::SpatialResult<_>>()?;
//! assert_eq!(hits, vec![city]);
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod monitor;
pub mod rtree;

pub use decoder::{EnvelopeDecoder, PropertyEnvelopeDecoder};
pub use envelope::Envelope;
pub use error::{SpatialError, SpatialResult};
pub use filter::{
    SearchAll, SearchContainsPoint, SearchCoveredBy, SearchFilter, SearchIntersects,
};
pub use monitor::{EmptyMonitor, Listener, NullListener, TreeMonitor};
pub use rtree::{
    GeometryNodeIterator, IndexNodeIterator, RTreeIndex, SearchResults, SpatialIndexVisitor,
    SplitMode, DEFAULT_MAX_NODE_REFERENCES, GREENES_SPLIT, INDEX_PROP_BBOX, KEY_SPLIT,
    PROP_MAX_NODE_REFERENCES, PROP_TOTAL_GEOMETRY_COUNT, QUADRATIC_SPLIT, RTREE_CHILD,
    RTREE_METADATA, RTREE_REFERENCE, RTREE_ROOT,
};
