//! # Arbor - Embeddable Property-Graph Store
//!
//! Arbor defines a minimal property-graph contract — nodes and typed directed
//! edges with stable IDs, typed node properties, and scoped transactions —
//! together with a thread-safe in-memory implementation. Indexing layers such
//! as `arbor-spatial` are written against the [`GraphStore`] handle and work
//! with any backend implementing [`GraphStoreProvider`].
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor::{EdgeType, GraphStore, MemoryGraphStore, PropertyValue};
//!
//! const KNOWS: EdgeType = EdgeType::new("KNOWS");
//!
//! # fn main() -> arbor::StoreResult<()> {
//! let store = GraphStore::new(MemoryGraphStore::new());
//!
//! let tx = store.begin_tx()?;
//! let alice = store.create_node()?;
//! let bob = store.create_node()?;
//! store.create_edge(alice, KNOWS, bob)?;
//! store.set_property(alice, "age", PropertyValue::Int(34))?;
//! tx.commit()?;
//!
//! assert_eq!(store.outgoing(alice, KNOWS)?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod graph;
pub mod memory;
pub mod transaction;

pub use errors::{ErrorKind, StoreError, StoreResult};
pub use graph::{Edge, EdgeId, EdgeType, GraphStore, GraphStoreProvider, NodeId, PropertyValue};
pub use memory::MemoryGraphStore;
pub use transaction::{TxHandle, TxScope};
