use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::transaction::TxScope;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Stable identifier of a node in the graph store.
///
/// IDs are opaque to callers and never reused within the lifetime of a store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable identifier of a directed edge in the graph store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgeId(pub u64);

impl Display for EdgeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Label of a typed directed edge.
///
/// Edge types are unit-cost tokens created from static strings; equality is
/// token equality. Indexing layers define their own labels as constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeType(&'static str);

impl EdgeType {
    pub const fn new(name: &'static str) -> Self {
        EdgeType(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl Display for EdgeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed value stored as a node property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Double(f64),
    DoubleArray(Vec<f64>),
}

impl PropertyValue {
    /// Returns the integer payload, if this value is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the double payload, if this value is a `Double`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the array payload, if this value is a `DoubleArray`.
    pub fn as_double_array(&self) -> Option<&[f64]> {
        match self {
            PropertyValue::DoubleArray(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// A materialized view of a directed edge, as returned by edge enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub start: NodeId,
    pub end: NodeId,
    pub edge_type: EdgeType,
}

/// Low-level contract implemented by graph store backends.
///
/// # Purpose
/// Defines the minimal surface consumed by indexing layers: node and edge
/// CRUD, typed node properties, typed edge enumeration and scoped
/// transactions. Implementers provide the concrete storage, such as the
/// bundled [`crate::memory::MemoryGraphStore`].
///
/// # Semantics
/// - Node deletion fails with `InvalidOperation` while edges remain attached;
///   callers sever edges first.
/// - `outgoing`/`incoming` return snapshots in edge insertion order.
/// - Transactions returned by `begin_tx` are released on every exit path:
///   explicitly via [`TxScope::commit`], or on drop otherwise.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`. Writers are expected to be externally
/// serialized; the store only guarantees that individual operations are
/// atomic.
pub trait GraphStoreProvider: Send + Sync {
    /// Creates a new, empty node and returns its ID.
    fn create_node(&self) -> StoreResult<NodeId>;

    /// Deletes a node.
    ///
    /// # Errors
    /// `NotFound` if the node does not exist, `InvalidOperation` if edges
    /// are still attached to it.
    fn delete_node(&self, node: NodeId) -> StoreResult<()>;

    /// Checks whether a node exists.
    fn node_exists(&self, node: NodeId) -> StoreResult<bool>;

    /// Creates a typed directed edge and returns its ID.
    fn create_edge(&self, start: NodeId, edge_type: EdgeType, end: NodeId) -> StoreResult<EdgeId>;

    /// Deletes an edge, unlinking it from both endpoints.
    fn delete_edge(&self, edge: EdgeId) -> StoreResult<()>;

    /// Enumerates the outgoing edges of the given type, in insertion order.
    fn outgoing(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Vec<Edge>>;

    /// Enumerates the incoming edges of the given type, in insertion order.
    fn incoming(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Vec<Edge>>;

    /// Enumerates every edge attached to the node, regardless of type or
    /// direction.
    fn all_edges(&self, node: NodeId) -> StoreResult<Vec<Edge>>;

    /// Fetches a node property.
    fn get_property(&self, node: NodeId, key: &str) -> StoreResult<Option<PropertyValue>>;

    /// Sets a node property, replacing any previous value.
    fn set_property(&self, node: NodeId, key: &str, value: PropertyValue) -> StoreResult<()>;

    /// Removes a node property. Removing an absent property is a no-op.
    fn remove_property(&self, node: NodeId, key: &str) -> StoreResult<()>;

    /// Opens a transaction scope.
    fn begin_tx(&self) -> StoreResult<TxScope>;
}

/// Cloneable handle to a graph store backend.
///
/// `GraphStore` wraps an implementation of [`GraphStoreProvider`] behind an
/// `Arc`, delegating every call, and adds the unique-edge convenience
/// lookups used by layers that maintain single-parent topologies.
#[derive(Clone)]
pub struct GraphStore {
    inner: Arc<dyn GraphStoreProvider>,
}

impl GraphStore {
    pub fn new(provider: impl GraphStoreProvider + 'static) -> Self {
        GraphStore {
            inner: Arc::new(provider),
        }
    }

    pub fn create_node(&self) -> StoreResult<NodeId> {
        self.inner.create_node()
    }

    pub fn delete_node(&self, node: NodeId) -> StoreResult<()> {
        self.inner.delete_node(node)
    }

    pub fn node_exists(&self, node: NodeId) -> StoreResult<bool> {
        self.inner.node_exists(node)
    }

    pub fn create_edge(
        &self,
        start: NodeId,
        edge_type: EdgeType,
        end: NodeId,
    ) -> StoreResult<EdgeId> {
        self.inner.create_edge(start, edge_type, end)
    }

    pub fn delete_edge(&self, edge: EdgeId) -> StoreResult<()> {
        self.inner.delete_edge(edge)
    }

    pub fn outgoing(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Vec<Edge>> {
        self.inner.outgoing(node, edge_type)
    }

    pub fn incoming(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Vec<Edge>> {
        self.inner.incoming(node, edge_type)
    }

    pub fn all_edges(&self, node: NodeId) -> StoreResult<Vec<Edge>> {
        self.inner.all_edges(node)
    }

    pub fn get_property(&self, node: NodeId, key: &str) -> StoreResult<Option<PropertyValue>> {
        self.inner.get_property(node, key)
    }

    pub fn set_property(&self, node: NodeId, key: &str, value: PropertyValue) -> StoreResult<()> {
        self.inner.set_property(node, key, value)
    }

    pub fn remove_property(&self, node: NodeId, key: &str) -> StoreResult<()> {
        self.inner.remove_property(node, key)
    }

    pub fn begin_tx(&self) -> StoreResult<TxScope> {
        self.inner.begin_tx()
    }

    /// Returns the unique outgoing edge of the given type, or `None`.
    ///
    /// # Errors
    /// `InvalidOperation` if more than one matching edge exists.
    pub fn single_outgoing(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Option<Edge>> {
        Self::single(self.inner.outgoing(node, edge_type)?, node, edge_type)
    }

    /// Returns the unique incoming edge of the given type, or `None`.
    ///
    /// # Errors
    /// `InvalidOperation` if more than one matching edge exists.
    pub fn single_incoming(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Option<Edge>> {
        Self::single(self.inner.incoming(node, edge_type)?, node, edge_type)
    }

    fn single(mut edges: Vec<Edge>, node: NodeId, edge_type: EdgeType) -> StoreResult<Option<Edge>> {
        match edges.len() {
            0 => Ok(None),
            1 => Ok(Some(edges.remove(0))),
            n => Err(StoreError::new(
                &format!("expected at most one {} edge on {}, found {}", edge_type, node, n),
                ErrorKind::InvalidOperation,
            )),
        }
    }
}
