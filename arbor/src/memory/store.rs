use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::graph::{Edge, EdgeId, EdgeType, GraphStoreProvider, NodeId, PropertyValue};
use crate::transaction::{TxHandle, TxScope};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory implementation of a graph store.
///
/// # Purpose
/// `MemoryGraphStore` keeps nodes, edges and properties in concurrent hash
/// maps, with adjacency lists preserving edge insertion order. It implements
/// the full [`GraphStoreProvider`] contract and is the store used by the
/// test suites of the indexing layers built on top of it.
///
/// # Characteristics
/// - **Thread-Safe**: handles can be cloned and shared freely
/// - **Insertion-Ordered Adjacency**: edge enumeration is deterministic
/// - **Logical Transactions**: scopes are tracked but not journaled; a
///   dropped scope releases without reverting (single-writer discipline is
///   the caller's responsibility)
/// - **No Persistence**: all data lives in process memory
#[derive(Clone)]
pub struct MemoryGraphStore {
    inner: Arc<MemoryGraphStoreInner>,
}

struct MemoryGraphStoreInner {
    nodes: DashMap<NodeId, NodeRecord>,
    edges: DashMap<EdgeId, Edge>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    open_scopes: AtomicUsize,
    closed: AtomicBool,
}

#[derive(Default)]
struct NodeRecord {
    properties: HashMap<String, PropertyValue>,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        MemoryGraphStore {
            inner: Arc::new(MemoryGraphStoreInner {
                nodes: DashMap::new(),
                edges: DashMap::new(),
                next_node_id: AtomicU64::new(1),
                next_edge_id: AtomicU64::new(1),
                open_scopes: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Closes the store; all further operations fail with `StoreClosed`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Number of transaction scopes currently open.
    pub fn open_scopes(&self) -> usize {
        self.inner.open_scopes.load(Ordering::SeqCst)
    }

    /// Total number of nodes currently in the store.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Total number of edges currently in the store.
    pub fn edge_count(&self) -> usize {
        self.inner.edges.len()
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            Err(StoreError::new("store is closed", ErrorKind::StoreClosed))
        } else {
            Ok(())
        }
    }

    fn node_record<T>(
        &self,
        node: NodeId,
        f: impl FnOnce(&NodeRecord) -> T,
    ) -> StoreResult<T> {
        match self.inner.nodes.get(&node) {
            Some(record) => Ok(f(record.value())),
            None => Err(Self::node_not_found(node)),
        }
    }

    fn node_record_mut<T>(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut NodeRecord) -> T,
    ) -> StoreResult<T> {
        match self.inner.nodes.get_mut(&node) {
            Some(mut record) => Ok(f(record.value_mut())),
            None => Err(Self::node_not_found(node)),
        }
    }

    fn node_not_found(node: NodeId) -> StoreError {
        StoreError::new(&format!("node {} not found", node), ErrorKind::NotFound)
    }

    fn resolve_edges(&self, ids: &[EdgeId], edge_type: EdgeType) -> Vec<Edge> {
        ids.iter()
            .filter_map(|id| self.inner.edges.get(id).map(|e| *e.value()))
            .filter(|e| e.edge_type == edge_type)
            .collect()
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStoreProvider for MemoryGraphStore {
    fn create_node(&self) -> StoreResult<NodeId> {
        self.check_open()?;
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::SeqCst));
        self.inner.nodes.insert(id, NodeRecord::default());
        Ok(id)
    }

    fn delete_node(&self, node: NodeId) -> StoreResult<()> {
        self.check_open()?;
        let attached = self.node_record(node, |r| r.outgoing.len() + r.incoming.len())?;
        if attached > 0 {
            return Err(StoreError::new(
                &format!("node {} still has {} edges attached", node, attached),
                ErrorKind::InvalidOperation,
            ));
        }
        self.inner.nodes.remove(&node);
        Ok(())
    }

    fn node_exists(&self, node: NodeId) -> StoreResult<bool> {
        self.check_open()?;
        Ok(self.inner.nodes.contains_key(&node))
    }

    fn create_edge(&self, start: NodeId, edge_type: EdgeType, end: NodeId) -> StoreResult<EdgeId> {
        self.check_open()?;
        if !self.inner.nodes.contains_key(&start) {
            return Err(Self::node_not_found(start));
        }
        if !self.inner.nodes.contains_key(&end) {
            return Err(Self::node_not_found(end));
        }

        let id = EdgeId(self.inner.next_edge_id.fetch_add(1, Ordering::SeqCst));
        self.inner.edges.insert(
            id,
            Edge {
                id,
                start,
                end,
                edge_type,
            },
        );
        if start == end {
            self.node_record_mut(start, |r| {
                r.outgoing.push(id);
                r.incoming.push(id);
            })?;
        } else {
            self.node_record_mut(start, |r| r.outgoing.push(id))?;
            self.node_record_mut(end, |r| r.incoming.push(id))?;
        }
        Ok(id)
    }

    fn delete_edge(&self, edge: EdgeId) -> StoreResult<()> {
        self.check_open()?;
        let record = match self.inner.edges.remove(&edge) {
            Some((_, record)) => record,
            None => {
                return Err(StoreError::new(
                    &format!("edge {} not found", edge),
                    ErrorKind::NotFound,
                ))
            }
        };
        // Endpoints may already be gone when callers tear down subgraphs.
        if let Some(mut start) = self.inner.nodes.get_mut(&record.start) {
            start.value_mut().outgoing.retain(|id| *id != edge);
        }
        if let Some(mut end) = self.inner.nodes.get_mut(&record.end) {
            end.value_mut().incoming.retain(|id| *id != edge);
        }
        Ok(())
    }

    fn outgoing(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Vec<Edge>> {
        self.check_open()?;
        let ids = self.node_record(node, |r| r.outgoing.clone())?;
        Ok(self.resolve_edges(&ids, edge_type))
    }

    fn incoming(&self, node: NodeId, edge_type: EdgeType) -> StoreResult<Vec<Edge>> {
        self.check_open()?;
        let ids = self.node_record(node, |r| r.incoming.clone())?;
        Ok(self.resolve_edges(&ids, edge_type))
    }

    fn all_edges(&self, node: NodeId) -> StoreResult<Vec<Edge>> {
        self.check_open()?;
        let (outgoing, incoming) = self.node_record(node, |r| (r.outgoing.clone(), r.incoming.clone()))?;
        let mut edges: Vec<Edge> = outgoing
            .iter()
            .chain(incoming.iter())
            .filter_map(|id| self.inner.edges.get(id).map(|e| *e.value()))
            .collect();
        // self-loops appear on both adjacency lists
        edges.sort_by_key(|e| e.id);
        edges.dedup_by_key(|e| e.id);
        Ok(edges)
    }

    fn get_property(&self, node: NodeId, key: &str) -> StoreResult<Option<PropertyValue>> {
        self.check_open()?;
        self.node_record(node, |r| r.properties.get(key).cloned())
    }

    fn set_property(&self, node: NodeId, key: &str, value: PropertyValue) -> StoreResult<()> {
        self.check_open()?;
        self.node_record_mut(node, |r| {
            r.properties.insert(key.to_string(), value);
        })
    }

    fn remove_property(&self, node: NodeId, key: &str) -> StoreResult<()> {
        self.check_open()?;
        self.node_record_mut(node, |r| {
            r.properties.remove(key);
        })
    }

    fn begin_tx(&self) -> StoreResult<TxScope> {
        self.check_open()?;
        self.inner.open_scopes.fetch_add(1, Ordering::SeqCst);
        Ok(TxScope::new(MemoryTxHandle {
            inner: self.inner.clone(),
        }))
    }
}

/// Logical transaction scope for the in-memory store.
///
/// The store does not journal, so commit and release both just close the
/// scope; the open-scope gauge lets tests assert that no scope leaks.
struct MemoryTxHandle {
    inner: Arc<MemoryGraphStoreInner>,
}

impl TxHandle for MemoryTxHandle {
    fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.open_scopes.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(self: Box<Self>) {
        log::trace!("releasing uncommitted transaction scope");
        self.inner.open_scopes.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;

    const LINK: EdgeType = EdgeType::new("LINK");
    const OTHER: EdgeType = EdgeType::new("OTHER");

    fn store() -> GraphStore {
        GraphStore::new(MemoryGraphStore::new())
    }

    #[test]
    fn create_and_delete_node() {
        let store = store();
        let node = store.create_node().unwrap();
        assert!(store.node_exists(node).unwrap());
        store.delete_node(node).unwrap();
        assert!(!store.node_exists(node).unwrap());
    }

    #[test]
    fn delete_missing_node_fails_not_found() {
        let store = store();
        let err = store.delete_node(NodeId(999)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn delete_node_with_edges_fails() {
        let store = store();
        let a = store.create_node().unwrap();
        let b = store.create_node().unwrap();
        let edge = store.create_edge(a, LINK, b).unwrap();

        let err = store.delete_node(a).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        store.delete_edge(edge).unwrap();
        store.delete_node(a).unwrap();
        store.delete_node(b).unwrap();
    }

    #[test]
    fn edges_enumerate_in_insertion_order() {
        let store = store();
        let hub = store.create_node().unwrap();
        let spokes: Vec<NodeId> = (0..5).map(|_| store.create_node().unwrap()).collect();
        for spoke in &spokes {
            store.create_edge(hub, LINK, *spoke).unwrap();
        }

        let ends: Vec<NodeId> = store
            .outgoing(hub, LINK)
            .unwrap()
            .into_iter()
            .map(|e| e.end)
            .collect();
        assert_eq!(ends, spokes);
    }

    #[test]
    fn edge_enumeration_is_typed() {
        let store = store();
        let a = store.create_node().unwrap();
        let b = store.create_node().unwrap();
        store.create_edge(a, LINK, b).unwrap();
        store.create_edge(a, OTHER, b).unwrap();

        assert_eq!(store.outgoing(a, LINK).unwrap().len(), 1);
        assert_eq!(store.outgoing(a, OTHER).unwrap().len(), 1);
        assert_eq!(store.incoming(b, LINK).unwrap().len(), 1);
        assert_eq!(store.all_edges(a).unwrap().len(), 2);
    }

    #[test]
    fn delete_edge_unlinks_both_endpoints() {
        let store = store();
        let a = store.create_node().unwrap();
        let b = store.create_node().unwrap();
        let edge = store.create_edge(a, LINK, b).unwrap();

        store.delete_edge(edge).unwrap();
        assert!(store.outgoing(a, LINK).unwrap().is_empty());
        assert!(store.incoming(b, LINK).unwrap().is_empty());
    }

    #[test]
    fn self_loop_edge() {
        let store = store();
        let a = store.create_node().unwrap();
        let edge = store.create_edge(a, LINK, a).unwrap();

        assert_eq!(store.outgoing(a, LINK).unwrap().len(), 1);
        assert_eq!(store.incoming(a, LINK).unwrap().len(), 1);
        assert_eq!(store.all_edges(a).unwrap().len(), 1);

        store.delete_edge(edge).unwrap();
        store.delete_node(a).unwrap();
    }

    #[test]
    fn properties_round_trip() {
        let store = store();
        let node = store.create_node().unwrap();

        store
            .set_property(node, "count", PropertyValue::Int(42))
            .unwrap();
        store
            .set_property(node, "bbox", PropertyValue::DoubleArray(vec![0.0, 0.0, 1.0, 1.0]))
            .unwrap();

        assert_eq!(
            store.get_property(node, "count").unwrap(),
            Some(PropertyValue::Int(42))
        );
        assert_eq!(
            store
                .get_property(node, "bbox")
                .unwrap()
                .unwrap()
                .as_double_array(),
            Some(&[0.0, 0.0, 1.0, 1.0][..])
        );

        store.remove_property(node, "count").unwrap();
        assert_eq!(store.get_property(node, "count").unwrap(), None);
        // removing twice is a no-op
        store.remove_property(node, "count").unwrap();
    }

    #[test]
    fn single_edge_lookups() {
        let store = store();
        let a = store.create_node().unwrap();
        let b = store.create_node().unwrap();

        assert!(store.single_outgoing(a, LINK).unwrap().is_none());
        store.create_edge(a, LINK, b).unwrap();
        assert_eq!(store.single_outgoing(a, LINK).unwrap().unwrap().end, b);
        assert_eq!(store.single_incoming(b, LINK).unwrap().unwrap().start, a);

        store.create_edge(a, LINK, b).unwrap();
        let err = store.single_outgoing(a, LINK).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn transaction_scopes_balance() {
        let raw = MemoryGraphStore::new();
        let store = GraphStore::new(raw.clone());

        let tx = store.begin_tx().unwrap();
        assert_eq!(raw.open_scopes(), 1);
        tx.commit().unwrap();
        assert_eq!(raw.open_scopes(), 0);

        {
            let _tx = store.begin_tx().unwrap();
            assert_eq!(raw.open_scopes(), 1);
        }
        assert_eq!(raw.open_scopes(), 0);
    }

    #[test]
    fn closed_store_rejects_operations() {
        let raw = MemoryGraphStore::new();
        let store = GraphStore::new(raw.clone());
        let node = store.create_node().unwrap();

        raw.close();
        let err = store.create_node().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreClosed);
        let err = store.get_property(node, "x").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreClosed);
        assert!(store.begin_tx().is_err());
    }
}
