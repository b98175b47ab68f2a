use arbor::NodeId;

/// Instrumentation sink observing tree maintenance.
///
/// Monitors are injected per index via [`crate::RTreeIndex::add_monitor`]
/// and must not mutate the tree. The default is [`EmptyMonitor`], which
/// ignores everything.
pub trait TreeMonitor: Send + Sync {
    /// A node was split into two.
    fn add_split(&self);

    /// A bulk insertion fell back to a full rebuild.
    fn add_nbr_rebuilt(&self);

    /// A tagged code path was taken. Tags are stable strings suitable for
    /// counting in tests and diagnostics.
    fn add_case(&self, tag: &str);

    /// An index node at the given depth passed the search filter.
    fn matched_tree_node(&self, depth: usize, node: NodeId);
}

/// The no-op monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyMonitor;

impl TreeMonitor for EmptyMonitor {
    fn add_split(&self) {}

    fn add_nbr_rebuilt(&self) {}

    fn add_case(&self, _tag: &str) {}

    fn matched_tree_node(&self, _depth: usize, _node: NodeId) {}
}

/// Progress listener for mass operations such as `remove_all`.
pub trait Listener {
    fn begin(&self, total: u64);
    fn worked(&self, units: u64);
    fn done(&self);
}

/// The no-op listener.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl Listener for NullListener {
    fn begin(&self, _total: u64) {}

    fn worked(&self, _units: u64) {}

    fn done(&self) {}
}
