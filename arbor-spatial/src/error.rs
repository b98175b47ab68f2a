use arbor::{NodeId, StoreError};
use thiserror::Error;

/// Errors surfaced by spatial index operations.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The requested geometry record does not exist in the store.
    #[error("geometry record {0} not found")]
    NotFound(NodeId),

    /// The geometry record exists but is not indexed in this tree.
    #[error("geometry record {0} is not indexed in this tree")]
    NotIndexedHere(NodeId),

    /// A configuration key, configuration value or parameter was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The tree structure contradicts an invariant the index maintains.
    /// Indicates a bug or external corruption of the index subgraph.
    #[error("index invariant violated: {0}")]
    InvariantViolated(String),

    /// Error propagated unchanged from the underlying graph store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for spatial index operations.
pub type SpatialResult<T> = Result<T, SpatialError>;
