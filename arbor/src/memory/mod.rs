//! In-memory graph store implementation.
//!
//! Suitable for tests, temporary data and embedders that do not need
//! persistence. All data is lost when the store is dropped.

mod store;

pub use store::MemoryGraphStore;
