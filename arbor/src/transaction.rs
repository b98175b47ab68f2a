use crate::errors::StoreResult;

/// Backend hook driven by a [`TxScope`].
///
/// `commit` is called exactly once when the scope is committed; `release` is
/// called instead when the scope is dropped without a commit. Backends that
/// support rollback revert uncommitted work in `release`; others simply
/// release the scope's resources.
pub trait TxHandle: Send {
    fn commit(self: Box<Self>) -> StoreResult<()>;
    fn release(self: Box<Self>);
}

/// A scoped transaction.
///
/// Obtained from [`crate::GraphStore::begin_tx`]. The scope is released on
/// every exit path: call [`TxScope::commit`] to make the enclosed work
/// permanent, or let the scope drop (including on error and panic paths) to
/// release it without committing.
///
/// ```rust,ignore
/// let tx = store.begin_tx()?;
/// store.set_property(node, "weight", PropertyValue::Int(1))?;
/// tx.commit()?;
/// ```
pub struct TxScope {
    handle: Option<Box<dyn TxHandle>>,
}

impl TxScope {
    pub fn new(handle: impl TxHandle + 'static) -> Self {
        TxScope {
            handle: Some(Box::new(handle)),
        }
    }

    /// Commits the scope, consuming it.
    pub fn commit(mut self) -> StoreResult<()> {
        match self.handle.take() {
            Some(handle) => handle.commit(),
            None => Ok(()),
        }
    }
}

impl Drop for TxScope {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
    }
}
