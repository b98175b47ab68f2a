use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Error kinds for graph store operations.
///
/// Each kind describes a category of failure, enabling precise error
/// handling by callers without string matching on messages.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A requested node or edge does not exist.
    NotFound,
    /// The operation is not valid in the current state of the store,
    /// for example deleting a node that still has edges attached.
    InvalidOperation,
    /// Error reported by the storage backend.
    BackendError,
    /// The store has been closed and cannot serve further operations.
    StoreClosed,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::StoreClosed => write!(f, "Store closed"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for all graph store operations.
///
/// `StoreError` carries a human-readable message, an [`ErrorKind`] and an
/// optional cause, forming an error chain that is preserved through the
/// `std::error::Error::source` contract. A backtrace is captured at
/// construction time and printed by the `Debug` implementation.
///
/// # Examples
///
/// ```rust,ignore
/// use arbor::errors::{StoreError, ErrorKind, StoreResult};
///
/// fn lookup() -> StoreResult<()> {
///     Err(StoreError::new("node 42 not found", ErrorKind::NotFound))
/// }
/// ```
#[derive(Clone)]
pub struct StoreError {
    message: String,
    kind: ErrorKind,
    cause: Option<Box<StoreError>>,
    backtrace: Arc<Backtrace>,
}

impl StoreError {
    /// Creates a new `StoreError` with the specified message and kind.
    pub fn new(message: &str, kind: ErrorKind) -> Self {
        StoreError {
            message: message.to_string(),
            kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `StoreError` with an underlying cause attached.
    pub fn new_with_cause(message: &str, kind: ErrorKind, cause: StoreError) -> Self {
        StoreError {
            message: message.to_string(),
            kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn cause(&self) -> Option<&StoreError> {
        self.cause.as_deref()
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for graph store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<String> for StoreError {
    fn from(msg: String) -> Self {
        StoreError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for StoreError {
    fn from(msg: &str) -> Self {
        StoreError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_error() {
        let error = StoreError::new("node missing", ErrorKind::NotFound);
        assert_eq!(error.message(), "node missing");
        assert_eq!(error.kind(), &ErrorKind::NotFound);
        assert!(error.cause().is_none());
    }

    #[test]
    fn new_with_cause_preserves_chain() {
        let cause = StoreError::new("disk unavailable", ErrorKind::BackendError);
        let error = StoreError::new_with_cause("commit failed", ErrorKind::InvalidOperation, cause);

        assert_eq!(error.kind(), &ErrorKind::InvalidOperation);
        assert!(error.cause().is_some());
        assert_eq!(error.cause().unwrap().kind(), &ErrorKind::BackendError);
        assert!(error.source().is_some());
    }

    #[test]
    fn display_shows_message_only() {
        let error = StoreError::new("something broke", ErrorKind::InternalError);
        assert_eq!(format!("{}", error), "something broke");
    }

    #[test]
    fn debug_includes_cause() {
        let cause = StoreError::new("inner", ErrorKind::BackendError);
        let error = StoreError::new_with_cause("outer", ErrorKind::InternalError, cause);
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("outer"));
        assert!(formatted.contains("Caused by:"));
        assert!(formatted.contains("inner"));
    }

    #[test]
    fn from_str_is_internal() {
        let error: StoreError = "oops".into();
        assert_eq!(error.kind(), &ErrorKind::InternalError);
        assert_eq!(error.message(), "oops");
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", ErrorKind::NotFound), "Not found");
        assert_eq!(format!("{}", ErrorKind::StoreClosed), "Store closed");
    }
}
