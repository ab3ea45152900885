use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for Docket operations.
///
/// Every fallible operation reports exactly one of these categories so callers
/// can branch on the failure without parsing messages.
///
/// Cancelling a query from its visitor is not an error and therefore has no
/// kind here; it is reported through [`crate::query::QueryState::Cancelled`].
///
/// # Examples
///
/// ```rust
/// use docket::errors::{DocketError, DocketResult, ErrorKind};
///
/// fn example() -> DocketResult<()> {
///     Err(DocketError::new("Collection not found", ErrorKind::NotFound))
/// }
///
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::NotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A collection, document or index is absent where presence is required
    NotFound,
    /// Rename target collision or conflicting index definition
    AlreadyExists,
    /// Malformed name, malformed query, malformed JSON, unbound or mistyped placeholder
    InvalidArgument,
    /// A unique index rejected a write
    ConstraintViolation,
    /// Allocation or storage limits were hit
    ResourceExhausted,
    /// The operation is not valid in the current state (e.g. a backup is already running)
    InvalidOperation,
    /// Error reading or writing a store image
    IOError,
    /// Error encoding or decoding a store image
    EncodingError,
    /// The store has already been closed
    StoreAlreadyClosed,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::AlreadyExists => write!(f, "Already exists"),
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::ConstraintViolation => write!(f, "Constraint violation"),
            ErrorKind::ResourceExhausted => write!(f, "Resource exhausted"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Docket error type.
///
/// `DocketError` carries a message, a kind, an optional cause and the
/// backtrace captured where it was created.
///
/// # Examples
///
/// ```rust
/// use docket::errors::{DocketError, ErrorKind};
///
/// let cause = DocketError::new("disk is read-only", ErrorKind::IOError);
/// let err = DocketError::new_with_cause("Backup failed", ErrorKind::IOError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct DocketError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocketError>>,
    backtrace: Arc<Backtrace>,
}

impl DocketError {
    /// Creates a new `DocketError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocketError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `DocketError` chained to the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocketError) -> Self {
        DocketError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocketError> {
        self.cause.as_deref()
    }
}

impl Display for DocketError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocketError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})\nCaused by: {:?}", self.message, self.error_kind, cause),
            None => write!(f, "{} ({})\n{:?}", self.message, self.error_kind, self.backtrace),
        }
    }
}

impl Error for DocketError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Docket operations.
pub type DocketResult<T> = Result<T, DocketError>;

impl From<std::io::Error> for DocketError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::OutOfMemory => ErrorKind::ResourceExhausted,
            _ => ErrorKind::IOError,
        };
        DocketError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<serde_json::Error> for DocketError {
    fn from(err: serde_json::Error) -> Self {
        let error_kind = if err.is_io() {
            ErrorKind::IOError
        } else {
            ErrorKind::EncodingError
        };
        DocketError::new(&format!("JSON error: {}", err), error_kind)
    }
}
