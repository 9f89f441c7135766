//! Error types shared by every primitive in this crate.

use thiserror::Error;

/// Result type alias used throughout `ringcore`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a `ringcore` primitive can return.
///
/// Ordinary full/empty conditions are not modeled here: they surface as `Option`/`bool`
/// return values on the hot path rather than as errors.
#[derive(Error, Debug)]
pub enum Error {
    /// A constructor argument was out of range (zero capacity, non power-of-two size, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the offending argument.
        message: String,
    },

    /// I/O failure from a shared-memory or file-backed operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A memory-mapped header's magic number did not match what was expected.
    #[error("magic number mismatch: expected {expected:#x}, found {found:#x}")]
    MagicMismatch {
        /// Magic number this crate expected to find.
        expected: u64,
        /// Magic number actually read from the header.
        found: u64,
    },

    /// A shared-memory segment was attached before its owner finished initializing it.
    #[error("peer has not finished initializing this segment")]
    PeerNotReady,

    /// A bounded wait (word lock, MVCC, timer wheel dispatch) exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The requested allocation could not be satisfied (mmap/shm_open failure, oversized request).
    #[error("allocation failed: {message}")]
    AllocationFailure {
        /// Description of why the allocation failed.
        message: String,
    },

    /// A condition that should be unreachable under this crate's invariants.
    #[error("unexpected internal error: {message}")]
    Unexpected {
        /// Description of the unexpected condition.
        message: String,
    },
}

impl Error {
    /// Build an [`Error::InvalidArgument`] from any displayable message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument { message: message.into() }
    }

    /// Build an [`Error::AllocationFailure`] from any displayable message.
    pub fn allocation_failure(message: impl Into<String>) -> Self {
        Error::AllocationFailure { message: message.into() }
    }

    /// Build an [`Error::Unexpected`] from any displayable message.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Error::Unexpected { message: message.into() }
    }

    /// Whether retrying the same operation shortly after is reasonable.
    ///
    /// `Timeout` and `PeerNotReady` describe transient conditions; everything else
    /// reflects a programming error or a permanent resource failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Timeout | Error::PeerNotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_formats_message() {
        let err = Error::invalid_argument("capacity must be a power of two");
        assert!(err.to_string().contains("capacity must be a power of two"));
    }

    #[test]
    fn recoverable_classification() {
        assert!(Error::Timeout.is_recoverable());
        assert!(Error::PeerNotReady.is_recoverable());
        assert!(!Error::unexpected("nope").is_recoverable());
    }
}
