//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur inside the replication store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store has been closed and no longer accepts operations.
    #[error("store is closed")]
    Closed,

    /// A node identifier outside the usable range was supplied.
    #[error("invalid node identifier {identifier}: {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: u8,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A relative write did not fit in the remaining buffer space.
    #[error("buffer overflow: needed {needed} bytes, {remaining} remaining")]
    BufferOverflow {
        /// Bytes the write required.
        needed: usize,
        /// Bytes left between position and limit.
        remaining: usize,
    },

    /// The local clock cannot advance past the latest accepted timestamp.
    #[error("local clock exhausted at timestamp {0}")]
    ClockExhausted(i64),

    /// The store rejected the operation for an engine-specific reason.
    #[error("store rejected operation: {0}")]
    Rejected(String),
}

impl StorageError {
    /// Creates an invalid identifier error.
    pub fn invalid_identifier(identifier: u8, reason: &'static str) -> Self {
        Self::InvalidIdentifier { identifier, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(StorageError::Closed.to_string(), "store is closed");

        let err = StorageError::invalid_identifier(0, "reserved");
        assert_eq!(err.to_string(), "invalid node identifier 0: reserved");

        let err = StorageError::BufferOverflow {
            needed: 16,
            remaining: 4,
        };
        assert!(err.to_string().contains("16"));
        assert!(err.to_string().contains("4"));

        let err = StorageError::ClockExhausted(i64::MAX);
        assert!(err.to_string().contains(&i64::MAX.to_string()));
    }
}
