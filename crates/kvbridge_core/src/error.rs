//! Error types for the replication bridge.

use kvbridge_storage::StorageError;
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while translating or applying replication entries.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The replicator has not been bound to a store yet.
    #[error("replicator is not bound to a store")]
    Unbound,

    /// A replication entry was applied with an empty key.
    #[error("replication entry has an empty key")]
    EmptyKey,

    /// A non-deleted replication entry carried no value.
    #[error("replication entry for a put carries no value (timestamp {timestamp}, origin {identifier})")]
    MissingValue {
        /// Timestamp of the offending entry.
        timestamp: i64,
        /// Origin identifier of the offending entry.
        identifier: u8,
    },

    /// A buffer could not be grown to hold a region.
    #[error("failed to allocate {requested} bytes for a buffer")]
    Allocation {
        /// Size of the region that did not fit.
        requested: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The underlying store failed.
    #[error("store error: {0}")]
    Storage(#[from] StorageError),
}

impl BridgeError {
    /// Returns true if the error is a caller precondition violation rather
    /// than a failure of the store or the allocator.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            BridgeError::Unbound | BridgeError::EmptyKey | BridgeError::MissingValue { .. }
        )
    }
}
