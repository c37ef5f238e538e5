//! Replication store trait definitions.

use crate::error::StorageResult;
use crate::native::NativeBytes;
use std::sync::Arc;

/// Callback fired by a store whenever a new change becomes available for a
/// peer. It runs on the thread that performed the mutation.
pub type ChangeNotifier = Arc<dyn Fn() + Send + Sync>;

/// One raw change record handed out by a [`ModificationCursor`].
///
/// The buffers are owned by the cursor and are reused for the next change, so
/// a `NativeChange` is only valid for the duration of the callback it is
/// passed to.
#[derive(Debug, Clone, Copy)]
pub struct NativeChange<'a> {
    /// Key bytes; the readable region is the key.
    pub key: &'a NativeBytes,
    /// Value bytes, absent for deletions.
    pub value: Option<&'a NativeBytes>,
    /// Timestamp of the mutation at its origin.
    pub timestamp: i64,
    /// Node that authored the mutation.
    pub identifier: u8,
    /// True if the change is a deletion.
    pub is_deleted: bool,
    /// Timestamp the receiving peer should resume catch-up from.
    pub bootstrap_timestamp: i64,
}

/// The mutation and bookkeeping surface a key-value engine exposes to the
/// replication bridge.
///
/// The store owns the canonical data and decides conflict outcomes; callers
/// only supply the origin identifier and timestamp used for comparison.
///
/// # Invariants
///
/// - `identifier` is stable for the store's lifetime
/// - `acquire_modification_cursor` returns the same cursor for the same peer
///   until the store releases it
/// - implementations provide their own internal synchronization
pub trait ReplicationStore: Send + Sync {
    /// Returns this node's origin identifier.
    fn identifier(&self) -> u8;

    /// Writes `value` under `key` on behalf of node `identifier`.
    ///
    /// The store may ignore the mutation if it loses conflict resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot accept the mutation.
    fn put(
        &self,
        key: &NativeBytes,
        value: &NativeBytes,
        identifier: u8,
        timestamp: i64,
    ) -> StorageResult<()>;

    /// Removes `key` on behalf of node `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot accept the mutation.
    fn remove(&self, key: &NativeBytes, identifier: u8, timestamp: i64) -> StorageResult<()>;

    /// Returns the last timestamp recorded as received from `remote`, or 0.
    fn last_modification_time(&self, remote: u8) -> i64;

    /// Records the last timestamp received from `remote`.
    fn set_last_modification_time(&self, remote: u8, timestamp: i64);

    /// Returns the change cursor for `remote`, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote` is not a valid peer for this store.
    fn acquire_modification_cursor(&self, remote: u8)
        -> StorageResult<Arc<dyn ModificationCursor>>;
}

/// A per-peer cursor over a store's outgoing change log.
pub trait ModificationCursor: Send + Sync {
    /// Returns true if a change is pending for this peer. Non-blocking.
    fn has_next(&self) -> bool;

    /// Pops the next pending change and passes it to `callback`.
    ///
    /// Returns `Ok(false)` without invoking the callback if nothing is
    /// pending. The cursor advances whatever the callback returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot produce the change.
    fn next_entry(
        &self,
        callback: &mut dyn FnMut(&NativeChange<'_>) -> bool,
    ) -> StorageResult<bool>;

    /// Treats changes before `from_timestamp` as delivered and queues every
    /// change at or after it for replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot rebuild the pending set.
    fn dirty_entries(&self, from_timestamp: i64) -> StorageResult<()>;

    /// Installs the notifier fired when a change becomes pending. Replaces
    /// any previous notifier.
    fn set_modification_notifier(&self, notifier: ChangeNotifier);
}
