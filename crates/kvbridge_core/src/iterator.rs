//! Per-peer modification iterators.
//!
//! A [`ModificationIterator`] wraps the store's [`ModificationCursor`] for one
//! peer and translates each raw change into a [`ReplicationEntry`]. The
//! iterator owns exactly one entry and reuses it for every change, so the
//! callback only ever sees a borrow of it:
//!
//! ```rust
//! use kvbridge_core::{BridgeConfig, EngineReplicator, ReplicationEntry};
//! use kvbridge_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new(1).unwrap());
//! store.put_local(b"k1", b"v1").unwrap();
//!
//! let replicator = EngineReplicator::bound(store, BridgeConfig::default());
//! let mut iterator = replicator.acquire_modification_iterator(2).unwrap();
//!
//! let mut sent: Vec<ReplicationEntry> = Vec::new();
//! while iterator.next_entry(|entry| sent.push(entry.clone())).unwrap() {}
//!
//! assert_eq!(sent.len(), 1);
//! assert_eq!(sent[0].key(), b"k1");
//! assert_eq!(sent[0].remote_identifier(), 2);
//! ```

use crate::entry::ReplicationEntry;
use crate::error::{BridgeError, BridgeResult};
use kvbridge_storage::{ModificationCursor, NativeChange};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Receives each translated entry.
///
/// The return value tells the store whether the entry was accepted. It is
/// advisory: the cursor advances either way.
pub trait EntryCallback {
    /// Handles one entry. The borrow ends when this returns.
    fn on_entry(&mut self, entry: &ReplicationEntry) -> bool;
}

impl<F> EntryCallback for F
where
    F: FnMut(&ReplicationEntry) -> bool,
{
    fn on_entry(&mut self, entry: &ReplicationEntry) -> bool {
        self(entry)
    }
}

/// Signalled when a change becomes pending for a peer.
///
/// Runs on the thread that mutated the store. It must not block and must not
/// call back into the store.
pub trait ModificationNotifier: Send + Sync {
    /// Called once per newly pending change.
    fn on_change(&self);
}

impl<F> ModificationNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn on_change(&self) {
        self()
    }
}

/// Iterator over the changes pending for one remote peer.
///
/// Obtained from
/// [`EngineReplicator::acquire_modification_iterator`](crate::EngineReplicator::acquire_modification_iterator).
/// Dropping the iterator does not release the underlying cursor; a later
/// acquisition for the same peer resumes where this one stopped.
pub struct ModificationIterator {
    cursor: Arc<dyn ModificationCursor>,
    remote_identifier: u8,
    entry: ReplicationEntry,
}

impl ModificationIterator {
    pub(crate) fn new(
        cursor: Arc<dyn ModificationCursor>,
        remote_identifier: u8,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            cursor,
            remote_identifier,
            entry: ReplicationEntry::with_capacity(buffer_capacity),
        }
    }

    /// Returns the peer this iterator feeds.
    pub fn remote_identifier(&self) -> u8 {
        self.remote_identifier
    }

    /// Returns true if a change is pending. A `false` answer does not mean
    /// no change will arrive later.
    pub fn has_next(&self) -> bool {
        self.cursor.has_next()
    }

    /// Pops one pending change, translates it into the iterator's entry and
    /// passes that entry to `callback`.
    ///
    /// Returns `Ok(false)` without invoking the callback when nothing is
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Storage`] if the cursor fails, or
    /// [`BridgeError::Allocation`] if the entry's buffers cannot hold the
    /// change. In the allocation case the change has already been popped and
    /// the callback is not invoked.
    pub fn advance<C: EntryCallback>(&mut self, mut callback: C) -> BridgeResult<bool> {
        let Self {
            cursor,
            remote_identifier,
            entry,
        } = self;
        let remote = *remote_identifier;
        let mut failure: Option<BridgeError> = None;

        let found = cursor.next_entry(&mut |change: &NativeChange<'_>| {
            match translate(change, remote, entry) {
                Ok(()) => callback.on_entry(entry),
                Err(err) => {
                    failure = Some(err);
                    false
                }
            }
        })?;

        if let Some(err) = failure {
            debug!(remote, error = %err, "dropped change that could not be translated");
            return Err(err);
        }
        Ok(found)
    }

    /// Like [`advance`](Self::advance), for consumers that always accept.
    ///
    /// # Errors
    ///
    /// Same as [`advance`](Self::advance).
    pub fn next_entry<F>(&mut self, mut consumer: F) -> BridgeResult<bool>
    where
        F: FnMut(&ReplicationEntry),
    {
        self.advance(|entry: &ReplicationEntry| {
            consumer(entry);
            true
        })
    }

    /// Advances up to `limit` times, stopping early once nothing is pending.
    ///
    /// Returns the number of entries passed to `consumer`.
    ///
    /// # Errors
    ///
    /// Same as [`advance`](Self::advance). Entries consumed before the error
    /// stay consumed.
    pub fn drain<F>(&mut self, limit: usize, mut consumer: F) -> BridgeResult<usize>
    where
        F: FnMut(&ReplicationEntry),
    {
        let mut delivered = 0;
        while delivered < limit && self.next_entry(&mut consumer)? {
            delivered += 1;
        }
        trace!(remote = self.remote_identifier, delivered, "drained changes");
        Ok(delivered)
    }

    /// Treats every change before `timestamp` as delivered and replays the
    /// changes at or after it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Storage`] if the store cannot rebuild the
    /// peer's pending set.
    pub fn mark_consumed_from(&mut self, timestamp: i64) -> BridgeResult<()> {
        self.cursor.dirty_entries(timestamp)?;
        debug!(
            remote = self.remote_identifier,
            timestamp, "replaying changes from timestamp"
        );
        Ok(())
    }

    /// Installs `notifier` for this peer, replacing any previous one.
    pub fn register_change_notifier<N>(&mut self, notifier: N)
    where
        N: ModificationNotifier + 'static,
    {
        let notifier = Arc::new(notifier);
        self.cursor
            .set_modification_notifier(Arc::new(move || notifier.on_change()));
    }
}

impl fmt::Debug for ModificationIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModificationIterator")
            .field("remote_identifier", &self.remote_identifier)
            .field("has_next", &self.cursor.has_next())
            .finish()
    }
}

/// Copies one raw change into `entry`.
fn translate(
    change: &NativeChange<'_>,
    remote_identifier: u8,
    entry: &mut ReplicationEntry,
) -> BridgeResult<()> {
    entry.set_key(change.key)?;
    match change.value {
        Some(value) if !change.is_deleted => entry.set_value(value)?,
        _ => entry.clear_value(),
    }
    entry.set_timestamp(change.timestamp);
    entry.set_identifier(change.identifier);
    entry.set_remote_identifier(remote_identifier);
    entry.set_deleted(change.is_deleted);
    entry.set_bootstrap_timestamp(change.bootstrap_timestamp);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbridge_storage::{InMemoryStore, ReplicationStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn iterator_for(store: &InMemoryStore, remote: u8) -> ModificationIterator {
        let cursor = store.acquire_modification_cursor(remote).unwrap();
        ModificationIterator::new(cursor, remote, 8)
    }

    #[test]
    fn exhausted_iterator_skips_callback() {
        let store = InMemoryStore::new(1).unwrap();
        let mut iterator = iterator_for(&store, 2);

        assert!(!iterator.has_next());
        let mut calls = 0;
        let found = iterator
            .advance(|_: &ReplicationEntry| {
                calls += 1;
                true
            })
            .unwrap();
        assert!(!found);
        assert_eq!(calls, 0);
    }

    #[test]
    fn translation_sets_every_field() {
        let store = InMemoryStore::new(1).unwrap();
        store.put_local(b"key", b"value").unwrap();
        let mut iterator = iterator_for(&store, 2);

        let mut seen = None;
        assert!(iterator.next_entry(|entry| seen = Some(entry.clone())).unwrap());

        let entry = seen.unwrap();
        assert_eq!(entry.key(), b"key");
        assert_eq!(entry.value(), Some(b"value".as_slice()));
        assert_eq!(entry.identifier(), 1);
        assert_eq!(entry.remote_identifier(), 2);
        assert!(!entry.is_deleted());
        assert_eq!(entry.bootstrap_timestamp(), entry.timestamp());
    }

    #[test]
    fn callback_rejection_still_advances() {
        let store = InMemoryStore::new(1).unwrap();
        store.put_local(b"k", b"v").unwrap();
        let mut iterator = iterator_for(&store, 2);

        assert!(iterator.advance(|_: &ReplicationEntry| false).unwrap());
        assert!(!iterator.has_next());
    }

    #[test]
    fn reused_entry_grows_and_shrinks_logically() {
        let store = InMemoryStore::new(1).unwrap();
        let mut iterator = iterator_for(&store, 2);

        let long = vec![0xabu8; 300];
        store.put_local(b"first", &long).unwrap();
        store.put_local(b"second", b"tiny").unwrap();

        let mut values = Vec::new();
        while iterator
            .next_entry(|entry| values.push(entry.value().map(<[u8]>::to_vec)))
            .unwrap()
        {}

        assert_eq!(values, vec![Some(long), Some(b"tiny".to_vec())]);
    }

    #[test]
    fn drain_respects_limit() {
        let store = InMemoryStore::new(1).unwrap();
        for i in 0..5u8 {
            store.put_local(&[i], b"v").unwrap();
        }
        let mut iterator = iterator_for(&store, 2);

        assert_eq!(iterator.drain(3, |_| {}).unwrap(), 3);
        assert_eq!(iterator.drain(10, |_| {}).unwrap(), 2);
        assert_eq!(iterator.drain(10, |_| {}).unwrap(), 0);
    }

    #[test]
    fn notifier_replaced_on_register() {
        let store = InMemoryStore::new(1).unwrap();
        let mut iterator = iterator_for(&store, 2);

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        iterator.register_change_notifier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        store.put_local(b"a", b"1").unwrap();

        let counter = Arc::clone(&second);
        iterator.register_change_notifier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        store.put_local(b"b", b"2").unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_store_error_propagates() {
        let store = InMemoryStore::new(1).unwrap();
        store.put_local(b"k", b"v").unwrap();
        let mut iterator = iterator_for(&store, 2);
        store.close();

        let err = iterator.next_entry(|_| {}).unwrap_err();
        assert!(matches!(err, BridgeError::Storage(_)));
        assert!(!err.is_precondition());
    }
}
