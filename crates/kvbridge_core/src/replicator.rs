//! The replication facade.

use crate::bridge::NativeBuffers;
use crate::config::BridgeConfig;
use crate::entry::ReplicationEntry;
use crate::error::{BridgeError, BridgeResult};
use crate::iterator::ModificationIterator;
use kvbridge_storage::ReplicationStore;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

type Binding = Arc<RwLock<Option<Arc<dyn ReplicationStore>>>>;

/// Connects a key-value engine to a replication framework.
///
/// The replicator is the single entry point the framework uses: it applies
/// entries received from peers to the store and hands out per-peer
/// [`ModificationIterator`]s for outgoing changes.
///
/// # Contexts
///
/// Each `EngineReplicator` value owns the native buffers it uses on the
/// apply path, so [`apply`](Self::apply) takes `&mut self`. Cloning yields a
/// new context that shares the binding but has buffers of its own; give each
/// mutating thread its own clone.
///
/// # Binding
///
/// A replicator starts unbound when built with [`new`](Self::new). Every
/// operation except [`bind`](Self::bind) then fails with
/// [`BridgeError::Unbound`]. Binding is visible to all clones.
///
/// # Example
///
/// ```rust
/// use kvbridge_core::{BridgeConfig, EngineReplicator, ReplicationEntry};
/// use kvbridge_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStore::new(1).unwrap());
/// let mut replicator = EngineReplicator::new(BridgeConfig::default());
/// replicator.bind(store.clone());
///
/// replicator
///     .apply(&ReplicationEntry::put(b"k1", b"v1", 3, 1000))
///     .unwrap();
/// assert_eq!(store.get(b"k1"), Some(b"v1".to_vec()));
/// ```
pub struct EngineReplicator {
    binding: Binding,
    config: BridgeConfig,
    scratch: NativeBuffers,
}

impl EngineReplicator {
    /// Creates an unbound replicator.
    pub fn new(config: BridgeConfig) -> Self {
        let scratch = NativeBuffers::new(config.initial_buffer_capacity);
        Self {
            binding: Arc::new(RwLock::new(None)),
            config,
            scratch,
        }
    }

    /// Creates a replicator already bound to `store`.
    pub fn bound(store: Arc<dyn ReplicationStore>, config: BridgeConfig) -> Self {
        let replicator = Self::new(config);
        replicator.bind(store);
        replicator
    }

    /// Attaches `store`, replacing any store bound earlier.
    pub fn bind(&self, store: Arc<dyn ReplicationStore>) {
        let identifier = store.identifier();
        let previous = self.binding.write().replace(store);
        info!(
            identifier,
            rebound = previous.is_some(),
            "replicator bound to store"
        );
    }

    /// Returns true once a store is bound.
    pub fn is_bound(&self) -> bool {
        self.binding.read().is_some()
    }

    /// Returns the configuration this context was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn store(&self) -> BridgeResult<Arc<dyn ReplicationStore>> {
        self.binding.read().clone().ok_or(BridgeError::Unbound)
    }

    /// Returns the bound store's node identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unbound`] if no store is bound.
    pub fn identifier(&self) -> BridgeResult<u8> {
        Ok(self.store()?.identifier())
    }

    /// Applies an entry received from a peer.
    ///
    /// Tombstones become removals and everything else a put, both carrying
    /// the entry's origin identifier and timestamp. The store decides
    /// whether the mutation wins.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Unbound`] if no store is bound
    /// - [`BridgeError::EmptyKey`] if the key is empty
    /// - [`BridgeError::MissingValue`] if a non-deleted entry has no value
    /// - [`BridgeError::Allocation`] if the native buffers cannot grow
    /// - [`BridgeError::Storage`] if the store rejects the mutation
    ///
    /// The store is untouched when any of the first four occurs.
    pub fn apply(&mut self, entry: &ReplicationEntry) -> BridgeResult<()> {
        let store = self.store()?;
        if entry.key().is_empty() {
            return Err(BridgeError::EmptyKey);
        }

        debug!(entry = %entry, "applying replication entry");

        if entry.is_deleted() {
            let key = self.scratch.load_key(entry.key_region())?;
            store.remove(key, entry.identifier(), entry.timestamp())?;
        } else {
            let value = entry.value_region().ok_or(BridgeError::MissingValue {
                timestamp: entry.timestamp(),
                identifier: entry.identifier(),
            })?;
            let (key, value) = self.scratch.load_pair(entry.key_region(), value)?;
            store.put(key, value, entry.identifier(), entry.timestamp())?;
        }
        Ok(())
    }

    /// Returns the change iterator for `remote`.
    ///
    /// Repeated calls for the same peer share one store cursor, so the replay
    /// position survives dropping an iterator.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unbound`] if no store is bound, or
    /// [`BridgeError::Storage`] if the store refuses the peer.
    pub fn acquire_modification_iterator(&self, remote: u8) -> BridgeResult<ModificationIterator> {
        let store = self.store()?;
        let cursor = store.acquire_modification_cursor(remote)?;
        debug!(
            identifier = store.identifier(),
            remote, "acquired modification iterator"
        );
        Ok(ModificationIterator::new(
            cursor,
            remote,
            self.config.initial_buffer_capacity,
        ))
    }

    /// Returns the last timestamp recorded as received from `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unbound`] if no store is bound.
    pub fn last_modification_time(&self, remote: u8) -> BridgeResult<i64> {
        Ok(self.store()?.last_modification_time(remote))
    }

    /// Records the last timestamp received from `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unbound`] if no store is bound.
    pub fn set_last_modification_time(&self, remote: u8, timestamp: i64) -> BridgeResult<()> {
        self.store()?.set_last_modification_time(remote, timestamp);
        Ok(())
    }
}

impl Clone for EngineReplicator {
    fn clone(&self) -> Self {
        Self {
            binding: Arc::clone(&self.binding),
            config: self.config.clone(),
            scratch: NativeBuffers::new(self.config.initial_buffer_capacity),
        }
    }
}

impl fmt::Debug for EngineReplicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identifier = self.binding.read().as_ref().map(|store| store.identifier());
        f.debug_struct("EngineReplicator")
            .field("identifier", &identifier)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbridge_storage::InMemoryStore;

    fn bound_to(identifier: u8) -> (Arc<InMemoryStore>, EngineReplicator) {
        let store = Arc::new(InMemoryStore::new(identifier).unwrap());
        let replicator = EngineReplicator::bound(store.clone(), BridgeConfig::default());
        (store, replicator)
    }

    #[test]
    fn unbound_operations_fail() {
        let mut replicator = EngineReplicator::new(BridgeConfig::default());
        assert!(!replicator.is_bound());

        assert!(matches!(replicator.identifier(), Err(BridgeError::Unbound)));
        assert!(matches!(
            replicator.apply(&ReplicationEntry::put(b"k", b"v", 1, 1)),
            Err(BridgeError::Unbound)
        ));
        assert!(matches!(
            replicator.acquire_modification_iterator(2),
            Err(BridgeError::Unbound)
        ));
        assert!(matches!(
            replicator.last_modification_time(2),
            Err(BridgeError::Unbound)
        ));
        assert!(matches!(
            replicator.set_last_modification_time(2, 5),
            Err(BridgeError::Unbound)
        ));
    }

    #[test]
    fn apply_put_and_tombstone() {
        let (store, mut replicator) = bound_to(1);

        replicator
            .apply(&ReplicationEntry::put(b"k1", b"v1", 2, 1000))
            .unwrap();
        assert_eq!(store.get(b"k1"), Some(b"v1".to_vec()));

        replicator
            .apply(&ReplicationEntry::tombstone(b"k1", 2, 2000))
            .unwrap();
        assert!(store.get(b"k1").is_none());
        assert_eq!(store.record(b"k1").unwrap().timestamp, 2000);
    }

    #[test]
    fn apply_rejects_empty_key() {
        let (store, mut replicator) = bound_to(1);
        let err = replicator
            .apply(&ReplicationEntry::put(b"", b"v", 2, 1))
            .unwrap_err();
        assert!(matches!(err, BridgeError::EmptyKey));
        assert!(store.is_empty());
    }

    #[test]
    fn apply_rejects_put_without_value() {
        let (store, mut replicator) = bound_to(1);
        let mut entry = ReplicationEntry::with_capacity(8);
        entry.set_key(b"k".as_slice()).unwrap();
        entry.set_identifier(2);
        entry.set_timestamp(7);

        let err = replicator.apply(&entry).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::MissingValue {
                timestamp: 7,
                identifier: 2
            }
        ));
        assert!(store.record(b"k").is_none());
    }

    #[test]
    fn bind_replaces_store_for_all_clones() {
        let (_, replicator) = bound_to(1);
        let clone = replicator.clone();
        assert_eq!(clone.identifier().unwrap(), 1);

        replicator.bind(Arc::new(InMemoryStore::new(4).unwrap()));
        assert_eq!(clone.identifier().unwrap(), 4);
    }

    #[test]
    fn clone_gets_fresh_buffers() {
        let config = BridgeConfig::new().with_initial_buffer_capacity(4);
        let store = Arc::new(InMemoryStore::new(1).unwrap());
        let mut replicator = EngineReplicator::bound(store, config);

        replicator
            .apply(&ReplicationEntry::put(b"a longer key", b"v", 2, 1))
            .unwrap();
        assert!(replicator.scratch.key_capacity() >= 12);

        let clone = replicator.clone();
        assert_eq!(clone.scratch.key_capacity(), 4);
    }

    #[test]
    fn bookkeeping_round_trip() {
        let (_, replicator) = bound_to(1);
        assert_eq!(replicator.last_modification_time(2).unwrap(), 0);
        replicator.set_last_modification_time(2, 42).unwrap();
        assert_eq!(replicator.last_modification_time(2).unwrap(), 42);
    }

    #[test]
    fn store_failure_propagates() {
        let (store, mut replicator) = bound_to(1);
        store.close();

        let err = replicator
            .apply(&ReplicationEntry::put(b"k", b"v", 2, 1))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Storage(_)));
    }

    #[test]
    fn debug_shows_identifier() {
        let (_, replicator) = bound_to(9);
        assert!(format!("{replicator:?}").contains("Some(9)"));

        let unbound = EngineReplicator::new(BridgeConfig::default());
        assert!(format!("{unbound:?}").contains("None"));
    }
}
