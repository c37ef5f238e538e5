//! In-memory replication store for testing and simulation.

use crate::error::{StorageError, StorageResult};
use crate::native::NativeBytes;
use crate::store::{ChangeNotifier, ModificationCursor, NativeChange, ReplicationStore};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Initial capacity of a cursor's reusable key/value buffers.
const CURSOR_BUFFER_CAPACITY: usize = 256;

/// The latest state of one key, including tombstones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Current value, `None` once deleted.
    pub value: Option<Vec<u8>>,
    /// Timestamp of the winning mutation.
    pub timestamp: i64,
    /// Node that authored the winning mutation.
    pub identifier: u8,
}

impl StoredRecord {
    /// Returns true if the record is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.value.is_none()
    }

    /// Last-writer-wins: a later timestamp wins, ties go to the lower
    /// identifier. An identical `(timestamp, identifier)` pair never wins.
    fn is_superseded_by(&self, timestamp: i64, identifier: u8) -> bool {
        timestamp > self.timestamp || (timestamp == self.timestamp && identifier < self.identifier)
    }
}

/// State shared between the store and its cursors.
#[derive(Debug, Default)]
struct Shared {
    records: RwLock<HashMap<Vec<u8>, StoredRecord>>,
    closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

/// An in-memory, multi-master replication store.
///
/// This store is suitable for:
/// - Unit and integration tests of the replication bridge
/// - Multi-node simulations that do not need persistence
///
/// Every accepted mutation is marked dirty for each peer cursor except the
/// mutation's author, so changes are never echoed back to where they came
/// from.
///
/// # Thread Safety
///
/// The store is thread-safe. Notifiers fire after all internal locks have
/// been released.
///
/// # Example
///
/// ```rust
/// use kvbridge_storage::{InMemoryStore, ReplicationStore};
///
/// let store = InMemoryStore::new(1).unwrap();
/// store.put_local(b"k", b"v").unwrap();
///
/// let cursor = store.acquire_modification_cursor(2).unwrap();
/// assert!(cursor.has_next());
/// ```
pub struct InMemoryStore {
    identifier: u8,
    shared: Arc<Shared>,
    cursors: Mutex<HashMap<u8, Arc<MemoryCursor>>>,
    last_modification: RwLock<HashMap<u8, i64>>,
    clock: AtomicI64,
}

impl InMemoryStore {
    /// Creates an empty store for node `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identifier` is 0 or 255, which are reserved.
    pub fn new(identifier: u8) -> StorageResult<Self> {
        validate_identifier(identifier)?;
        Ok(Self {
            identifier,
            shared: Arc::new(Shared::default()),
            cursors: Mutex::new(HashMap::new()),
            last_modification: RwLock::new(HashMap::new()),
            clock: AtomicI64::new(0),
        })
    }

    /// Writes a local value stamped with this node's identifier and clock.
    ///
    /// Returns the timestamp assigned to the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the clock is exhausted.
    pub fn put_local(&self, key: &[u8], value: &[u8]) -> StorageResult<i64> {
        let timestamp = self.next_timestamp()?;
        self.apply(key, Some(value), self.identifier, timestamp)?;
        Ok(timestamp)
    }

    /// Deletes a local key stamped with this node's identifier and clock.
    ///
    /// Returns the timestamp assigned to the tombstone.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the clock is exhausted.
    pub fn remove_local(&self, key: &[u8]) -> StorageResult<i64> {
        let timestamp = self.next_timestamp()?;
        self.apply(key, None, self.identifier, timestamp)?;
        Ok(timestamp)
    }

    /// Returns the live value for `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.shared
            .records
            .read()
            .get(key)
            .and_then(|record| record.value.clone())
    }

    /// Returns the full record for `key`, including tombstones.
    #[must_use]
    pub fn record(&self, key: &[u8]) -> Option<StoredRecord> {
        self.shared.records.read().get(key).cloned()
    }

    /// Returns true if `key` has a live value.
    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared
            .records
            .read()
            .values()
            .filter(|record| !record.is_deleted())
            .count()
    }

    /// Returns true if there are no live keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all live key/value pairs in key order.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.shared
            .records
            .read()
            .iter()
            .filter_map(|(key, record)| record.value.clone().map(|value| (key.clone(), value)))
            .collect()
    }

    /// Drops the cursor for `remote`. The next acquisition starts afresh.
    ///
    /// Returns true if a cursor existed.
    pub fn release_cursor(&self, remote: u8) -> bool {
        let released = self.cursors.lock().remove(&remote).is_some();
        if released {
            debug!(identifier = self.identifier, remote, "released modification cursor");
        }
        released
    }

    /// Closes the store. Subsequent mutations and cursor pops fail with
    /// [`StorageError::Closed`].
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    /// Returns true if the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Hands out a strictly increasing millisecond timestamp.
    ///
    /// Fails once an accepted mutation has pulled the clock to `i64::MAX`.
    fn next_timestamp(&self) -> StorageResult<i64> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        let mut last = self.clock.load(Ordering::Acquire);
        loop {
            let next = last
                .checked_add(1)
                .ok_or(StorageError::ClockExhausted(last))?
                .max(now);
            match self
                .clock
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(next),
                Err(actual) => last = actual,
            }
        }
    }

    fn apply(
        &self,
        key: &[u8],
        value: Option<&[u8]>,
        identifier: u8,
        timestamp: i64,
    ) -> StorageResult<bool> {
        self.shared.ensure_open()?;

        {
            let mut records = self.shared.records.write();
            if let Some(existing) = records.get(key) {
                if !existing.is_superseded_by(timestamp, identifier) {
                    trace!(
                        identifier,
                        timestamp,
                        existing_timestamp = existing.timestamp,
                        existing_identifier = existing.identifier,
                        "ignoring superseded mutation"
                    );
                    return Ok(false);
                }
            }
            records.insert(
                key.to_vec(),
                StoredRecord {
                    value: value.map(<[u8]>::to_vec),
                    timestamp,
                    identifier,
                },
            );
        }
        self.clock.fetch_max(timestamp, Ordering::AcqRel);

        let cursors: Vec<Arc<MemoryCursor>> = self.cursors.lock().values().cloned().collect();
        let notifiers: Vec<ChangeNotifier> = cursors
            .iter()
            .filter(|cursor| cursor.remote != identifier)
            .filter_map(|cursor| cursor.mark_dirty(key, timestamp))
            .collect();

        for notify in notifiers {
            notify();
        }
        Ok(true)
    }
}

impl ReplicationStore for InMemoryStore {
    fn identifier(&self) -> u8 {
        self.identifier
    }

    fn put(
        &self,
        key: &NativeBytes,
        value: &NativeBytes,
        identifier: u8,
        timestamp: i64,
    ) -> StorageResult<()> {
        self.apply(key.as_slice(), Some(value.as_slice()), identifier, timestamp)
            .map(|_| ())
    }

    fn remove(&self, key: &NativeBytes, identifier: u8, timestamp: i64) -> StorageResult<()> {
        self.apply(key.as_slice(), None, identifier, timestamp)
            .map(|_| ())
    }

    fn last_modification_time(&self, remote: u8) -> i64 {
        self.last_modification
            .read()
            .get(&remote)
            .copied()
            .unwrap_or(0)
    }

    fn set_last_modification_time(&self, remote: u8, timestamp: i64) {
        self.last_modification.write().insert(remote, timestamp);
    }

    fn acquire_modification_cursor(
        &self,
        remote: u8,
    ) -> StorageResult<Arc<dyn ModificationCursor>> {
        validate_identifier(remote)?;
        if remote == self.identifier {
            return Err(StorageError::invalid_identifier(
                remote,
                "cannot replicate to self",
            ));
        }

        let mut cursors = self.cursors.lock();
        if let Some(cursor) = cursors.get(&remote) {
            return Ok(Arc::clone(cursor) as Arc<dyn ModificationCursor>);
        }

        let cursor = Arc::new(MemoryCursor::new(remote, Arc::clone(&self.shared)));
        cursor.seed(i64::MIN);
        debug!(
            identifier = self.identifier,
            remote,
            pending = cursor.pending_len(),
            "created modification cursor"
        );
        cursors.insert(remote, Arc::clone(&cursor));
        Ok(cursor)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("identifier", &self.identifier)
            .field("records", &self.shared.records.read().len())
            .field("cursors", &self.cursors.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn validate_identifier(identifier: u8) -> StorageResult<()> {
    match identifier {
        0 => Err(StorageError::invalid_identifier(identifier, "reserved as unset")),
        u8::MAX => Err(StorageError::invalid_identifier(identifier, "reserved as none")),
        _ => Ok(()),
    }
}

/// Keys pending delivery, in first-dirtied order, without duplicates.
///
/// Alongside the queue it keeps a multiset of the pending timestamps, so the
/// oldest pending change is known without walking the queue.
#[derive(Debug, Default)]
struct DirtySet {
    order: VecDeque<Vec<u8>>,
    queued: HashMap<Vec<u8>, i64>,
    timestamps: BTreeMap<i64, usize>,
}

impl DirtySet {
    /// Queues `key` at `timestamp`. A key already queued keeps its place and
    /// takes the newer timestamp.
    fn push(&mut self, key: &[u8], timestamp: i64) {
        match self.queued.get_mut(key) {
            Some(pending) => {
                if *pending != timestamp {
                    let previous = std::mem::replace(pending, timestamp);
                    self.forget(previous);
                    *self.timestamps.entry(timestamp).or_default() += 1;
                }
            }
            None => {
                self.queued.insert(key.to_vec(), timestamp);
                self.order.push_back(key.to_vec());
                *self.timestamps.entry(timestamp).or_default() += 1;
            }
        }
    }

    fn pop(&mut self) -> Option<Vec<u8>> {
        let key = self.order.pop_front()?;
        if let Some(timestamp) = self.queued.remove(&key) {
            self.forget(timestamp);
        }
        Some(key)
    }

    fn forget(&mut self, timestamp: i64) {
        if let Some(count) = self.timestamps.get_mut(&timestamp) {
            *count -= 1;
            if *count == 0 {
                self.timestamps.remove(&timestamp);
            }
        }
    }

    /// Oldest timestamp still queued.
    fn oldest(&self) -> Option<i64> {
        self.timestamps.keys().next().copied()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.queued.clear();
        self.timestamps.clear();
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The cursor's reusable change buffers. The store overwrites them on every
/// pop, so the bytes handed to a callback do not outlive it.
#[derive(Debug)]
struct CursorBuffers {
    key: NativeBytes,
    value: NativeBytes,
}

/// Per-peer cursor over an [`InMemoryStore`].
struct MemoryCursor {
    remote: u8,
    shared: Arc<Shared>,
    buffers: Mutex<CursorBuffers>,
    dirty: Mutex<DirtySet>,
    notifier: RwLock<Option<ChangeNotifier>>,
}

impl MemoryCursor {
    fn new(remote: u8, shared: Arc<Shared>) -> Self {
        Self {
            remote,
            shared,
            buffers: Mutex::new(CursorBuffers {
                key: NativeBytes::with_capacity(CURSOR_BUFFER_CAPACITY),
                value: NativeBytes::with_capacity(CURSOR_BUFFER_CAPACITY),
            }),
            dirty: Mutex::new(DirtySet::default()),
            notifier: RwLock::new(None),
        }
    }

    /// Replaces the dirty set with every record at or after `from`, oldest
    /// first, skipping records authored by the remote itself.
    fn seed(&self, from: i64) -> bool {
        let mut dirty = self.dirty.lock();
        let records = self.shared.records.read();

        let mut replay: Vec<(&Vec<u8>, &StoredRecord)> = records
            .iter()
            .filter(|(_, record)| record.timestamp >= from && record.identifier != self.remote)
            .collect();
        replay.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then_with(|| a.0.cmp(b.0)));

        dirty.clear();
        for (key, record) in replay {
            dirty.push(key, record.timestamp);
        }
        !dirty.is_empty()
    }

    fn mark_dirty(&self, key: &[u8], timestamp: i64) -> Option<ChangeNotifier> {
        self.dirty.lock().push(key, timestamp);
        self.notifier.read().clone()
    }

    fn pending_len(&self) -> usize {
        self.dirty.lock().order.len()
    }
}

impl ModificationCursor for MemoryCursor {
    fn has_next(&self) -> bool {
        !self.dirty.lock().is_empty()
    }

    fn next_entry(
        &self,
        callback: &mut dyn FnMut(&NativeChange<'_>) -> bool,
    ) -> StorageResult<bool> {
        self.shared.ensure_open()?;

        // Held across the callback; pops from the same cursor serialize here.
        let mut buffers = self.buffers.lock();
        let (timestamp, identifier, is_deleted, bootstrap_timestamp) = {
            let mut dirty = self.dirty.lock();
            let records = self.shared.records.read();

            let (key, record) = loop {
                let Some(key) = dirty.pop() else {
                    return Ok(false);
                };
                if let Some(record) = records.get(&key) {
                    break (key, record);
                }
            };

            let bootstrap_timestamp = dirty
                .oldest()
                .map_or(record.timestamp, |oldest| oldest.min(record.timestamp));

            buffers.key.refill(&key);
            if let Some(value) = &record.value {
                buffers.value.refill(value);
            }
            (
                record.timestamp,
                record.identifier,
                record.is_deleted(),
                bootstrap_timestamp,
            )
        };

        let change = NativeChange {
            key: &buffers.key,
            value: if is_deleted { None } else { Some(&buffers.value) },
            timestamp,
            identifier,
            is_deleted,
            bootstrap_timestamp,
        };
        callback(&change);
        Ok(true)
    }

    fn dirty_entries(&self, from_timestamp: i64) -> StorageResult<()> {
        self.shared.ensure_open()?;
        let pending = self.seed(from_timestamp);
        debug!(remote = self.remote, from_timestamp, "reset modification cursor");

        if pending {
            let notifier = self.notifier.read().clone();
            if let Some(notify) = notifier {
                notify();
            }
        }
        Ok(())
    }

    fn set_modification_notifier(&self, notifier: ChangeNotifier) {
        *self.notifier.write() = Some(notifier);
    }
}
