//! Replication entries.

use crate::bridge::{copy_region, RegionSource};
use crate::config::DEFAULT_BUFFER_CAPACITY;
use crate::error::BridgeResult;
use crate::region::ByteRegion;
use std::fmt;

/// Identifier value meaning "not set".
pub const UNSET_IDENTIFIER: u8 = 0;

/// Identifier value meaning "no node".
pub const NONE_IDENTIFIER: u8 = u8::MAX;

/// Returns true if `identifier` can name a real node (1..=254).
pub fn is_valid_identifier(identifier: u8) -> bool {
    identifier != UNSET_IDENTIFIER && identifier != NONE_IDENTIFIER
}

/// One replicated change: a put or a tombstone, with the metadata the
/// receiving store needs for multi-master conflict resolution.
///
/// An entry is a reusable carrier. Its key and value buffers are overwritten
/// in place by the setters and grow to the largest region seen, so one
/// instance serves any number of translations.
///
/// # Invariants
///
/// - A non-deleted entry has a value
/// - [`value`](Self::value) returns `None` for a tombstone, whatever bytes
///   remain in the value buffer
///
/// Equality and formatting are diagnostic; the store decides which of two
/// conflicting entries wins.
///
/// # Example
///
/// ```rust
/// use kvbridge_core::ReplicationEntry;
///
/// let mut entry = ReplicationEntry::put(b"k1", b"v1", 1, 1000);
/// assert_eq!(entry.value(), Some(b"v1".as_slice()));
///
/// entry.set_deleted(true);
/// assert_eq!(entry.value(), None);
/// ```
#[derive(Clone)]
pub struct ReplicationEntry {
    key: ByteRegion,
    value: ByteRegion,
    has_value: bool,
    timestamp: i64,
    identifier: u8,
    remote_identifier: u8,
    is_deleted: bool,
    bootstrap_timestamp: i64,
}

impl ReplicationEntry {
    /// Creates an empty entry with default-sized buffers.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates an empty entry whose key and value buffers start at
    /// `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            key: ByteRegion::with_capacity(capacity),
            value: ByteRegion::with_capacity(capacity),
            has_value: false,
            timestamp: 0,
            identifier: UNSET_IDENTIFIER,
            remote_identifier: UNSET_IDENTIFIER,
            is_deleted: false,
            bootstrap_timestamp: 0,
        }
    }

    /// Creates a put entry holding copies of `key` and `value`.
    pub fn put(key: &[u8], value: &[u8], identifier: u8, timestamp: i64) -> Self {
        Self {
            key: ByteRegion::from_slice(key),
            value: ByteRegion::from_slice(value),
            has_value: true,
            timestamp,
            identifier,
            remote_identifier: UNSET_IDENTIFIER,
            is_deleted: false,
            bootstrap_timestamp: 0,
        }
    }

    /// Creates a tombstone for `key`.
    pub fn tombstone(key: &[u8], identifier: u8, timestamp: i64) -> Self {
        Self {
            key: ByteRegion::from_slice(key),
            value: ByteRegion::default(),
            has_value: false,
            timestamp,
            identifier,
            remote_identifier: UNSET_IDENTIFIER,
            is_deleted: true,
            bootstrap_timestamp: 0,
        }
    }

    /// Returns the key bytes.
    pub fn key(&self) -> &[u8] {
        self.key.as_slice()
    }

    /// Returns the key region.
    pub fn key_region(&self) -> &ByteRegion {
        &self.key
    }

    /// Returns the value bytes, or `None` for a tombstone or an entry whose
    /// value was never set.
    pub fn value(&self) -> Option<&[u8]> {
        self.value_region().map(ByteRegion::as_slice)
    }

    /// Returns the value region, with the same absence rules as
    /// [`value`](Self::value).
    pub fn value_region(&self) -> Option<&ByteRegion> {
        if self.has_value && !self.is_deleted {
            Some(&self.value)
        } else {
            None
        }
    }

    /// Returns the mutation timestamp at its origin.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the origin node identifier.
    pub fn identifier(&self) -> u8 {
        self.identifier
    }

    /// Returns the peer this entry was prepared for or received from.
    pub fn remote_identifier(&self) -> u8 {
        self.remote_identifier
    }

    /// Returns true if the entry is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Returns the timestamp the receiver should resume catch-up from.
    pub fn bootstrap_timestamp(&self) -> i64 {
        self.bootstrap_timestamp
    }

    /// Copies `key` into the entry's key buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Allocation`](crate::BridgeError::Allocation) if
    /// the buffer cannot grow; the previous key is then kept.
    pub fn set_key<S: RegionSource + ?Sized>(&mut self, key: &S) -> BridgeResult<()> {
        copy_region(key, &mut self.key)?;
        Ok(())
    }

    /// Copies `value` into the entry's value buffer and marks it present.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Allocation`](crate::BridgeError::Allocation) if
    /// the buffer cannot grow; the value is then marked absent.
    pub fn set_value<S: RegionSource + ?Sized>(&mut self, value: &S) -> BridgeResult<()> {
        self.has_value = false;
        copy_region(value, &mut self.value)?;
        self.has_value = true;
        Ok(())
    }

    /// Marks the value absent. The buffer is kept for reuse.
    pub fn clear_value(&mut self) {
        self.has_value = false;
    }

    /// Sets the mutation timestamp.
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    /// Sets the origin node identifier.
    pub fn set_identifier(&mut self, identifier: u8) {
        self.identifier = identifier;
    }

    /// Sets the peer this entry is prepared for or received from.
    pub fn set_remote_identifier(&mut self, remote_identifier: u8) {
        self.remote_identifier = remote_identifier;
    }

    /// Sets the tombstone flag.
    pub fn set_deleted(&mut self, is_deleted: bool) {
        self.is_deleted = is_deleted;
    }

    /// Sets the catch-up resume timestamp.
    pub fn set_bootstrap_timestamp(&mut self, bootstrap_timestamp: i64) {
        self.bootstrap_timestamp = bootstrap_timestamp;
    }
}

impl Default for ReplicationEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ReplicationEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
            && self.value() == other.value()
            && self.timestamp == other.timestamp
            && self.identifier == other.identifier
            && self.remote_identifier == other.remote_identifier
            && self.is_deleted == other.is_deleted
            && self.bootstrap_timestamp == other.bootstrap_timestamp
    }
}

impl Eq for ReplicationEntry {}

impl fmt::Debug for ReplicationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationEntry")
            .field("key", &Printable(self.key()))
            .field("value", &self.value().map(Printable))
            .field("timestamp", &self.timestamp)
            .field("identifier", &self.identifier)
            .field("remote_identifier", &self.remote_identifier)
            .field("is_deleted", &self.is_deleted)
            .field("bootstrap_timestamp", &self.bootstrap_timestamp)
            .finish()
    }
}

/// Multi-line dump for logs. Not a stable format.
impl fmt::Display for ReplicationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "!ReplicationEntry {{")?;
        writeln!(f, "  key: {},", Printable(self.key()))?;
        match self.value() {
            Some(value) => writeln!(f, "  value: {},", Printable(value))?,
            None => writeln!(f, "  value: !!null,")?,
        }
        writeln!(f, "  timestamp: {},", self.timestamp)?;
        writeln!(f, "  identifier: {},", self.identifier)?;
        writeln!(f, "  remoteIdentifier: {},", self.remote_identifier)?;
        writeln!(f, "  isDeleted: {},", self.is_deleted)?;
        writeln!(f, "  bootStrapTimeStamp: {}", self.bootstrap_timestamp)?;
        write!(f, "}}")
    }
}

/// Renders bytes as a quoted string when they are printable ASCII, hex
/// otherwise.
struct Printable<'a>(&'a [u8]);

impl fmt::Display for Printable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "\"{}\"", String::from_utf8_lossy(self.0))
        } else {
            f.write_str("0x")?;
            for byte in self.0 {
                write!(f, "{byte:02x}")?;
            }
            Ok(())
        }
    }
}

impl fmt::Debug for Printable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
