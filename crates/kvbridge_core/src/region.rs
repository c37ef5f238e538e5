//! The canonical byte region.

use crate::bridge::allocate;
use crate::error::BridgeResult;
use bytes::Bytes;
use std::fmt;

/// An owned, directly addressable byte region with a read window.
///
/// This is the one representation consumers of the bridge see: keys and
/// values of every [`ReplicationEntry`](crate::ReplicationEntry) live in
/// `ByteRegion`s. A region is filled through
/// [`copy_region`](crate::copy_region), which grows the allocation by
/// replacement and never shrinks it.
pub struct ByteRegion {
    buf: Box<[u8]>,
    read_position: usize,
    read_limit: usize,
}

impl ByteRegion {
    /// Creates an empty region backed by `capacity` zeroed bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            read_position: 0,
            read_limit: 0,
        }
    }

    /// Creates a region holding a copy of `data`, sized exactly to it.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            buf: data.to_vec().into_boxed_slice(),
            read_position: 0,
            read_limit: data.len(),
        }
    }

    /// Returns the size of the backing allocation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the number of readable bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_limit - self.read_position
    }

    /// Returns true if the region holds no readable bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the start of the read window.
    #[must_use]
    pub fn read_position(&self) -> usize {
        self.read_position
    }

    /// Returns the end of the read window.
    #[must_use]
    pub fn read_limit(&self) -> usize {
        self.read_limit
    }

    /// Returns the readable bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.read_position..self.read_limit]
    }

    /// Copies the readable bytes into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Copies the readable bytes into an owned [`Bytes`] that outlives this
    /// region's reuse.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    /// Makes the window `[0, len)`, first replacing the allocation if it is
    /// smaller than `len`.
    pub(crate) fn prepare_window(&mut self, len: usize) -> BridgeResult<()> {
        if len > self.buf.len() {
            self.buf = allocate(len)?;
        }
        self.read_position = 0;
        self.read_limit = len;
        Ok(())
    }

    pub(crate) fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// Clones only the readable bytes, into an exactly sized allocation.
impl Clone for ByteRegion {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl Default for ByteRegion {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl AsRef<[u8]> for ByteRegion {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for ByteRegion {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteRegion {}

impl fmt::Debug for ByteRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteRegion")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
