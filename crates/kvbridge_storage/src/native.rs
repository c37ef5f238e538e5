//! The engine's native byte buffer.
//!
//! `NativeBytes` is the representation the store speaks on its mutation and
//! change-tracking paths: a fixed-capacity, directly addressable allocation
//! with a `position`/`limit` window, in the style of a direct byte buffer.
//! The readable region of a buffer handed to or from the store is always
//! `[position, limit)`.
//!
//! Multi-byte accessors use the host's native byte order.

use crate::error::{StorageError, StorageResult};
use std::fmt;

const WORD: usize = std::mem::size_of::<u64>();

/// A fixed-capacity byte buffer with position and limit cursors.
///
/// The capacity never changes after construction. Callers that need a larger
/// buffer allocate a new one and drop the old.
///
/// # Example
///
/// ```rust
/// use kvbridge_storage::NativeBytes;
///
/// let mut buf = NativeBytes::with_capacity(16);
/// buf.put_slice(b"hello").unwrap();
/// buf.flip();
/// assert_eq!(buf.as_slice(), b"hello");
/// assert_eq!(buf.capacity(), 16);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct NativeBytes {
    buf: Box<[u8]>,
    position: usize,
    limit: usize,
}

impl NativeBytes {
    /// Allocates a zeroed buffer. Position is 0 and limit equals capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_boxed(vec![0u8; capacity].into_boxed_slice())
    }

    /// Wraps an existing allocation. The whole allocation is readable.
    #[must_use]
    pub fn from_boxed(buf: Box<[u8]>) -> Self {
        let limit = buf.len();
        Self {
            buf,
            position: 0,
            limit,
        }
    }

    /// Wraps a vector, taking its length as the capacity.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::from_boxed(data.into_boxed_slice())
    }

    /// Returns the allocation size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the current position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the current limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of bytes between position and limit.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Returns true if there are bytes between position and limit.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Sets the position, clamped to the limit.
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.limit);
    }

    /// Sets the limit, clamped to the capacity. The position is pulled back
    /// if it would exceed the new limit.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.min(self.buf.len());
        self.position = self.position.min(self.limit);
    }

    /// Resets position to 0 and limit to capacity.
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.buf.len();
    }

    /// Makes the bytes written so far readable: limit becomes the current
    /// position and position returns to 0.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// Writes `data` at the position and advances it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BufferOverflow`] if `data` does not fit in the
    /// remaining space. Nothing is written in that case.
    pub fn put_slice(&mut self, data: &[u8]) -> StorageResult<()> {
        if data.len() > self.remaining() {
            return Err(StorageError::BufferOverflow {
                needed: data.len(),
                remaining: self.remaining(),
            });
        }
        let end = self.position + data.len();
        self.buf[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(())
    }

    /// Replaces the contents with `data`, reallocating if the capacity is too
    /// small. On return the readable region is exactly `data`.
    pub fn refill(&mut self, data: &[u8]) {
        if data.len() > self.capacity() {
            *self = Self::with_capacity(data.len());
        }
        self.buf[..data.len()].copy_from_slice(data);
        self.position = 0;
        self.limit = data.len();
    }

    /// Returns the readable region `[position, limit)`.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.position..self.limit]
    }

    /// Reads a native-endian `u64` at an absolute index.
    ///
    /// # Panics
    ///
    /// Panics if `index + 8` exceeds the capacity.
    #[must_use]
    pub fn get_u64_ne(&self, index: usize) -> u64 {
        let mut word = [0u8; WORD];
        word.copy_from_slice(&self.buf[index..index + WORD]);
        u64::from_ne_bytes(word)
    }

    /// Reads a byte at an absolute index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the capacity.
    #[must_use]
    pub fn get_u8(&self, index: usize) -> u8 {
        self.buf[index]
    }

    /// Writes a native-endian `u64` at an absolute index without moving the
    /// cursors.
    ///
    /// # Panics
    ///
    /// Panics if `index + 8` exceeds the capacity.
    pub fn put_u64_ne(&mut self, index: usize, value: u64) {
        self.buf[index..index + WORD].copy_from_slice(&value.to_ne_bytes());
    }

    /// Writes a byte at an absolute index without moving the cursors.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the capacity.
    pub fn put_u8(&mut self, index: usize, value: u8) {
        self.buf[index] = value;
    }
}

impl fmt::Debug for NativeBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBytes")
            .field("capacity", &self.capacity())
            .field("position", &self.position)
            .field("limit", &self.limit)
            .finish()
    }
}
