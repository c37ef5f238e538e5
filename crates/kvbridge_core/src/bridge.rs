//! Buffer bridge between the engine's native buffers and canonical regions.
//!
//! Keys and values cross between two representations on every mutation:
//! the engine's [`NativeBytes`] and the bridge's canonical [`ByteRegion`]
//! (plus the `bytes` crate types a transport layer decodes into). Each side
//! plugs in through a narrow capability:
//!
//! - [`RegionSource`] - a readable region of known length
//! - [`RegionSink`] - a reusable destination that can be sized for a region
//!
//! [`copy_region`] is the only copy routine. It sizes the destination first,
//! then moves whole 8-byte words followed by a byte-wise tail. The word loop
//! is a throughput choice only; the output is identical to a byte-by-byte
//! copy.
//!
//! # Byte order
//!
//! Words are read and written in host-native order on both sides, so a copy
//! is a plain memory transfer. Exchanging buffers between hosts of different
//! endianness is out of scope.

use crate::error::{BridgeError, BridgeResult};
use crate::region::ByteRegion;
use bytes::{Bytes, BytesMut};
use kvbridge_storage::NativeBytes;
use tracing::trace;

const WORD: usize = std::mem::size_of::<u64>();

/// A contiguous readable byte region.
pub trait RegionSource {
    /// Number of readable bytes.
    fn region_len(&self) -> usize;

    /// Reads the native-endian word starting `offset` bytes into the region.
    /// `offset + 8` never exceeds `region_len()` when called by the bridge.
    fn word_at(&self, offset: usize) -> u64;

    /// Reads the byte `offset` bytes into the region.
    fn byte_at(&self, offset: usize) -> u8;
}

/// A reusable destination for a copied region.
pub trait RegionSink {
    /// Sizes the sink so that exactly `len` bytes starting at offset 0 form
    /// its readable region, replacing the allocation if it is too small.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Allocation`] if a larger allocation cannot be
    /// obtained. The sink is unchanged in that case.
    fn prepare(&mut self, len: usize) -> BridgeResult<()>;

    /// Writes a native-endian word at `offset`.
    fn put_word(&mut self, offset: usize, word: u64);

    /// Writes a byte at `offset`.
    fn put_byte(&mut self, offset: usize, byte: u8);
}

/// Copies the readable region of `src` into `dst`.
///
/// `dst` is grown first if needed, so a failure never leaves it partially
/// written. Returns the number of bytes copied. Zero-length regions are valid
/// and leave `dst` empty.
///
/// # Errors
///
/// Returns [`BridgeError::Allocation`] if `dst` cannot be grown.
///
/// # Example
///
/// ```rust
/// use kvbridge_core::{copy_region, ByteRegion};
/// use kvbridge_storage::NativeBytes;
///
/// let native = NativeBytes::from_vec(b"hello, bridge".to_vec());
/// let mut region = ByteRegion::with_capacity(4);
///
/// let copied = copy_region(&native, &mut region).unwrap();
/// assert_eq!(copied, 13);
/// assert_eq!(region.as_slice(), b"hello, bridge");
/// ```
pub fn copy_region<S, D>(src: &S, dst: &mut D) -> BridgeResult<usize>
where
    S: RegionSource + ?Sized,
    D: RegionSink + ?Sized,
{
    let len = src.region_len();
    dst.prepare(len)?;

    let mut offset = 0;
    while len - offset >= WORD {
        dst.put_word(offset, src.word_at(offset));
        offset += WORD;
    }
    while offset < len {
        dst.put_byte(offset, src.byte_at(offset));
        offset += 1;
    }
    Ok(len)
}

/// Allocates a zeroed buffer of exactly `len` bytes, reporting failure
/// instead of aborting.
pub(crate) fn allocate(len: usize) -> BridgeResult<Box<[u8]>> {
    let mut fresh = Vec::new();
    fresh
        .try_reserve_exact(len)
        .map_err(|_| BridgeError::Allocation { requested: len })?;
    fresh.resize(len, 0);
    trace!(len, "allocated replacement buffer");
    Ok(fresh.into_boxed_slice())
}

fn slice_word(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[offset..offset + WORD]);
    u64::from_ne_bytes(word)
}

impl RegionSource for [u8] {
    fn region_len(&self) -> usize {
        self.len()
    }

    fn word_at(&self, offset: usize) -> u64 {
        slice_word(self, offset)
    }

    fn byte_at(&self, offset: usize) -> u8 {
        self[offset]
    }
}

impl RegionSource for Bytes {
    fn region_len(&self) -> usize {
        self.len()
    }

    fn word_at(&self, offset: usize) -> u64 {
        slice_word(self, offset)
    }

    fn byte_at(&self, offset: usize) -> u8 {
        self[offset]
    }
}

impl RegionSource for BytesMut {
    fn region_len(&self) -> usize {
        self.len()
    }

    fn word_at(&self, offset: usize) -> u64 {
        slice_word(self, offset)
    }

    fn byte_at(&self, offset: usize) -> u8 {
        self[offset]
    }
}

impl RegionSource for ByteRegion {
    fn region_len(&self) -> usize {
        self.len()
    }

    fn word_at(&self, offset: usize) -> u64 {
        slice_word(self.as_slice(), offset)
    }

    fn byte_at(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }
}

impl RegionSource for NativeBytes {
    fn region_len(&self) -> usize {
        self.remaining()
    }

    fn word_at(&self, offset: usize) -> u64 {
        self.get_u64_ne(self.position() + offset)
    }

    fn byte_at(&self, offset: usize) -> u8 {
        self.get_u8(self.position() + offset)
    }
}

impl RegionSink for ByteRegion {
    fn prepare(&mut self, len: usize) -> BridgeResult<()> {
        self.prepare_window(len)
    }

    fn put_word(&mut self, offset: usize, word: u64) {
        self.buf_mut()[offset..offset + WORD].copy_from_slice(&word.to_ne_bytes());
    }

    fn put_byte(&mut self, offset: usize, byte: u8) {
        self.buf_mut()[offset] = byte;
    }
}

impl RegionSink for NativeBytes {
    fn prepare(&mut self, len: usize) -> BridgeResult<()> {
        if len > self.capacity() {
            *self = NativeBytes::from_boxed(allocate(len)?);
        }
        self.clear();
        self.set_limit(len);
        Ok(())
    }

    fn put_word(&mut self, offset: usize, word: u64) {
        self.put_u64_ne(offset, word);
    }

    fn put_byte(&mut self, offset: usize, byte: u8) {
        self.put_u8(offset, byte);
    }
}

/// A reusable pair of native key/value buffers.
///
/// One pair belongs to each replicator context and carries entries into the
/// engine's native representation on the apply path.
#[derive(Debug)]
pub struct NativeBuffers {
    key: NativeBytes,
    value: NativeBytes,
}

impl NativeBuffers {
    /// Creates a pair with `capacity` bytes per buffer.
    pub fn new(capacity: usize) -> Self {
        Self {
            key: NativeBytes::with_capacity(capacity),
            value: NativeBytes::with_capacity(capacity),
        }
    }

    /// Copies `key` into the key buffer and returns a view of it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Allocation`] if the buffer cannot be grown.
    pub fn load_key<K>(&mut self, key: &K) -> BridgeResult<&NativeBytes>
    where
        K: RegionSource + ?Sized,
    {
        copy_region(key, &mut self.key)?;
        Ok(&self.key)
    }

    /// Copies `key` and `value` into the pair and returns views of both.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Allocation`] if a buffer cannot be grown.
    pub fn load_pair<K, V>(
        &mut self,
        key: &K,
        value: &V,
    ) -> BridgeResult<(&NativeBytes, &NativeBytes)>
    where
        K: RegionSource + ?Sized,
        V: RegionSource + ?Sized,
    {
        copy_region(key, &mut self.key)?;
        copy_region(value, &mut self.value)?;
        Ok((&self.key, &self.value))
    }

    /// Returns the current key buffer capacity.
    pub fn key_capacity(&self) -> usize {
        self.key.capacity()
    }

    /// Returns the current value buffer capacity.
    pub fn value_capacity(&self) -> usize {
        self.value.capacity()
    }
}
