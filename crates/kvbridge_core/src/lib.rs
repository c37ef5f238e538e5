//! # KVBridge Core
//!
//! Connects a key-value engine's change tracking to a peer-to-peer
//! replication framework.
//!
//! This crate provides:
//! - [`ByteRegion`] and the [`copy_region`] bridge between the engine's
//!   native buffers and canonical regions
//! - [`ReplicationEntry`], the unit exchanged between nodes
//! - [`ModificationIterator`], a per-peer adapter over the store's change
//!   cursor
//! - [`EngineReplicator`], the facade a replication framework drives
//! - [`ChangeSignal`], an async wakeup for sender tasks
//!
//! ## Buffer ownership
//!
//! Every reusable buffer belongs to exactly one `&mut self` context: an
//! iterator owns its entry, a replicator context owns its native buffers.
//! Entries handed to callbacks are borrows that end when the callback
//! returns; copy out anything that must outlive it.
//!
//! ## Example
//!
//! ```rust
//! use kvbridge_core::{BridgeConfig, EngineReplicator};
//! use kvbridge_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let node1 = Arc::new(InMemoryStore::new(1).unwrap());
//! let node2 = Arc::new(InMemoryStore::new(2).unwrap());
//! let one = EngineReplicator::bound(node1.clone(), BridgeConfig::default());
//! let mut two = EngineReplicator::bound(node2.clone(), BridgeConfig::default());
//!
//! node1.put_local(b"k1", b"v1").unwrap();
//!
//! let mut outgoing = one.acquire_modification_iterator(2).unwrap();
//! let mut received = Vec::new();
//! while outgoing.next_entry(|entry| received.push(entry.clone())).unwrap() {}
//! for entry in &received {
//!     two.apply(entry).unwrap();
//! }
//!
//! assert_eq!(node2.get(b"k1"), Some(b"v1".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod config;
mod entry;
mod error;
mod iterator;
mod region;
mod replicator;
mod signal;

pub use bridge::{copy_region, NativeBuffers, RegionSink, RegionSource};
pub use config::{BridgeConfig, DEFAULT_BUFFER_CAPACITY};
pub use entry::{is_valid_identifier, ReplicationEntry, NONE_IDENTIFIER, UNSET_IDENTIFIER};
pub use error::{BridgeError, BridgeResult};
pub use iterator::{EntryCallback, ModificationIterator, ModificationNotifier};
pub use region::ByteRegion;
pub use replicator::EngineReplicator;
pub use signal::ChangeSignal;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
