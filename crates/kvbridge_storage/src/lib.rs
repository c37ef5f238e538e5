//! # KVBridge Storage
//!
//! The storage-engine side of the KVBridge replication bridge.
//!
//! This crate defines what the bridge consumes from a key-value engine:
//!
//! - [`NativeBytes`] - the engine's native, position/limit byte buffer
//! - [`ReplicationStore`] - mutation entry points and per-peer bookkeeping
//! - [`ModificationCursor`] - a per-peer cursor over the outgoing change log
//!
//! It also ships [`InMemoryStore`], a reference multi-master engine with
//! last-writer-wins conflict resolution, used by tests and simulations.
//!
//! ## Design Principles
//!
//! - The engine owns the canonical data and decides conflict outcomes
//! - Change buffers belong to the cursor and are reused on every pop
//! - Stores must be `Send + Sync` and synchronize internally
//!
//! ## Example
//!
//! ```rust
//! use kvbridge_storage::{InMemoryStore, NativeBytes, ReplicationStore};
//!
//! let store = InMemoryStore::new(1).unwrap();
//! let key = NativeBytes::from_vec(b"k1".to_vec());
//! let value = NativeBytes::from_vec(b"v1".to_vec());
//! store.put(&key, &value, 2, 1000).unwrap();
//! assert_eq!(store.get(b"k1"), Some(b"v1".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod native;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryStore, StoredRecord};
pub use native::NativeBytes;
pub use store::{ChangeNotifier, ModificationCursor, NativeChange, ReplicationStore};
