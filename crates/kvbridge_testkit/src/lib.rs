//! # KVBridge Testkit
//!
//! Test utilities for KVBridge.
//!
//! This crate provides:
//! - Multi-node cluster fixtures wired through the replication bridge
//! - Seeded random workloads for simulations
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent apply and drain
//!
//! ## Usage
//!
//! ```rust
//! use kvbridge_testkit::prelude::*;
//!
//! let mut cluster = TestCluster::new(3).unwrap();
//! cluster.node(0).store.put_local(b"k", b"v").unwrap();
//!
//! let stats = cluster.pump_until_quiescent(16).unwrap();
//! assert!(stats.quiescent);
//! assert!(cluster.is_converged());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod workload;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::workload::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use workload::*;
