//! Benchmarks for KVBridge.

#![warn(missing_docs)]

pub mod utils;
