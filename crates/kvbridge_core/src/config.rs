//! Configuration for the replication bridge.

use crate::error::{BridgeError, BridgeResult};

/// Default starting capacity of every reusable key and value buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Configuration shared by a replicator and the iterators it hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Starting capacity, in bytes, of each reusable key/value buffer.
    /// Buffers grow past this on demand and never shrink.
    pub initial_buffer_capacity: usize,
}

impl BridgeConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Sets the initial buffer capacity.
    pub fn with_initial_buffer_capacity(mut self, capacity: usize) -> Self {
        self.initial_buffer_capacity = capacity;
        self
    }

    /// Checks the configuration for invalid values.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] if the initial buffer capacity is zero.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.initial_buffer_capacity == 0 {
            return Err(BridgeError::Config(
                "initial_buffer_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}
