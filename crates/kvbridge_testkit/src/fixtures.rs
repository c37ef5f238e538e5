//! Cluster fixtures.
//!
//! A [`TestCluster`] is a full mesh of in-memory nodes, each bound to its own
//! [`EngineReplicator`]. Every ordered pair of nodes has a link holding the
//! sender's iterator for the receiver, and pumping a link forwards entries
//! straight from the sender's iterator into the receiver's `apply`.

use kvbridge_core::{
    BridgeConfig, BridgeError, BridgeResult, EngineReplicator, ModificationIterator,
    ReplicationEntry,
};
use kvbridge_storage::{InMemoryStore, ReplicationStore, StorageError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One node of a [`TestCluster`].
#[derive(Debug)]
pub struct TestNode {
    /// The node's store.
    pub store: Arc<InMemoryStore>,
    /// The node's replicator, bound to `store`.
    pub replicator: EngineReplicator,
}

impl TestNode {
    /// Creates a node with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if `identifier` is reserved.
    pub fn new(identifier: u8, config: BridgeConfig) -> BridgeResult<Self> {
        let store = Arc::new(InMemoryStore::new(identifier)?);
        let replicator = EngineReplicator::bound(store.clone(), config);
        Ok(Self { store, replicator })
    }

    /// Returns the node identifier.
    pub fn identifier(&self) -> u8 {
        self.store.identifier()
    }
}

/// A sender iterator for one ordered pair of nodes.
struct Link {
    from: usize,
    to: usize,
    iterator: ModificationIterator,
}

/// Outcome of [`TestCluster::pump_until_quiescent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Pump rounds run, including the final empty one.
    pub rounds: usize,
    /// Entries delivered across all links.
    pub delivered: usize,
    /// True if the last round delivered nothing.
    pub quiescent: bool,
}

/// A fully meshed set of in-memory nodes with identifiers `1..=size`.
pub struct TestCluster {
    nodes: Vec<TestNode>,
    links: Vec<Link>,
}

impl TestCluster {
    /// Creates a cluster of `size` nodes with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` exceeds the identifier space.
    pub fn new(size: usize) -> BridgeResult<Self> {
        Self::with_config(size, BridgeConfig::default())
    }

    /// Creates a cluster of `size` nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` exceeds the identifier space or `config`
    /// is invalid.
    pub fn with_config(size: usize, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        let mut nodes = Vec::with_capacity(size);
        for index in 0..size {
            let identifier = u8::try_from(index + 1)
                .map_err(|_| StorageError::invalid_identifier(u8::MAX, "cluster too large"))?;
            nodes.push(TestNode::new(identifier, config.clone())?);
        }

        let mut links = Vec::with_capacity(size * size.saturating_sub(1));
        for from in 0..size {
            for to in 0..size {
                if from == to {
                    continue;
                }
                let remote = nodes[to].identifier();
                let iterator = nodes[from].replicator.acquire_modification_iterator(remote)?;
                links.push(Link { from, to, iterator });
            }
        }

        Ok(Self { nodes, links })
    }

    /// Returns the number of nodes.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the node at `index`. Node `index` has identifier `index + 1`.
    pub fn node(&self, index: usize) -> &TestNode {
        &self.nodes[index]
    }

    /// Returns all nodes.
    pub fn nodes(&self) -> &[TestNode] {
        &self.nodes
    }

    /// Drains every link once, applying each entry at its receiver.
    ///
    /// Returns the number of entries delivered.
    ///
    /// # Errors
    ///
    /// Returns the first error from an iterator or an apply.
    pub fn pump(&mut self) -> BridgeResult<usize> {
        let Self { nodes, links } = self;
        let mut delivered = 0;

        for link in links.iter_mut() {
            let receiver = &mut nodes[link.to].replicator;
            let mut failure: Option<BridgeError> = None;

            while link.iterator.advance(|entry: &ReplicationEntry| match receiver.apply(entry) {
                Ok(()) => true,
                Err(err) => {
                    failure = Some(err);
                    false
                }
            })? {
                if let Some(err) = failure.take() {
                    return Err(err);
                }
                delivered += 1;
            }
            debug!(from = link.from, to = link.to, "pumped link");
        }

        Ok(delivered)
    }

    /// Pumps until a round delivers nothing or `max_rounds` have run.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`pump`](Self::pump).
    pub fn pump_until_quiescent(&mut self, max_rounds: usize) -> BridgeResult<PumpStats> {
        let mut stats = PumpStats {
            rounds: 0,
            delivered: 0,
            quiescent: false,
        };
        while stats.rounds < max_rounds {
            let delivered = self.pump()?;
            stats.rounds += 1;
            stats.delivered += delivered;
            if delivered == 0 {
                stats.quiescent = true;
                break;
            }
        }
        Ok(stats)
    }

    /// Returns each node's live key/value pairs, in node order.
    pub fn snapshots(&self) -> Vec<BTreeMap<Vec<u8>, Vec<u8>>> {
        self.nodes.iter().map(|node| node.store.snapshot()).collect()
    }

    /// Returns true if every node holds the same live data.
    pub fn is_converged(&self) -> bool {
        let snapshots = self.snapshots();
        snapshots.windows(2).all(|pair| pair[0] == pair[1])
    }
}

impl std::fmt::Debug for TestCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCluster")
            .field("nodes", &self.nodes.len())
            .field("links", &self.links.len())
            .finish()
    }
}
