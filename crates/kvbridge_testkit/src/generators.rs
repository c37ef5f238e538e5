//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random replication data
//! that maintains required invariants.

use kvbridge_core::ReplicationEntry;
use proptest::prelude::*;

/// Strategy for generating valid node identifiers (1..=254).
pub fn identifier_strategy() -> impl Strategy<Value = u8> {
    1u8..=254
}

/// Strategy for generating non-empty keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

/// Strategy for generating values, including empty ones.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..1024)
}

/// Strategy for generating region contents that straddle word boundaries.
pub fn region_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        3 => prop::collection::vec(any::<u8>(), 0..24),
        1 => prop::collection::vec(any::<u8>(), 24..4096),
    ]
}

/// Strategy for generating put or tombstone entries.
pub fn entry_strategy() -> impl Strategy<Value = ReplicationEntry> {
    (
        key_strategy(),
        prop::option::weighted(0.8, value_strategy()),
        identifier_strategy(),
        1i64..i64::MAX,
    )
        .prop_map(|(key, value, identifier, timestamp)| match value {
            Some(value) => ReplicationEntry::put(&key, &value, identifier, timestamp),
            None => ReplicationEntry::tombstone(&key, identifier, timestamp),
        })
}

/// A local mutation issued at one node of a cluster.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Write a value.
    Put {
        /// Index of the node issuing the write
        node: usize,
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Index of the node issuing the delete
        node: usize,
        /// Key
        key: Vec<u8>,
    },
}

/// Strategy for generating mutations over a small key space, so that nodes
/// conflict often.
pub fn mutation_strategy(nodes: usize) -> impl Strategy<Value = Mutation> {
    let key = (0u8..8).prop_map(|k| vec![b'k', k]);
    prop_oneof![
        3 => (0..nodes, key.clone(), value_strategy())
            .prop_map(|(node, key, value)| Mutation::Put { node, key, value }),
        1 => (0..nodes, key).prop_map(|(node, key)| Mutation::Delete { node, key }),
    ]
}

/// Strategy for generating a sequence of mutations.
pub fn mutation_sequence_strategy(
    nodes: usize,
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Mutation>> {
    prop::collection::vec(mutation_strategy(nodes), min_ops..max_ops)
}

/// Proptest configuration for cluster properties. Each case pumps a whole
/// mesh, so fewer cases run than proptest's default.
#[must_use]
pub fn cluster_proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 32,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbridge_core::is_valid_identifier;

    proptest! {
        #![proptest_config(cluster_proptest_config())]

        #[test]
        fn identifiers_are_valid(identifier in identifier_strategy()) {
            prop_assert!(is_valid_identifier(identifier));
        }

        #[test]
        fn entries_respect_tombstone_invariant(entry in entry_strategy()) {
            prop_assert!(!entry.key().is_empty());
            prop_assert_eq!(entry.is_deleted(), entry.value().is_none());
        }

        #[test]
        fn mutations_target_existing_nodes(ops in mutation_sequence_strategy(3, 1, 20)) {
            for op in ops {
                let node = match op {
                    Mutation::Put { node, .. } | Mutation::Delete { node, .. } => node,
                };
                prop_assert!(node < 3);
            }
        }
    }
}
