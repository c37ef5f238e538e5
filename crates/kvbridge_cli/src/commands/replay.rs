//! Replay command implementation.

use kvbridge_core::{
    BridgeConfig, BridgeError, BridgeResult, EngineReplicator, ModificationIterator,
    ReplicationEntry,
};
use kvbridge_storage::InMemoryStore;
use std::sync::Arc;

const SENDER: u8 = 1;
const RECEIVER: u8 = 2;
const ORIGIN: u8 = 3;

/// Runs the replay command.
///
/// Node 1 holds `count` changes authored by node 3, stamped 100, 200 and so
/// on. Node 2 applies everything node 1 sends and records the newest
/// timestamp it received from node 1. Node 2 then reconnects, and node 1
/// replays everything at or after `from`.
pub fn run(from: i64, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mut sender = EngineReplicator::bound(
        Arc::new(InMemoryStore::new(SENDER)?),
        BridgeConfig::default(),
    );
    let receiver_store = Arc::new(InMemoryStore::new(RECEIVER)?);
    let mut receiver = EngineReplicator::bound(receiver_store.clone(), BridgeConfig::default());

    for i in 1..=count {
        let key = format!("key-{i}");
        let value = format!("value-{i}");
        let entry = ReplicationEntry::put(key.as_bytes(), value.as_bytes(), ORIGIN, i as i64 * 100);
        sender.apply(&entry)?;
    }

    let mut outgoing = sender.acquire_modification_iterator(RECEIVER)?;

    println!("Initial delivery from node {SENDER} to node {RECEIVER}:");
    let delivered = deliver(&mut outgoing, &mut receiver)?;
    println!("  ({delivered} changes, {} live keys at node {RECEIVER})", receiver_store.len());
    println!();

    outgoing.mark_consumed_from(from)?;
    println!("Replay from timestamp {from}:");
    let replayed = deliver(&mut outgoing, &mut receiver)?;
    println!("  ({replayed} changes)");
    println!();

    println!(
        "Last modification time node {RECEIVER} recorded from node {SENDER}: {}",
        receiver.last_modification_time(SENDER)?
    );
    Ok(())
}

/// Applies every pending change at `receiver`, then records the newest
/// timestamp of the batch against the sending peer.
fn deliver(
    outgoing: &mut ModificationIterator,
    receiver: &mut EngineReplicator,
) -> BridgeResult<usize> {
    let mut delivered = 0;
    let mut newest = receiver.last_modification_time(SENDER)?;
    let mut failure: Option<BridgeError> = None;

    while outgoing.advance(|entry: &ReplicationEntry| {
        print_entry(entry);
        match receiver.apply(entry) {
            Ok(()) => {
                newest = newest.max(entry.timestamp());
                true
            }
            Err(err) => {
                failure = Some(err);
                false
            }
        }
    })? {
        if let Some(err) = failure.take() {
            return Err(err);
        }
        delivered += 1;
    }

    if delivered > 0 {
        receiver.set_last_modification_time(SENDER, newest)?;
    }
    Ok(delivered)
}

fn print_entry(entry: &ReplicationEntry) {
    println!(
        "  ts={:<6} key={:<8} origin={} bootstrap={}",
        entry.timestamp(),
        String::from_utf8_lossy(entry.key()),
        entry.identifier(),
        entry.bootstrap_timestamp()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_runs() {
        assert!(run(300, 5).is_ok());
    }

    #[test]
    fn test_replay_with_nothing_pending() {
        assert!(run(0, 0).is_ok());
    }

    #[test]
    fn test_receiver_records_newest_timestamp() {
        let sender = EngineReplicator::bound(
            Arc::new(InMemoryStore::new(SENDER).unwrap()),
            BridgeConfig::default(),
        );
        let mut receiver = EngineReplicator::bound(
            Arc::new(InMemoryStore::new(RECEIVER).unwrap()),
            BridgeConfig::default(),
        );
        let mut writer = sender.clone();
        for (key, timestamp) in [(b"b", 200), (b"a", 100), (b"c", 300)] {
            writer
                .apply(&ReplicationEntry::put(key, b"v", ORIGIN, timestamp))
                .unwrap();
        }

        let mut outgoing = sender.acquire_modification_iterator(RECEIVER).unwrap();
        assert_eq!(deliver(&mut outgoing, &mut receiver).unwrap(), 3);
        assert_eq!(receiver.last_modification_time(SENDER).unwrap(), 300);
        assert_eq!(sender.last_modification_time(RECEIVER).unwrap(), 0);

        // A replay of older changes does not move the mark backwards.
        outgoing.mark_consumed_from(200).unwrap();
        assert_eq!(deliver(&mut outgoing, &mut receiver).unwrap(), 2);
        assert_eq!(receiver.last_modification_time(SENDER).unwrap(), 300);
    }
}
