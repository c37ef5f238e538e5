//! Async wakeups for peer senders.

use crate::iterator::ModificationNotifier;
use std::sync::Arc;
use tokio::sync::Notify;

/// A [`ModificationNotifier`] an async sender can wait on.
///
/// A change signalled while nobody is waiting is kept as a single permit,
/// so the usual loop of draining and then awaiting never misses a wakeup:
///
/// ```rust,no_run
/// # async fn send_loop(mut iterator: kvbridge_core::ModificationIterator) -> kvbridge_core::BridgeResult<()> {
/// use kvbridge_core::ChangeSignal;
///
/// let signal = ChangeSignal::new();
/// iterator.register_change_notifier(signal.clone());
/// loop {
///     while iterator.next_entry(|entry| println!("{entry}"))? {}
///     signal.changed().await;
/// }
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeSignal {
    notify: Arc<Notify>,
}

impl ChangeSignal {
    /// Creates a signal with no stored permit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until a change has been signalled since the last wait.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

impl ModificationNotifier for ChangeSignal {
    fn on_change(&self) {
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn stored_permit_wakes_later_waiter() {
        let signal = ChangeSignal::new();
        signal.on_change();

        timeout(Duration::from_secs(1), signal.changed())
            .await
            .expect("permit should be stored");
    }

    #[tokio::test]
    async fn permits_do_not_accumulate() {
        let signal = ChangeSignal::new();
        signal.on_change();
        signal.on_change();

        signal.changed().await;
        assert!(timeout(Duration::from_millis(20), signal.changed())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let signal = ChangeSignal::new();
        let notifier = signal.clone();

        let waiter = tokio::spawn(async move { signal.changed().await });
        tokio::task::yield_now().await;
        notifier.on_change();

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
