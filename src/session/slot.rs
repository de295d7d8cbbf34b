//! One-capacity hand-off between the capture thread and the analyzer.

use serde::{Deserialize, Serialize};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// What the producer does when the analyzer has not consumed the
/// previous item yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Replace the pending item with the newer one; never block the producer.
    #[default]
    KeepOnlyLatest,
    /// Block the producer until the pending item is consumed.
    BlockProducer,
}

/// Result of offering an item to a [`LatestSlot`].
#[derive(Debug)]
pub enum Offer<T> {
    /// The item is now pending.
    Accepted,
    /// The item is now pending; the older pending item is returned.
    Replaced(T),
    /// The slot is closed; the item is returned untouched.
    Closed(T),
}

struct SlotState<T> {
    item: Option<T>,
    closed: bool,
}

/// A single-item queue whose producer never waits under
/// [`Backpressure::KeepOnlyLatest`].
///
/// Closing the slot lets the consumer drain the pending item first; use
/// [`LatestSlot::clear_and_close`] to discard it instead.
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    changed: Condvar,
}

impl<T> LatestSlot<T> {
    /// Creates an empty, open slot.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                item: None,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offers an item under the given backpressure policy.
    pub fn offer(&self, item: T, policy: Backpressure) -> Offer<T> {
        let mut state = self.lock();
        if policy == Backpressure::BlockProducer {
            while state.item.is_some() && !state.closed {
                state = self
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        if state.closed {
            return Offer::Closed(item);
        }
        let previous = state.item.replace(item);
        drop(state);
        self.changed.notify_all();
        match previous {
            Some(old) => Offer::Replaced(old),
            None => Offer::Accepted,
        }
    }

    /// Blocks until an item is pending and takes it.
    ///
    /// Returns `None` once the slot is closed and empty.
    pub fn take(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.item.take() {
                drop(state);
                self.changed.notify_all();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Closes the slot; a pending item can still be taken.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    /// Closes the slot and discards any pending item.
    pub fn clear_and_close(&self) {
        let pending = {
            let mut state = self.lock();
            state.closed = true;
            state.item.take()
        };
        self.changed.notify_all();
        drop(pending);
    }

    /// Returns true once the slot has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns true if an item is waiting to be taken.
    pub fn is_pending(&self) -> bool {
        self.lock().item.is_some()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_newer_item_replaces_pending() {
        let slot = LatestSlot::new();
        assert!(matches!(slot.offer(1, Backpressure::KeepOnlyLatest), Offer::Accepted));
        assert!(matches!(slot.offer(2, Backpressure::KeepOnlyLatest), Offer::Replaced(1)));
        assert_eq!(slot.take(), Some(2));
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_close_drains_pending_item() {
        let slot = LatestSlot::new();
        slot.offer("last", Backpressure::KeepOnlyLatest);
        slot.close();

        assert!(matches!(slot.offer("late", Backpressure::KeepOnlyLatest), Offer::Closed("late")));
        assert_eq!(slot.take(), Some("last"));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_clear_and_close_discards() {
        let slot = LatestSlot::new();
        slot.offer(7, Backpressure::KeepOnlyLatest);
        slot.clear_and_close();
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_take_wakes_on_close() {
        let slot: Arc<LatestSlot<u8>> = Arc::new(LatestSlot::new());
        let consumer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take())
        };
        thread::sleep(Duration::from_millis(20));
        slot.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_blocking_producer_waits_for_consumer() {
        let slot = Arc::new(LatestSlot::new());
        slot.offer(1, Backpressure::BlockProducer);

        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || matches!(slot.offer(2, Backpressure::BlockProducer), Offer::Accepted))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(slot.take(), Some(1));
        assert!(producer.join().unwrap());
        assert_eq!(slot.take(), Some(2));
    }

    proptest! {
        #[test]
        fn prop_keep_latest_never_holds_more_than_one(items in proptest::collection::vec(any::<u32>(), 1..64)) {
            let slot = LatestSlot::new();
            let mut displaced = 0usize;
            for &item in &items {
                if let Offer::Replaced(_) = slot.offer(item, Backpressure::KeepOnlyLatest) {
                    displaced += 1;
                }
            }
            prop_assert_eq!(displaced, items.len() - 1);
            prop_assert_eq!(slot.take(), items.last().copied());
            prop_assert!(!slot.is_pending());
        }
    }
}
