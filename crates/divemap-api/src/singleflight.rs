//! Single-flight execution cell
//!
//! Mutual-exclusion primitive for the refresh cycle: the first caller becomes
//! the leader and runs the operation; callers arriving before it settles
//! subscribe to a broadcast of the outcome instead of starting their own
//! execution. The in-flight slot is cleared before the outcome is published,
//! so a caller arriving after settlement starts a fresh cycle.
//!
//! Invariants:
//! - at most one execution is in flight at any time
//! - every waiter subscribed to a cycle observes that cycle's outcome,
//!   exactly once, and only after the outcome is known
//! - a leader dropped mid-flight (caller cancelled) releases the slot, and
//!   its waiters elect a new leader instead of hanging

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

pub(crate) struct SingleFlight<T: Clone> {
    inflight: Mutex<Option<broadcast::Sender<T>>>,
}

enum Role<T> {
    Leader(broadcast::Sender<T>),
    Waiter(broadcast::Receiver<T>),
}

/// Clears the in-flight slot when the leader settles or is dropped.
struct SlotGuard<'a, T: Clone> {
    slot: &'a Mutex<Option<broadcast::Sender<T>>>,
}

impl<T: Clone> Drop for SlotGuard<'_, T> {
    fn drop(&mut self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl<T: Clone> SingleFlight<T> {
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(None),
        }
    }

    /// Run `make()` single-flight.
    ///
    /// The slot is only ever touched synchronously under the lock; the
    /// operation itself runs outside it.
    pub(crate) async fn run<F, Fut>(&self, make: F) -> T
    where
        F: Fn() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            let role = {
                let mut slot = self
                    .inflight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                match slot.as_ref() {
                    Some(sender) => Role::Waiter(sender.subscribe()),
                    None => {
                        // One value per channel, published once at settlement
                        let (sender, _) = broadcast::channel(1);
                        *slot = Some(sender.clone());
                        Role::Leader(sender)
                    }
                }
            };

            match role {
                Role::Waiter(mut receiver) => match receiver.recv().await {
                    Ok(outcome) => return outcome,
                    // Leader dropped without publishing; elect a new one.
                    Err(_) => continue,
                },
                Role::Leader(sender) => {
                    let guard = SlotGuard {
                        slot: &self.inflight,
                    };
                    let outcome = make().await;
                    // Release the slot before publishing: callers arriving
                    // from here on start a fresh cycle rather than observing
                    // a settled one.
                    drop(guard);
                    let _ = sender.send(outcome.clone());
                    return outcome;
                }
            }
        }
    }
}
