//! One-shot promotion broadcast.
//!
//! The gate starts `Pending` and moves exactly once, either to `Released`
//! (promotion) or to `Closed` (the node stopped first). Any number of tasks may
//! wait on it; all of them observe the same transition.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::NodeIdentity;

pub type PromotionCallback = Box<dyn FnOnce(&NodeIdentity) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Pending,
    Released,
    Closed,
}

#[derive(Debug)]
pub struct PromotionGate {
    tx: watch::Sender<GateStatus>,
}

impl Default for PromotionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PromotionGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateStatus::Pending);
        Self { tx }
    }

    pub fn status(&self) -> GateStatus {
        *self.tx.borrow()
    }

    /// Returns `true` only for the call that moved the gate to `Released`.
    pub fn release(&self) -> bool {
        self.settle(GateStatus::Released)
    }

    /// Wakes waiters without promoting. No-op once settled.
    pub fn close(&self) -> bool {
        self.settle(GateStatus::Closed)
    }

    fn settle(
        &self,
        to: GateStatus,
    ) -> bool {
        self.tx.send_if_modified(|status| {
            if *status == GateStatus::Pending {
                *status = to;
                true
            } else {
                false
            }
        })
    }

    /// Suspends until the gate settles and returns how it settled.
    pub async fn wait(&self) -> GateStatus {
        let mut rx = self.tx.subscribe();
        let settled = match rx.wait_for(|status| *status != GateStatus::Pending).await {
            Ok(status) => *status,
            Err(_) => GateStatus::Closed,
        };
        settled
    }
}

/// Holds at most one callback; registering replaces the previous one.
#[derive(Default)]
pub(crate) struct CallbackSlot {
    slot: Mutex<Option<PromotionCallback>>,
}

impl CallbackSlot {
    /// Returns `true` if a previous callback was discarded.
    pub(crate) fn replace(
        &self,
        callback: PromotionCallback,
    ) -> bool {
        self.slot.lock().replace(callback).is_some()
    }

    pub(crate) fn take(&self) -> Option<PromotionCallback> {
        self.slot.lock().take()
    }
}
