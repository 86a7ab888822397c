//! Matches a launched purchase flow with the push outcome that answers it.
//!
//! The backend reports purchase results on its push channel, not as the reply
//! to `launch_purchase_flow`. A requester opens the single slot before the
//! launch and awaits the receiver; whoever dispatches the next outcome takes
//! the slot and completes it.

use crate::backend::PurchasesUpdate;
use crate::{IapError, ProductId};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// An open slot.
struct Slot {
    product_ids: Vec<ProductId>,
    tx: oneshot::Sender<PurchasesUpdate>,
}

/// Slot taken off the correlator, ready to be completed.
pub struct ResolvedSlot {
    product_ids: Vec<ProductId>,
    tx: oneshot::Sender<PurchasesUpdate>,
}

impl ResolvedSlot {
    /// Ids the slot was opened for.
    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    /// Hand the outcome to the requester.
    ///
    /// Returns false if the requester stopped waiting.
    pub fn complete(self, update: PurchasesUpdate) -> bool {
        self.tx.send(update).is_ok()
    }
}

/// Single-slot purchase correlator.
#[derive(Default)]
pub struct PurchaseCorrelator {
    slot: Mutex<Option<Slot>>,
}

impl PurchaseCorrelator {
    /// Create a correlator with no open slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the slot for `product_ids`.
    ///
    /// Fails with [`IapError::PurchaseInProgress`] while another slot is open.
    pub fn open(
        &self,
        product_ids: &[ProductId],
    ) -> crate::Result<oneshot::Receiver<PurchasesUpdate>> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(IapError::PurchaseInProgress);
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some(Slot {
            product_ids: product_ids.to_vec(),
            tx,
        });
        Ok(rx)
    }

    /// Take the open slot, if any. The correlator is empty afterwards.
    pub fn take(&self) -> Option<ResolvedSlot> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.take().map(|s| ResolvedSlot {
            product_ids: s.product_ids,
            tx: s.tx,
        })
    }

    /// Returns true while a slot is open.
    pub fn is_open(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.is_some()
    }

    /// Ids owned by the open slot.
    pub fn owned_ids(&self) -> Vec<ProductId> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|s| s.product_ids.clone()).unwrap_or_default()
    }
}
