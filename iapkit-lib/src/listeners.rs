//! Purchase event listeners.
//!
//! The session broadcasts every resolved purchase outcome to all registered
//! listeners, whether or not a purchase request was waiting for it. Outcomes
//! the backend pushes on its own (a purchase finished on another device, a
//! pending payment that cleared) reach listeners the same way.
//!
//! # Thread Safety
//!
//! Listener sets use `RwLock`. Delivery iterates a snapshot taken under the
//! read lock, so listeners may add or remove listeners while being notified.
//! A listener that panics is logged and skipped; the remaining listeners are
//! still notified.

use crate::models::Purchase;
use crate::IapError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// Receives every successful purchase update.
pub trait PurchaseUpdateListener: Send + Sync {
    /// Called once per purchase in a resolved outcome.
    fn on_purchase_updated(&self, purchase: &Purchase);
}

/// Receives every purchase error, including informational user cancellations.
pub trait PurchaseErrorListener: Send + Sync {
    /// Called once per failed outcome.
    fn on_purchase_error(&self, error: &IapError);
}

impl<F> PurchaseUpdateListener for F
where
    F: Fn(&Purchase) + Send + Sync,
{
    fn on_purchase_updated(&self, purchase: &Purchase) {
        self(purchase)
    }
}

impl<F> PurchaseErrorListener for F
where
    F: Fn(&IapError) + Send + Sync,
{
    fn on_purchase_error(&self, error: &IapError) {
        self(error)
    }
}

/// A set of listeners keyed by `Arc` identity.
pub struct ListenerSet<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<L: ?Sized> ListenerSet<L> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Adds a listener. Returns false if this exact listener is already present.
    pub fn add(&self, listener: Arc<L>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    /// Returns true if this exact listener is registered.
    pub fn contains(&self, listener: &Arc<L>) -> bool {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        listeners.iter().any(|l| same_listener(l, listener))
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        listeners.len()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every listener.
    pub fn clear(&self) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.clear();
    }

    fn snapshot(&self) -> Vec<Arc<L>> {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        listeners.clone()
    }

    /// Calls `deliver` for every listener, isolating panics.
    ///
    /// Returns the number of listeners that returned normally.
    pub fn notify<F>(&self, deliver: F) -> usize
    where
        F: Fn(&L),
    {
        let mut delivered = 0;
        for listener in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| deliver(listener.as_ref()))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!("purchase listener panicked during delivery; skipped"),
            }
        }
        delivered
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// The update and error listener sets owned by one session.
#[derive(Default)]
pub struct EventFanout {
    updates: ListenerSet<dyn PurchaseUpdateListener>,
    errors: ListenerSet<dyn PurchaseErrorListener>,
}

impl EventFanout {
    /// Creates a registry with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update listeners.
    pub fn updates(&self) -> &ListenerSet<dyn PurchaseUpdateListener> {
        &self.updates
    }

    /// Error listeners.
    pub fn errors(&self) -> &ListenerSet<dyn PurchaseErrorListener> {
        &self.errors
    }

    /// Delivers each purchase to every update listener.
    pub fn broadcast_purchases(&self, purchases: &[Purchase]) {
        for purchase in purchases {
            self.updates.notify(|l| l.on_purchase_updated(purchase));
        }
    }

    /// Delivers an error to every error listener.
    pub fn broadcast_error(&self, error: &IapError) {
        self.errors.notify(|l| l.on_purchase_error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProductKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn PurchaseUpdateListener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let listener: Arc<dyn PurchaseUpdateListener> = Arc::new(move |_: &Purchase| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn test_add_is_idempotent() {
        let fanout = EventFanout::new();
        let (count, listener) = counter();

        assert!(fanout.updates().add(listener.clone()));
        assert!(!fanout.updates().add(listener.clone()));
        assert_eq!(fanout.updates().len(), 1);

        fanout.broadcast_purchases(&[Purchase::new("t", "sku", ProductKind::InApp)]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_stops_delivery() {
        let fanout = EventFanout::new();
        let (count, listener) = counter();
        fanout.updates().add(listener.clone());

        let purchase = Purchase::new("t", "sku", ProductKind::InApp);
        fanout.broadcast_purchases(std::slice::from_ref(&purchase));
        assert!(fanout.updates().remove(&listener));
        assert!(!fanout.updates().remove(&listener));
        fanout.broadcast_purchases(std::slice::from_ref(&purchase));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let fanout = EventFanout::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let bad: Arc<dyn PurchaseErrorListener> = Arc::new(|_: &IapError| panic!("listener bug"));
        let s = seen.clone();
        let good: Arc<dyn PurchaseErrorListener> = Arc::new(move |_: &IapError| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        fanout.errors().add(bad);
        fanout.errors().add(good);

        fanout.broadcast_error(&IapError::ServiceTimeout);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_closures_are_distinct_listeners() {
        let set: ListenerSet<dyn PurchaseErrorListener> = ListenerSet::new();
        let a: Arc<dyn PurchaseErrorListener> = Arc::new(|_: &IapError| {});
        let b: Arc<dyn PurchaseErrorListener> = Arc::new(|_: &IapError| {});
        assert!(set.add(a.clone()));
        assert!(set.add(b.clone()));
        assert!(set.contains(&a));
        set.clear();
        assert!(set.is_empty());
    }
}
