//! Observable session status.
//!
//! [`SessionStatus`] is the single consolidated value presentation layers read.
//! Only the session writes it, through [`StatusStore`]; consumers get
//! snapshots or a `tokio::sync::watch` receiver.

use crate::errors::{IapError, IapErrorCode, Severity};
use crate::{now_millis, ProductId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;

/// Connection state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No backend session.
    #[default]
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Backend session established.
    Connected,
}

/// Operations recorded in the status history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    Disconnect,
    ServiceDisconnected,
    FetchProducts,
    AvailablePurchases,
    Restore,
    Purchase,
    PurchaseUpdate,
    FinishTransaction,
    Storefront,
}

/// One history entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// What ran.
    pub operation: Operation,
    /// Whether it succeeded.
    pub ok: bool,
    /// Short human detail.
    pub detail: String,
    /// When it finished (unix epoch millis).
    pub at_ms: i64,
}

/// Outcome of the most recent purchase-related operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResult {
    /// Human message.
    pub message: String,
    /// How the presentation layer should render it.
    pub severity: Severity,
    /// Related product, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    /// Related order / transaction id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl PurchaseResult {
    /// Create a result.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            product_id: None,
            transaction_id: None,
        }
    }

    /// Attach the related product.
    pub fn with_product(mut self, product_id: Option<ProductId>) -> Self {
        self.product_id = product_id;
        self
    }

    /// Attach the related transaction.
    pub fn with_transaction(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }
}

/// Last error as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusError {
    /// Stable code.
    pub code: IapErrorCode,
    /// Human message.
    pub message: String,
}

impl From<&IapError> for StatusError {
    fn from(err: &IapError) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
        }
    }
}

/// Loading flags besides connect (derived from [`ConnectionState::Connecting`])
/// and purchasing (the `purchasing` set).
///
/// Each flag counts overlapping operations so concurrent callers cannot clear
/// each other's flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingFlags {
    fetch_products: u32,
    restore: u32,
}

/// Named loading flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadingFlag {
    /// Product query in progress.
    FetchProducts,
    /// Purchase query / restore in progress.
    Restore,
}

impl LoadingFlags {
    /// Product fetch in progress.
    pub fn fetch_products(&self) -> bool {
        self.fetch_products > 0
    }

    /// Purchase restore in progress.
    pub fn restore(&self) -> bool {
        self.restore > 0
    }

    fn counter(&mut self, flag: LoadingFlag) -> &mut u32 {
        match flag {
            LoadingFlag::FetchProducts => &mut self.fetch_products,
            LoadingFlag::Restore => &mut self.restore,
        }
    }
}

/// Consolidated session status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Connection state.
    pub connection: ConnectionState,
    /// Loading flags.
    pub loading: LoadingFlags,
    /// Products with a purchase flow in progress.
    pub purchasing: BTreeSet<ProductId>,
    /// Most recent purchase outcome.
    pub last_result: Option<PurchaseResult>,
    /// Most recent error. User cancellations never land here.
    pub last_error: Option<StatusError>,
    /// Bounded operation history, oldest first.
    pub history: VecDeque<OperationRecord>,
}

impl SessionStatus {
    /// Backend session is established.
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Connect in progress.
    pub fn is_connecting(&self) -> bool {
        self.connection == ConnectionState::Connecting
    }

    /// A purchase flow for `id` is in progress.
    pub fn is_purchasing(&self, id: &ProductId) -> bool {
        self.purchasing.contains(id)
    }

    /// Any loading flag is set or any purchase is in progress.
    ///
    /// Derived on every call; never stored.
    pub fn is_loading(&self) -> bool {
        self.is_connecting()
            || self.loading.fetch_products()
            || self.loading.restore()
            || !self.purchasing.is_empty()
    }
}

/// Owner of the status value. Only the session holds one.
pub struct StatusStore {
    tx: watch::Sender<SessionStatus>,
    history_capacity: usize,
}

impl StatusStore {
    /// Create a store with an empty status.
    pub fn new(history_capacity: usize) -> Self {
        let (tx, _rx) = watch::channel(SessionStatus::default());
        Self {
            tx,
            history_capacity,
        }
    }

    /// Current status.
    pub fn snapshot(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    /// A receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    /// Read a value off the current status without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&SessionStatus) -> R) -> R {
        f(&self.tx.borrow())
    }

    fn modify(&self, f: impl FnOnce(&mut SessionStatus)) {
        self.tx.send_modify(f);
    }

    /// Set the connection state.
    pub fn set_connection(&self, state: ConnectionState) {
        self.modify(|s| s.connection = state);
    }

    /// Move `Disconnected` to `Connecting` in one step.
    ///
    /// Returns the state found. Any other state is left untouched, so only the
    /// caller that saw `Disconnected` owns the connect attempt.
    pub fn begin_connect(&self) -> ConnectionState {
        let mut found = ConnectionState::Disconnected;
        self.tx.send_if_modified(|s| {
            found = s.connection;
            if found == ConnectionState::Disconnected {
                s.connection = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        found
    }

    /// Mark `ids` as mid-purchase.
    pub fn add_purchasing(&self, ids: &[ProductId]) {
        self.modify(|s| s.purchasing.extend(ids.iter().cloned()));
    }

    /// Clear the mid-purchase marker of `ids`.
    pub fn remove_purchasing<'a>(&self, ids: impl IntoIterator<Item = &'a ProductId>) {
        self.modify(|s| {
            for id in ids {
                s.purchasing.remove(id);
            }
        });
    }

    /// Record a purchase outcome.
    pub fn set_last_result(&self, result: PurchaseResult) {
        self.modify(|s| s.last_result = Some(result));
    }

    /// Mirror an error into the status.
    ///
    /// User cancellations become an informational last result instead.
    pub fn record_error(&self, err: &IapError, product_id: Option<ProductId>) {
        if err.is_user_cancelled() {
            self.set_last_result(
                PurchaseResult::new(err.message(), err.severity()).with_product(product_id),
            );
        } else {
            self.modify(|s| s.last_error = Some(StatusError::from(err)));
        }
    }

    /// Drop any stale error.
    pub fn clear_last_error(&self) {
        self.modify(|s| s.last_error = None);
    }

    /// Append to the bounded history.
    pub fn record(&self, operation: Operation, ok: bool, detail: impl Into<String>) {
        let capacity = self.history_capacity;
        let entry = OperationRecord {
            operation,
            ok,
            detail: detail.into(),
            at_ms: now_millis(),
        };
        self.modify(|s| {
            if capacity == 0 {
                return;
            }
            while s.history.len() >= capacity {
                s.history.pop_front();
            }
            s.history.push_back(entry);
        });
    }

    /// Reset the connection state and the purchasing set.
    ///
    /// Last result, last error and history survive.
    pub fn reset_connection(&self) {
        self.modify(|s| {
            s.connection = ConnectionState::Disconnected;
            s.purchasing.clear();
        });
    }
}

/// Sets a loading flag for its lifetime.
///
/// The flag is cleared on drop, so early returns and cancelled futures cannot
/// leave it stuck.
pub struct LoadingGuard {
    store: Arc<StatusStore>,
    flag: LoadingFlag,
}

impl LoadingGuard {
    /// Raise `flag` until the guard drops.
    pub fn begin(store: Arc<StatusStore>, flag: LoadingFlag) -> Self {
        store.modify(|s| *s.loading.counter(flag) += 1);
        Self { store, flag }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let flag = self.flag;
        self.store.modify(|s| {
            let counter = s.loading.counter(flag);
            *counter = counter.saturating_sub(1);
        });
    }
}
