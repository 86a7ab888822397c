//! In-memory billing backend.
//!
//! A scriptable store simulator for tests, demos and development. It keeps a
//! catalog and the user's owned purchases in memory and records every call it
//! receives so callers can assert on round trips.
//!
//! # Thread Safety
//!
//! All state sits behind `RwLock`/`Mutex`. Lock poisoning is reported as an
//! [`IapError::Unknown`] rather than a panic. The push listener is always
//! invoked after every internal lock has been released.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use super::traits::{BillingBackend, ForegroundHost, PurchasesUpdatedListener};
use crate::models::{Product, Purchase, PurchaseOptions, PurchaseState};
use crate::{IapError, ProductId, ProductKind, PurchaseToken, Result, StoreKind};

/// What the next flow launch does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchBehavior {
    /// Emit a purchased record for every product on the push channel.
    Complete,
    /// Emit a pending record (slow payment method) on the push channel.
    Pending,
    /// Emit `UserCancelled` on the push channel.
    Cancel,
    /// Emit this error on the push channel.
    Fail(IapError),
    /// Return this error from the launch call itself.
    FailImmediately(IapError),
    /// Start the flow and emit nothing; see [`InMemoryBackend::complete_deferred`].
    Defer,
}

/// Backend operations that accept injected failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `query_products`
    QueryProducts,
    /// `query_purchases`
    QueryPurchases,
    /// `acknowledge`
    Acknowledge,
    /// `consume`
    Consume,
    /// `storefront_country_code`
    Storefront,
}

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `query_products` with its arguments.
    QueryProducts {
        /// Requested ids, as passed.
        ids: Vec<ProductId>,
        /// Requested kind.
        kind: ProductKind,
    },
    /// `query_purchases`
    QueryPurchases(ProductKind),
    /// `launch_purchase_flow` for these products.
    LaunchFlow {
        /// Launched products.
        ids: Vec<ProductId>,
        /// Host the flow was presented on.
        host: String,
    },
    /// `acknowledge`
    Acknowledge(PurchaseToken),
    /// `consume`
    Consume(PurchaseToken),
    /// `storefront_country_code`
    Storefront,
}

/// Deferred flow awaiting [`InMemoryBackend::complete_deferred`].
#[derive(Clone, Debug)]
struct DeferredFlow {
    products: Vec<Product>,
    options: PurchaseOptions,
}

/// In-memory implementation of [`BillingBackend`].
pub struct InMemoryBackend {
    store: StoreKind,
    storefront: RwLock<String>,
    connected: RwLock<bool>,
    catalog: RwLock<HashMap<(ProductId, ProductKind), Product>>,
    owned: RwLock<Vec<Purchase>>,
    listener: RwLock<Option<Arc<dyn PurchasesUpdatedListener>>>,
    launch_script: Mutex<VecDeque<LaunchBehavior>>,
    failures: Mutex<HashMap<BackendOp, IapError>>,
    deferred: Mutex<Option<DeferredFlow>>,
    calls: Mutex<Vec<BackendCall>>,
    next_token: AtomicU64,
}

fn lock_error(context: &str) -> IapError {
    IapError::Unknown(format!("InMemoryBackend: lock poisoned during {}", context))
}

impl InMemoryBackend {
    /// Create an empty backend for `store`.
    pub fn new(store: StoreKind) -> Self {
        Self {
            store,
            storefront: RwLock::new("US".to_string()),
            connected: RwLock::new(false),
            catalog: RwLock::new(HashMap::new()),
            owned: RwLock::new(Vec::new()),
            listener: RwLock::new(None),
            launch_script: Mutex::new(VecDeque::new()),
            failures: Mutex::new(HashMap::new()),
            deferred: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Add products to the catalog, replacing entries with the same id and kind.
    pub fn with_products(self, products: impl IntoIterator<Item = Product>) -> Self {
        if let Ok(mut catalog) = self.catalog.write() {
            for product in products {
                catalog.insert((product.id.clone(), product.kind), product);
            }
        }
        self
    }

    /// Seed purchases the user already owns.
    pub fn with_owned(self, purchases: impl IntoIterator<Item = Purchase>) -> Self {
        if let Ok(mut owned) = self.owned.write() {
            owned.extend(purchases);
        }
        self
    }

    /// Set the storefront country code.
    pub fn with_storefront(self, country_code: impl Into<String>) -> Self {
        if let Ok(mut storefront) = self.storefront.write() {
            *storefront = country_code.into();
        }
        self
    }

    /// Queue the behavior of the next flow launch. Unscripted launches complete.
    pub fn script_launch(&self, behavior: LaunchBehavior) {
        if let Ok(mut script) = self.launch_script.lock() {
            script.push_back(behavior);
        }
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: BackendOp, error: IapError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(op, error);
        }
    }

    /// Emit an arbitrary outcome on the push channel.
    ///
    /// Returns false if no listener is installed.
    pub fn emit(&self, update: Result<Vec<Purchase>>) -> bool {
        let listener = self.listener.read().ok().and_then(|l| l.clone());
        match listener {
            Some(listener) => {
                listener.on_purchases_updated(update);
                true
            }
            None => false,
        }
    }

    /// Emit purchases on the push channel and record them as owned.
    pub fn emit_purchases(&self, purchases: Vec<Purchase>) -> bool {
        if let Ok(mut owned) = self.owned.write() {
            owned.extend(purchases.iter().cloned());
        }
        self.emit(Ok(purchases))
    }

    /// Report a dropped native connection on the push channel.
    pub fn drop_connection(&self) {
        if let Ok(mut connected) = self.connected.write() {
            *connected = false;
        }
        let listener = self.listener.read().ok().and_then(|l| l.clone());
        if let Some(listener) = listener {
            listener.on_service_disconnected();
        }
    }

    /// Finish the deferred flow with `behavior`.
    ///
    /// Returns false if no flow is deferred.
    pub fn complete_deferred(&self, behavior: LaunchBehavior) -> bool {
        let flow = self.deferred.lock().ok().and_then(|mut d| d.take());
        match flow {
            Some(flow) => {
                self.finish_flow(&flow.products, &flow.options, behavior);
                true
            }
            None => false,
        }
    }

    /// Returns true if a flow is waiting for [`complete_deferred`](Self::complete_deferred).
    pub fn has_deferred(&self) -> bool {
        self.deferred.lock().map(|d| d.is_some()).unwrap_or(false)
    }

    /// Purchases the user currently owns.
    pub fn owned(&self) -> Vec<Purchase> {
        self.owned.read().map(|o| o.clone()).unwrap_or_default()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Only the product queries received so far.
    pub fn product_queries(&self) -> Vec<(Vec<ProductId>, ProductKind)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::QueryProducts { ids, kind } => Some((ids, kind)),
                _ => None,
            })
            .collect()
    }

    /// Number of calls matching `predicate`.
    pub fn count_calls<F>(&self, predicate: F) -> usize
    where
        F: Fn(&BackendCall) -> bool,
    {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn take_failure(&self, op: BackendOp) -> Result<()> {
        let mut failures = self.failures.lock().map_err(|_| lock_error("take_failure"))?;
        match failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        let connected = self.connected.read().map_err(|_| lock_error("ensure_connected"))?;
        if *connected {
            Ok(())
        } else {
            Err(IapError::ServiceDisconnected)
        }
    }

    fn mint_purchase(
        &self,
        products: &[Product],
        options: &PurchaseOptions,
        state: PurchaseState,
    ) -> Option<Purchase> {
        let (first, rest) = products.split_first()?;
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        let mut purchase =
            Purchase::new(format!("mem-token-{}", n), first.id.clone(), first.kind)
                .with_state(state);
        for product in rest {
            purchase = purchase.with_product(product.id.clone());
        }
        if state == PurchaseState::Purchased {
            purchase = purchase.with_order_id(format!("MEM.{:04}", n));
        }
        purchase.obfuscated_account_id = options.obfuscated_account_id.clone();
        purchase.obfuscated_profile_id = options.obfuscated_profile_id.clone();
        let payload = serde_json::json!({
            "purchaseToken": purchase.token.as_str(),
            "orderId": purchase.order_id,
            "productIds": purchase.product_ids,
            "purchaseTime": purchase.purchase_time_ms,
        });
        purchase.original_json = payload.to_string();
        Some(purchase)
    }

    fn finish_flow(
        &self,
        products: &[Product],
        options: &PurchaseOptions,
        behavior: LaunchBehavior,
    ) {
        let state = match behavior {
            LaunchBehavior::Complete => PurchaseState::Purchased,
            LaunchBehavior::Pending => PurchaseState::Pending,
            LaunchBehavior::Cancel => {
                self.emit(Err(IapError::UserCancelled));
                return;
            }
            LaunchBehavior::Fail(err) | LaunchBehavior::FailImmediately(err) => {
                self.emit(Err(err));
                return;
            }
            LaunchBehavior::Defer => return,
        };
        let update = match self.mint_purchase(products, options, state) {
            Some(purchase) => {
                if let Ok(mut owned) = self.owned.write() {
                    owned.push(purchase.clone());
                }
                Ok(vec![purchase])
            }
            None => Err(IapError::DeveloperError("no products to purchase".into())),
        };
        self.emit(update);
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(StoreKind::default())
    }
}

#[async_trait]
impl BillingBackend for InMemoryBackend {
    fn store(&self) -> StoreKind {
        self.store
    }

    fn set_purchases_updated_listener(&self, listener: Arc<dyn PurchasesUpdatedListener>) {
        if let Ok(mut slot) = self.listener.write() {
            *slot = Some(listener);
        }
    }

    async fn connect(&self) -> Result<bool> {
        self.record(BackendCall::Connect);
        self.take_failure(BackendOp::Connect)?;
        let mut connected = self.connected.write().map_err(|_| lock_error("connect"))?;
        *connected = true;
        Ok(true)
    }

    async fn disconnect(&self) -> Result<bool> {
        self.record(BackendCall::Disconnect);
        self.take_failure(BackendOp::Disconnect)?;
        let mut connected = self.connected.write().map_err(|_| lock_error("disconnect"))?;
        *connected = false;
        Ok(true)
    }

    async fn query_products(&self, ids: &[ProductId], kind: ProductKind) -> Result<Vec<Product>> {
        self.record(BackendCall::QueryProducts {
            ids: ids.to_vec(),
            kind,
        });
        self.take_failure(BackendOp::QueryProducts)?;
        self.ensure_connected()?;
        let catalog = self.catalog.read().map_err(|_| lock_error("query_products"))?;
        Ok(ids
            .iter()
            .filter_map(|id| catalog.get(&(id.clone(), kind)).cloned())
            .collect())
    }

    async fn query_purchases(&self, kind: ProductKind) -> Result<Vec<Purchase>> {
        self.record(BackendCall::QueryPurchases(kind));
        self.take_failure(BackendOp::QueryPurchases)?;
        self.ensure_connected()?;
        let owned = self.owned.read().map_err(|_| lock_error("query_purchases"))?;
        Ok(owned.iter().filter(|p| p.kind == kind).cloned().collect())
    }

    async fn launch_purchase_flow(
        &self,
        host: &dyn ForegroundHost,
        products: &[Product],
        options: &PurchaseOptions,
    ) -> Result<()> {
        self.record(BackendCall::LaunchFlow {
            ids: products.iter().map(|p| p.id.clone()).collect(),
            host: host.host_id().to_string(),
        });
        self.ensure_connected()?;

        let behavior = self
            .launch_script
            .lock()
            .map_err(|_| lock_error("launch_purchase_flow"))?
            .pop_front()
            .unwrap_or(LaunchBehavior::Complete);

        match behavior {
            LaunchBehavior::FailImmediately(err) => Err(err),
            LaunchBehavior::Defer => {
                let mut deferred = self.deferred.lock().map_err(|_| lock_error("defer"))?;
                *deferred = Some(DeferredFlow {
                    products: products.to_vec(),
                    options: options.clone(),
                });
                Ok(())
            }
            other => {
                self.finish_flow(products, options, other);
                Ok(())
            }
        }
    }

    async fn acknowledge(&self, token: &PurchaseToken) -> Result<()> {
        self.record(BackendCall::Acknowledge(token.clone()));
        self.take_failure(BackendOp::Acknowledge)?;
        self.ensure_connected()?;
        let mut owned = self.owned.write().map_err(|_| lock_error("acknowledge"))?;
        let purchase = owned
            .iter_mut()
            .find(|p| &p.token == token)
            .ok_or(IapError::NotOwned)?;
        purchase.acknowledged = true;
        Ok(())
    }

    async fn consume(&self, token: &PurchaseToken) -> Result<()> {
        self.record(BackendCall::Consume(token.clone()));
        self.take_failure(BackendOp::Consume)?;
        self.ensure_connected()?;
        let mut owned = self.owned.write().map_err(|_| lock_error("consume"))?;
        let before = owned.len();
        owned.retain(|p| &p.token != token);
        if owned.len() == before {
            return Err(IapError::NotOwned);
        }
        Ok(())
    }

    async fn storefront_country_code(&self) -> Result<String> {
        self.record(BackendCall::Storefront);
        self.take_failure(BackendOp::Storefront)?;
        self.ensure_connected()?;
        let storefront = self.storefront.read().map_err(|_| lock_error("storefront"))?;
        Ok(storefront.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::traits::NamedHost;
    use crate::models::Price;
    use rust_decimal_macros::dec;

    struct Recorder(Mutex<Vec<Result<Vec<Purchase>>>>);

    impl PurchasesUpdatedListener for Recorder {
        fn on_purchases_updated(&self, update: Result<Vec<Purchase>>) {
            self.0.lock().unwrap().push(update);
        }

        fn on_service_disconnected(&self) {}
    }

    fn coins() -> Product {
        Product::new("coins", ProductKind::InApp, "Coins", Price::new(dec!(0.99), "USD"))
    }

    #[tokio::test]
    async fn test_query_requires_connection() {
        let backend = InMemoryBackend::default().with_products([coins()]);
        let err = backend
            .query_products(&["coins".into()], ProductKind::InApp)
            .await
            .unwrap_err();
        assert_eq!(err, IapError::ServiceDisconnected);

        backend.connect().await.unwrap();
        let found = backend
            .query_products(&["coins".into(), "missing".into()], ProductKind::InApp)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(backend.product_queries().len(), 2);
    }

    #[tokio::test]
    async fn test_launch_completes_on_push_channel() {
        let backend = InMemoryBackend::default().with_products([coins()]);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        backend.set_purchases_updated_listener(recorder.clone());
        backend.connect().await.unwrap();

        backend
            .launch_purchase_flow(&NamedHost::new("main"), &[coins()], &PurchaseOptions::default())
            .await
            .unwrap();

        let updates = recorder.0.lock().unwrap();
        assert_eq!(updates.len(), 1);
        let purchases = updates[0].as_ref().unwrap();
        assert_eq!(purchases[0].product_ids, vec![ProductId::from("coins")]);
        assert_eq!(backend.owned().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_immediate_failure_emits_nothing() {
        let backend = InMemoryBackend::default();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        backend.set_purchases_updated_listener(recorder.clone());
        backend.connect().await.unwrap();
        backend.script_launch(LaunchBehavior::FailImmediately(IapError::DeveloperError(
            "bad offer".into(),
        )));

        let result = backend
            .launch_purchase_flow(&NamedHost::new("main"), &[coins()], &PurchaseOptions::default())
            .await;
        assert!(matches!(result, Err(IapError::DeveloperError(_))));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consume_removes_ownership() {
        let owned = Purchase::new("tok-1", "coins", ProductKind::InApp);
        let backend = InMemoryBackend::default().with_owned([owned]);
        backend.connect().await.unwrap();

        backend.consume(&"tok-1".into()).await.unwrap();
        assert!(backend.owned().is_empty());
        assert_eq!(
            backend.consume(&"tok-1".into()).await.unwrap_err(),
            IapError::NotOwned
        );
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let backend = InMemoryBackend::default();
        backend.fail_next(BackendOp::Connect, IapError::ServiceTimeout);
        assert_eq!(backend.connect().await.unwrap_err(), IapError::ServiceTimeout);
        assert!(backend.connect().await.unwrap());
    }
}
