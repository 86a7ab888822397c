//! Billing session orchestrator.
//!
//! [`BillingSession`] is the one surface application code talks to. It owns
//! the connection lifecycle, the product cache, the purchase correlator, the
//! listener fan-out, the finished-token set and the observable status.
//!
//! # Push channel
//!
//! At construction the session installs a [`PurchasesUpdatedListener`] on its
//! backend. The listener holds only a weak reference to the session, so a
//! dropped session is never kept alive by its backend. Every outcome arriving
//! on that channel goes through one dispatch path: it resolves the open
//! purchase request if there is one, updates the status and reaches every
//! registered listener.
//!
//! # Thread Safety
//!
//! `BillingSession` is `Send + Sync` and cheap to clone. No `std::sync` lock
//! is held across an `.await`. Finish calls are serialized with a
//! `tokio::sync::Mutex`.
//!
//! # Example
//!
//! ```
//! use iapkit_lib::backend::NamedHost;
//! use iapkit_lib::models::Price;
//! use iapkit_lib::{
//!     BillingSession, InMemoryBackend, Product, ProductKind, ProductQuery, PurchaseRequest,
//!     SessionConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> iapkit_lib::Result<()> {
//! let backend = Arc::new(InMemoryBackend::default().with_products([Product::new(
//!     "premium",
//!     ProductKind::InApp,
//!     "Premium",
//!     Price::from_micros(4_990_000, "USD"),
//! )]));
//! let session = BillingSession::new(backend, SessionConfig::default());
//! session.attach_host(Arc::new(NamedHost::new("main")));
//!
//! session.try_connect().await?;
//! let products = session.fetch_products(&["premium".into()], ProductQuery::InApp).await?;
//! assert_eq!(products.len(), 1);
//!
//! let purchases = session.request_purchase(PurchaseRequest::in_app("premium")).await?;
//! session.finish_transaction(&purchases[0], false).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod correlator;
pub mod tracker;

pub use cache::ProductCache;
pub use correlator::{PurchaseCorrelator, ResolvedSlot};
pub use tracker::ProcessedTokens;

use crate::backend::{BillingBackend, ForegroundHost, PurchasesUpdate, PurchasesUpdatedListener};
use crate::config::SessionConfig;
use crate::errors::Severity;
use crate::listeners::{EventFanout, PurchaseErrorListener, PurchaseUpdateListener};
use crate::models::{ActiveSubscription, Product, Purchase, PurchaseRequest, PurchaseState};
use crate::status::{
    ConnectionState, LoadingFlag, LoadingGuard, Operation, PurchaseResult, SessionStatus,
    StatusStore,
};
use crate::{IapError, ProductId, ProductKind, ProductQuery, Result};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::watch;

/// State shared between the session handle and its push listener.
struct SessionInner {
    backend: Arc<dyn BillingBackend>,
    config: SessionConfig,
    status: Arc<StatusStore>,
    cache: ProductCache,
    correlator: PurchaseCorrelator,
    processed: ProcessedTokens,
    fanout: EventFanout,
    host: RwLock<Option<Arc<dyn ForegroundHost>>>,
    finish_lock: tokio::sync::Mutex<()>,
}

/// Billing session over one backend.
#[derive(Clone)]
pub struct BillingSession {
    inner: Arc<SessionInner>,
}

/// Push listener installed on the backend.
struct PushSink {
    session: Weak<SessionInner>,
}

impl PurchasesUpdatedListener for PushSink {
    fn on_purchases_updated(&self, update: PurchasesUpdate) {
        match self.session.upgrade() {
            Some(inner) => inner.dispatch(update),
            None => tracing::debug!("purchase update after session drop; ignored"),
        }
    }

    fn on_service_disconnected(&self) {
        let Some(inner) = self.session.upgrade() else {
            return;
        };
        if inner
            .status
            .read(|s| s.connection == ConnectionState::Disconnected)
        {
            return;
        }
        tracing::warn!(store = %inner.backend.store(), "billing service disconnected");
        inner.teardown();
        inner.status.record_error(&IapError::ServiceDisconnected, None);
        inner
            .status
            .record(Operation::ServiceDisconnected, false, "service connection dropped");
    }
}

impl BillingSession {
    /// Create a session over `backend` and install its push listener.
    pub fn new(backend: Arc<dyn BillingBackend>, config: SessionConfig) -> Self {
        let inner = Arc::new(SessionInner {
            status: Arc::new(StatusStore::new(config.history_capacity)),
            backend,
            config,
            cache: ProductCache::new(),
            correlator: PurchaseCorrelator::new(),
            processed: ProcessedTokens::new(),
            fanout: EventFanout::new(),
            host: RwLock::new(None),
            finish_lock: tokio::sync::Mutex::new(()),
        });
        let session = Self { inner };
        session.inner.backend.set_purchases_updated_listener(session.push_listener());
        session
    }

    /// A push listener bound to this session.
    ///
    /// The session installs one on its own backend. Custom backends that wrap
    /// another client can forward that client's callbacks into this one.
    pub fn push_listener(&self) -> Arc<dyn PurchasesUpdatedListener> {
        Arc::new(PushSink {
            session: Arc::downgrade(&self.inner),
        })
    }

    /// The configuration this session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ---------------------------------------------------------------------
    // Connection
    // ---------------------------------------------------------------------

    /// Connect to the billing service, reporting failure as `false`.
    ///
    /// The failure is still recorded in the status.
    pub async fn connect(&self) -> bool {
        self.try_connect().await.is_ok()
    }

    /// Connect to the billing service.
    ///
    /// Connecting while connected is a no-op that does not reach the backend.
    /// A call made while another connect is in flight waits for that attempt
    /// and reports its result.
    #[tracing::instrument(skip(self), fields(store = %self.inner.backend.store()))]
    pub async fn try_connect(&self) -> Result<()> {
        let inner = &self.inner;
        match inner.status.begin_connect() {
            ConnectionState::Disconnected => {}
            ConnectionState::Connected => {
                tracing::debug!("already connected");
                return Ok(());
            }
            ConnectionState::Connecting => {
                tracing::debug!("joining connect in flight");
                let mut rx = inner.status.subscribe();
                let connected = rx
                    .wait_for(|s| !s.is_connecting())
                    .await
                    .map(|s| s.is_connected())
                    .unwrap_or(false);
                return if connected {
                    Ok(())
                } else {
                    Err(IapError::NotConnected)
                };
            }
        }

        let attempt = ConnectAttempt {
            status: &inner.status,
            armed: true,
        };
        let outcome = match inner.backend.connect().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(IapError::ServiceUnavailable(
                "backend refused the connection".to_string(),
            )),
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(()) => {
                inner.status.set_connection(ConnectionState::Connected);
                inner.status.clear_last_error();
                inner.status.record(Operation::Connect, true, "connected");
                tracing::info!("billing service connected");
            }
            Err(err) => {
                inner.status.set_connection(ConnectionState::Disconnected);
                inner.status.record_error(err, None);
                inner.status.record(Operation::Connect, false, err.message());
                tracing::warn!(error = %err, "billing connect failed");
            }
        }
        attempt.disarm();
        outcome
    }

    /// Disconnect from the billing service.
    ///
    /// Clears the product cache and the finished-token set, and fails any
    /// awaiting purchase request with [`IapError::NotConnected`]. Safe to call
    /// when already disconnected. Returns false only if the backend reported
    /// a failure; local teardown happens either way.
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self) -> bool {
        let inner = &self.inner;
        if inner.status.read(|s| s.connection == ConnectionState::Disconnected) {
            tracing::debug!("already disconnected");
            return true;
        }

        let result = inner.backend.disconnect().await;
        inner.teardown();
        match result {
            Ok(closed) => {
                inner.status.record(Operation::Disconnect, closed, "disconnected");
                closed
            }
            Err(err) => {
                tracing::warn!(error = %err, "backend disconnect failed");
                inner.status.record_error(&err, None);
                inner.status.record(Operation::Disconnect, false, err.message());
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    // Products
    // ---------------------------------------------------------------------

    /// Fetch product metadata, serving cached entries without a backend call.
    ///
    /// Per kind in `filter`, every id without a cache entry is batched into a
    /// single backend query. The response follows `ids` order, then kind
    /// order. Ids the backend does not know are skipped.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len(), filter = ?filter))]
    pub async fn fetch_products(
        &self,
        ids: &[ProductId],
        filter: ProductQuery,
    ) -> Result<Vec<Product>> {
        let inner = &self.inner;
        if ids.is_empty() {
            return Err(IapError::EmptyInput("product ids"));
        }
        inner.ensure_connected()?;

        let _loading = LoadingGuard::begin(inner.status.clone(), LoadingFlag::FetchProducts);
        let result = inner.load_products(ids, filter.kinds()).await;
        match &result {
            Ok(products) => inner.status.record(
                Operation::FetchProducts,
                true,
                format!("{} of {} products", products.len(), ids.len()),
            ),
            Err(err) => {
                inner.status.record_error(err, None);
                inner.status.record(Operation::FetchProducts, false, err.message());
            }
        }
        result
    }

    // ---------------------------------------------------------------------
    // Purchases
    // ---------------------------------------------------------------------

    /// Purchases the user owns, one-time products first.
    #[tracing::instrument(skip(self))]
    pub async fn get_available_purchases(&self) -> Result<Vec<Purchase>> {
        self.load_owned(Operation::AvailablePurchases).await
    }

    /// Same query as [`get_available_purchases`](Self::get_available_purchases),
    /// also reported as the last result.
    #[tracing::instrument(skip(self))]
    pub async fn restore_purchases(&self) -> Result<Vec<Purchase>> {
        let purchases = self.load_owned(Operation::Restore).await?;
        self.inner.status.set_last_result(PurchaseResult::new(
            format!("restored {} purchases", purchases.len()),
            Severity::Info,
        ));
        Ok(purchases)
    }

    async fn load_owned(&self, operation: Operation) -> Result<Vec<Purchase>> {
        let inner = &self.inner;
        inner.ensure_connected()?;

        let _loading = LoadingGuard::begin(inner.status.clone(), LoadingFlag::Restore);
        let mut purchases = Vec::new();
        for kind in ProductQuery::All.kinds() {
            match inner.backend.query_purchases(*kind).await {
                Ok(found) => purchases.extend(found),
                Err(err) => {
                    tracing::warn!(kind = %kind, error = %err, "purchase query failed");
                    inner.status.record_error(&err, None);
                    inner.status.record(operation, false, err.message());
                    return Err(err);
                }
            }
        }
        inner
            .status
            .record(operation, true, format!("{} purchases", purchases.len()));
        Ok(purchases)
    }

    /// Purchased subscriptions, optionally limited to `ids`.
    #[tracing::instrument(skip(self))]
    pub async fn get_active_subscriptions(
        &self,
        ids: Option<&[ProductId]>,
    ) -> Result<Vec<ActiveSubscription>> {
        let inner = &self.inner;
        inner.ensure_connected()?;

        let purchases = match inner.backend.query_purchases(ProductKind::Subs).await {
            Ok(purchases) => purchases,
            Err(err) => {
                tracing::warn!(error = %err, "subscription query failed");
                inner.status.record_error(&err, None);
                return Err(err);
            }
        };

        Ok(purchases
            .iter()
            .filter(|p| p.kind == ProductKind::Subs && p.is_purchased())
            .flat_map(ActiveSubscription::from_purchase)
            .filter(|sub| ids.map_or(true, |ids| ids.contains(&sub.product_id)))
            .collect())
    }

    /// Returns true if [`get_active_subscriptions`](Self::get_active_subscriptions)
    /// would be non-empty.
    pub async fn has_active_subscriptions(&self, ids: Option<&[ProductId]>) -> Result<bool> {
        Ok(!self.get_active_subscriptions(ids).await?.is_empty())
    }

    /// ISO country code of the user's storefront.
    #[tracing::instrument(skip(self))]
    pub async fn get_storefront(&self) -> Result<String> {
        let inner = &self.inner;
        inner.ensure_connected()?;
        match inner.backend.storefront_country_code().await {
            Ok(code) => {
                inner.status.record(Operation::Storefront, true, code.clone());
                Ok(code)
            }
            Err(err) => {
                inner.status.record_error(&err, None);
                inner.status.record(Operation::Storefront, false, err.message());
                Err(err)
            }
        }
    }

    /// Launch a purchase flow and wait for its outcome.
    ///
    /// Every requested id is marked as purchasing until the outcome resolves.
    /// Outcomes, including [`IapError::UserCancelled`], also reach every
    /// registered listener. Only one request may await an outcome at a time;
    /// a second one fails with [`IapError::PurchaseInProgress`].
    ///
    /// If this future is dropped before the flow launched, the markers are
    /// cleared. Dropped after the launch, the request stays open until the
    /// backend answers or the session disconnects.
    #[tracing::instrument(
        skip(self, request),
        fields(products = ?request.product_ids, kind = %request.kind)
    )]
    pub async fn request_purchase(&self, request: PurchaseRequest) -> Result<Vec<Purchase>> {
        let inner = &self.inner;
        let ids = request.product_ids;
        if ids.is_empty() {
            return Err(IapError::EmptyInput("product ids"));
        }

        let host = match inner.active_host() {
            Some(host) => host,
            None => return Err(inner.fail_request(&ids, IapError::MissingForegroundContext)),
        };

        if inner.correlator.is_open() {
            return Err(inner.reject_overlap(&ids));
        }
        if let Err(err) = inner.ensure_connected() {
            return Err(inner.fail_request(&ids, err));
        }

        let markers = PurchasingMarkers::add(inner, &ids);

        let products = match inner.load_products(&ids, &[request.kind]).await {
            Ok(products) => products,
            Err(err) => return Err(inner.fail_request(&ids, err)),
        };
        let mut missing: Vec<ProductId> = Vec::new();
        for id in &ids {
            if !products.iter().any(|p| &p.id == id) && !missing.contains(id) {
                missing.push(id.clone());
            }
        }
        if !missing.is_empty() {
            return Err(inner.fail_request(&ids, IapError::item_not_found(missing)));
        }

        let outcome = match inner.correlator.open(&ids) {
            Ok(rx) => rx,
            Err(_) => return Err(inner.reject_overlap(&ids)),
        };
        // The slot owns the markers from here on.
        markers.disarm();

        tracing::debug!(host = host.host_id(), "launching purchase flow");
        if let Err(err) = inner
            .backend
            .launch_purchase_flow(host.as_ref(), &products, &request.options)
            .await
        {
            tracing::warn!(error = %err, "purchase flow failed to launch");
            inner.dispatch(Err(err));
        }

        match outcome.await {
            Ok(update) => update,
            // The slot was dropped without an answer: the session went away.
            Err(_) => Err(IapError::NotConnected),
        }
    }

    /// Acknowledge or consume `purchase`.
    ///
    /// Finishing a token that is already acknowledged, or that this session
    /// already finished, succeeds without a backend call.
    #[tracing::instrument(
        skip(self, purchase),
        fields(token = %purchase.token, consumable = is_consumable)
    )]
    pub async fn finish_transaction(&self, purchase: &Purchase, is_consumable: bool) -> Result<()> {
        let inner = &self.inner;
        if purchase.acknowledged {
            tracing::debug!("already acknowledged; skipping backend");
            return Ok(());
        }
        inner.ensure_connected()?;
        if purchase.state == PurchaseState::Pending {
            return Err(IapError::PurchasePending {
                token: purchase.token.to_string(),
            });
        }
        if purchase.token.is_empty() {
            return Err(IapError::EmptyInput("purchase token"));
        }

        let _serial = inner.finish_lock.lock().await;
        if inner.processed.contains(&purchase.token) {
            tracing::debug!("already finished; skipping backend");
            return Ok(());
        }

        let (verb, result) = if is_consumable {
            ("consumed", inner.backend.consume(&purchase.token).await)
        } else {
            ("acknowledged", inner.backend.acknowledge(&purchase.token).await)
        };

        match result {
            Ok(()) => {
                inner.processed.mark(purchase.token.clone());
                inner.status.record(
                    Operation::FinishTransaction,
                    true,
                    format!("{} {}", verb, purchase.token),
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "finish transaction failed");
                inner
                    .status
                    .record_error(&err, purchase.primary_product().cloned());
                inner
                    .status
                    .record(Operation::FinishTransaction, false, err.message());
                Err(err)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Listeners and host
    // ---------------------------------------------------------------------

    /// Register a purchase update listener. Returns false if already registered.
    pub fn add_purchase_update_listener(&self, listener: Arc<dyn PurchaseUpdateListener>) -> bool {
        self.inner.fanout.updates().add(listener)
    }

    /// Unregister a purchase update listener. Returns false if it was not registered.
    pub fn remove_purchase_update_listener(
        &self,
        listener: &Arc<dyn PurchaseUpdateListener>,
    ) -> bool {
        self.inner.fanout.updates().remove(listener)
    }

    /// Register a purchase error listener. Returns false if already registered.
    pub fn add_purchase_error_listener(&self, listener: Arc<dyn PurchaseErrorListener>) -> bool {
        self.inner.fanout.errors().add(listener)
    }

    /// Unregister a purchase error listener. Returns false if it was not registered.
    pub fn remove_purchase_error_listener(
        &self,
        listener: &Arc<dyn PurchaseErrorListener>,
    ) -> bool {
        self.inner.fanout.errors().remove(listener)
    }

    /// Set the host purchase flows are presented on, replacing any previous one.
    pub fn attach_host(&self, host: Arc<dyn ForegroundHost>) {
        let mut slot = self.inner.host.write().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(host = host.host_id(), "foreground host attached");
        *slot = Some(host);
    }

    /// Forget the current host.
    pub fn detach_host(&self) {
        let mut slot = self.inner.host.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    // ---------------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------------

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.inner.status.snapshot()
    }

    /// Receiver notified on every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    /// Number of cached products.
    pub fn cached_product_count(&self) -> usize {
        self.inner.cache.len()
    }

    /// Returns true while a purchase request awaits its outcome.
    pub fn has_pending_purchase(&self) -> bool {
        self.inner.correlator.is_open()
    }
}

impl SessionInner {
    fn ensure_connected(&self) -> Result<()> {
        if self.status.read(SessionStatus::is_connected) {
            Ok(())
        } else {
            Err(IapError::NotConnected)
        }
    }

    fn active_host(&self) -> Option<Arc<dyn ForegroundHost>> {
        let host = self.host.read().unwrap_or_else(|e| e.into_inner());
        host.as_ref().filter(|h| h.is_active()).cloned()
    }

    async fn load_products(
        &self,
        ids: &[ProductId],
        kinds: &[ProductKind],
    ) -> Result<Vec<Product>> {
        for kind in kinds {
            let misses = self
                .cache
                .misses(ids, *kind, self.config.cache_missing_products);
            if misses.is_empty() {
                tracing::debug!(kind = %kind, "all products served from cache");
                continue;
            }
            tracing::debug!(kind = %kind, misses = misses.len(), "querying backend for products");
            let products = self
                .backend
                .query_products(&misses, *kind)
                .await
                .inspect_err(|err| {
                    tracing::warn!(kind = %kind, error = %err, "product query failed")
                })?;
            self.cache.store_query(&misses, *kind, products);
        }
        Ok(self.cache.collect(ids, kinds))
    }

    /// Clear `ids` from the purchasing set, except ids the open slot owns.
    fn release_markers(&self, ids: &[ProductId]) {
        let owned = self.correlator.owned_ids();
        self.status
            .remove_purchasing(ids.iter().filter(|id| !owned.contains(id)));
    }

    /// Resolve a request that never reached the backend flow.
    fn fail_request(&self, ids: &[ProductId], err: IapError) -> IapError {
        self.release_markers(ids);
        self.status.record_error(&err, ids.first().cloned());
        self.status.record(Operation::Purchase, false, err.message());
        self.fanout.broadcast_error(&err);
        err
    }

    fn reject_overlap(&self, ids: &[ProductId]) -> IapError {
        tracing::error!(
            open = ?self.correlator.owned_ids(),
            requested = ?ids,
            "purchase requested while another purchase awaits its outcome"
        );
        self.release_markers(ids);
        let err = IapError::PurchaseInProgress;
        self.status.record(Operation::Purchase, false, err.message());
        err
    }

    /// Single path for every purchase outcome, solicited or not.
    fn dispatch(&self, update: PurchasesUpdate) {
        let slot = self.correlator.take();
        let operation = if slot.is_some() {
            Operation::Purchase
        } else {
            Operation::PurchaseUpdate
        };

        match &update {
            Ok(purchases) => {
                for purchase in purchases {
                    self.status.set_last_result(result_for(purchase));
                }
                self.status
                    .record(operation, true, format!("{} purchases", purchases.len()));
                tracing::debug!(
                    count = purchases.len(),
                    solicited = slot.is_some(),
                    "purchase update"
                );
            }
            Err(err) => {
                let product = slot.as_ref().and_then(|s| s.product_ids().first().cloned());
                self.status.record_error(err, product);
                self.status.record(operation, false, err.message());
                if err.is_user_cancelled() {
                    tracing::debug!("purchase cancelled by user");
                } else {
                    tracing::warn!(error = %err, "purchase failed");
                }
            }
        }

        if let Some(slot) = &slot {
            self.status.remove_purchasing(slot.product_ids());
        }

        match &update {
            Ok(purchases) => self.fanout.broadcast_purchases(purchases),
            Err(err) => self.fanout.broadcast_error(err),
        }

        if let Some(slot) = slot {
            if !slot.complete(update) {
                tracing::debug!("purchase requester stopped waiting");
            }
        }
    }

    /// Local teardown shared by explicit disconnect and a dropped service.
    fn teardown(&self) {
        self.cache.clear();
        self.processed.clear();
        if let Some(slot) = self.correlator.take() {
            tracing::debug!(products = ?slot.product_ids(), "cancelling open purchase request");
            slot.complete(Err(IapError::NotConnected));
        }
        self.status.reset_connection();
    }
}

/// Connect attempt owned by one caller. Dropped unfinished, it returns the
/// state to `Disconnected` so joined callers stop waiting.
struct ConnectAttempt<'a> {
    status: &'a StatusStore,
    armed: bool,
}

impl ConnectAttempt<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.status.set_connection(ConnectionState::Disconnected);
        }
    }
}

/// Purchasing markers of a request that has not opened the correlator slot.
///
/// Dropping the guard clears them, so a request abandoned mid-await leaves no
/// marker behind.
struct PurchasingMarkers<'a> {
    inner: &'a SessionInner,
    ids: &'a [ProductId],
    armed: bool,
}

impl<'a> PurchasingMarkers<'a> {
    fn add(inner: &'a SessionInner, ids: &'a [ProductId]) -> Self {
        inner.status.add_purchasing(ids);
        Self {
            inner,
            ids,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PurchasingMarkers<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release_markers(self.ids);
        }
    }
}

fn result_for(purchase: &Purchase) -> PurchaseResult {
    let (message, severity) = match purchase.state {
        PurchaseState::Purchased => ("purchase completed", Severity::Success),
        PurchaseState::Pending => ("purchase pending", Severity::Info),
        PurchaseState::Failed => ("purchase failed", Severity::Error),
        PurchaseState::Unknown => ("purchase state unknown", Severity::Info),
    };
    PurchaseResult::new(message, severity)
        .with_product(purchase.primary_product().cloned())
        .with_transaction(purchase.order_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBackend, LaunchBehavior, NamedHost};
    use crate::models::Price;
    use rust_decimal_macros::dec;

    fn backend() -> Arc<InMemoryBackend> {
        Arc::new(InMemoryBackend::default().with_products([
            Product::new("coins", ProductKind::InApp, "Coins", Price::new(dec!(0.99), "USD")),
            Product::new("pro", ProductKind::Subs, "Pro", Price::new(dec!(4.99), "USD")),
        ]))
    }

    fn session(backend: &Arc<InMemoryBackend>) -> BillingSession {
        let session = BillingSession::new(backend.clone(), SessionConfig::default());
        session.attach_host(Arc::new(NamedHost::new("test")));
        session
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let backend = backend();
        let session = session(&backend);
        assert!(session.connect().await);
        assert!(session.connect().await);
        assert_eq!(backend.count_calls(|c| matches!(c, crate::backend::BackendCall::Connect)), 1);
        assert!(session.status().is_connected());
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let session = session(&backend());
        assert_eq!(
            session
                .fetch_products(&["coins".into()], ProductQuery::InApp)
                .await
                .unwrap_err(),
            IapError::NotConnected
        );
        assert_eq!(session.get_storefront().await.unwrap_err(), IapError::NotConnected);
    }

    #[tokio::test]
    async fn test_purchase_round_trip() {
        let backend = backend();
        let session = session(&backend);
        session.try_connect().await.unwrap();

        let purchases = session
            .request_purchase(PurchaseRequest::in_app("coins"))
            .await
            .unwrap();
        assert_eq!(purchases.len(), 1);
        assert!(!session.has_pending_purchase());
        assert!(session.status().purchasing.is_empty());
        assert_eq!(
            session.status().last_result.unwrap().severity,
            Severity::Success
        );
    }

    #[tokio::test]
    async fn test_cancel_is_informational() {
        let backend = backend();
        let session = session(&backend);
        session.try_connect().await.unwrap();
        backend.script_launch(LaunchBehavior::Cancel);

        let err = session
            .request_purchase(PurchaseRequest::in_app("coins"))
            .await
            .unwrap_err();
        assert!(err.is_user_cancelled());
        let status = session.status();
        assert!(status.last_error.is_none());
        assert_eq!(status.last_result.unwrap().severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_dropped_session_ignores_push() {
        let backend = backend();
        let session = session(&backend);
        drop(session);
        // The backend still holds the listener but the session is gone.
        assert!(backend.emit(Ok(vec![])));
    }
}
