//! Common test utilities for iapkit-lib integration tests

use async_trait::async_trait;
use iapkit_lib::backend::{
    BillingBackend, ForegroundHost, InMemoryBackend, NamedHost, PurchasesUpdatedListener,
};
use iapkit_lib::listeners::{PurchaseErrorListener, PurchaseUpdateListener};
use iapkit_lib::models::{Price, PurchaseOptions};
use iapkit_lib::{
    BillingSession, IapError, Product, ProductId, ProductKind, Purchase, PurchaseToken,
    SessionConfig, StoreKind,
};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Catalog used by most tests.
#[allow(dead_code)]
pub fn catalog() -> Vec<Product> {
    vec![
        Product::new("sku.a", ProductKind::InApp, "A", Price::new(dec!(0.99), "USD")),
        Product::new("sku.b", ProductKind::InApp, "B", Price::new(dec!(1.99), "USD")),
        Product::new("sku.c", ProductKind::InApp, "C", Price::new(dec!(2.99), "USD")),
        Product::new("sku.a", ProductKind::Subs, "A monthly", Price::new(dec!(4.99), "USD")),
        Product::new("pro", ProductKind::Subs, "Pro", Price::new(dec!(9.99), "USD")),
    ]
}

/// Ids from string literals.
#[allow(dead_code)]
pub fn ids(raw: &[&str]) -> Vec<ProductId> {
    raw.iter().map(|s| ProductId::from(*s)).collect()
}

/// Session over an in-memory backend with `catalog()` and a host attached.
#[allow(dead_code)]
pub struct TestContext {
    pub backend: Arc<InMemoryBackend>,
    pub session: BillingSession,
}

#[allow(dead_code)]
impl TestContext {
    /// Create a disconnected context.
    pub fn new() -> Self {
        Self::with_backend(InMemoryBackend::default().with_products(catalog()))
    }

    /// Create a disconnected context over `backend`.
    pub fn with_backend(backend: InMemoryBackend) -> Self {
        let backend = Arc::new(backend);
        let session = BillingSession::new(backend.clone(), SessionConfig::default());
        session.attach_host(Arc::new(NamedHost::new("test-activity")));
        Self { backend, session }
    }

    /// Create a connected context.
    pub async fn connected() -> Self {
        let ctx = Self::new();
        ctx.session.try_connect().await.unwrap();
        ctx
    }
}

/// Records every delivered purchase.
#[allow(dead_code)]
#[derive(Default)]
pub struct UpdateRecorder {
    pub seen: Mutex<Vec<Purchase>>,
}

#[allow(dead_code)]
impl UpdateRecorder {
    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn products(&self) -> Vec<ProductId> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .flat_map(|p| p.product_ids.clone())
            .collect()
    }
}

impl PurchaseUpdateListener for UpdateRecorder {
    fn on_purchase_updated(&self, purchase: &Purchase) {
        self.seen.lock().unwrap().push(purchase.clone());
    }
}

/// Records every delivered error.
#[allow(dead_code)]
#[derive(Default)]
pub struct ErrorRecorder {
    pub seen: Mutex<Vec<IapError>>,
}

#[allow(dead_code)]
impl ErrorRecorder {
    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<IapError> {
        self.seen.lock().unwrap().last().cloned()
    }
}

impl PurchaseErrorListener for ErrorRecorder {
    fn on_purchase_error(&self, error: &IapError) {
        self.seen.lock().unwrap().push(error.clone());
    }
}

/// Register fresh recorders on `session`.
#[allow(dead_code)]
pub fn recorders(session: &BillingSession) -> (Arc<UpdateRecorder>, Arc<ErrorRecorder>) {
    let updates = Arc::new(UpdateRecorder::default());
    let errors = Arc::new(ErrorRecorder::default());
    session.add_purchase_update_listener(updates.clone());
    session.add_purchase_error_listener(errors.clone());
    (updates, errors)
}

/// Backend whose `connect` and `query_products` wait for a permit before
/// reaching the wrapped in-memory backend.
#[allow(dead_code)]
pub struct GatedBackend {
    pub inner: Arc<InMemoryBackend>,
    gate: Semaphore,
}

#[allow(dead_code)]
impl GatedBackend {
    pub fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner: Arc::new(inner),
            gate: Semaphore::new(0),
        }
    }

    /// Let `n` gated calls through.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl BillingBackend for GatedBackend {
    fn store(&self) -> StoreKind {
        self.inner.store()
    }

    fn set_purchases_updated_listener(&self, listener: Arc<dyn PurchasesUpdatedListener>) {
        self.inner.set_purchases_updated_listener(listener);
    }

    async fn connect(&self) -> iapkit_lib::Result<bool> {
        self.pass().await;
        self.inner.connect().await
    }

    async fn disconnect(&self) -> iapkit_lib::Result<bool> {
        self.inner.disconnect().await
    }

    async fn query_products(
        &self,
        ids: &[ProductId],
        kind: ProductKind,
    ) -> iapkit_lib::Result<Vec<Product>> {
        self.pass().await;
        self.inner.query_products(ids, kind).await
    }

    async fn query_purchases(&self, kind: ProductKind) -> iapkit_lib::Result<Vec<Purchase>> {
        self.inner.query_purchases(kind).await
    }

    async fn launch_purchase_flow(
        &self,
        host: &dyn ForegroundHost,
        products: &[Product],
        options: &PurchaseOptions,
    ) -> iapkit_lib::Result<()> {
        self.inner.launch_purchase_flow(host, products, options).await
    }

    async fn acknowledge(&self, token: &PurchaseToken) -> iapkit_lib::Result<()> {
        self.inner.acknowledge(token).await
    }

    async fn consume(&self, token: &PurchaseToken) -> iapkit_lib::Result<()> {
        self.inner.consume(token).await
    }

    async fn storefront_country_code(&self) -> iapkit_lib::Result<String> {
        self.inner.storefront_country_code().await
    }
}

/// Session over a [`GatedBackend`] with `catalog()` and a host attached.
#[allow(dead_code)]
pub fn gated_session() -> (Arc<GatedBackend>, BillingSession) {
    let backend = Arc::new(GatedBackend::new(
        InMemoryBackend::default().with_products(catalog()),
    ));
    let session = BillingSession::new(backend.clone(), SessionConfig::default());
    session.attach_host(Arc::new(NamedHost::new("test-activity")));
    (backend, session)
}
