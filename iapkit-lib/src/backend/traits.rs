//! Billing backend capability traits.
//!
//! A backend wraps one native billing client (Play-Store-style or an
//! alternate store). The session is written once against these traits and
//! never branches on the concrete backend.

use crate::models::{Product, Purchase, PurchaseOptions};
use crate::{ProductId, ProductKind, PurchaseToken, Result, StoreKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Outcome delivered on the push channel.
pub type PurchasesUpdate = Result<Vec<Purchase>>;

/// Push channel from a backend to its session.
///
/// Backends may invoke these methods at any time and from any thread, not
/// only in response to a flow launch.
pub trait PurchasesUpdatedListener: Send + Sync {
    /// A purchase outcome (success list or error) arrived.
    fn on_purchases_updated(&self, update: PurchasesUpdate);

    /// The native billing connection dropped.
    fn on_service_disconnected(&self);
}

/// The UI surface a purchase flow is presented on.
pub trait ForegroundHost: Send + Sync {
    /// Stable identifier for logging.
    fn host_id(&self) -> &str;

    /// Returns false once the host can no longer present UI.
    fn is_active(&self) -> bool {
        true
    }
}

/// Capability set of a billing backend.
#[async_trait]
pub trait BillingBackend: Send + Sync {
    /// Which store this backend talks to.
    fn store(&self) -> StoreKind;

    /// Install the push channel. Called once by the session at construction.
    fn set_purchases_updated_listener(&self, listener: Arc<dyn PurchasesUpdatedListener>);

    /// Establish the native billing session.
    async fn connect(&self) -> Result<bool>;

    /// Tear down the native billing session.
    async fn disconnect(&self) -> Result<bool>;

    /// Query product metadata for `ids` of one kind.
    ///
    /// Unknown ids are simply absent from the result.
    async fn query_products(&self, ids: &[ProductId], kind: ProductKind) -> Result<Vec<Product>>;

    /// Query purchases the user currently owns for one kind.
    async fn query_purchases(&self, kind: ProductKind) -> Result<Vec<Purchase>>;

    /// Start the purchase flow.
    ///
    /// `Ok(())` only means the flow started; the outcome arrives later through
    /// [`PurchasesUpdatedListener::on_purchases_updated`]. An `Err` means the
    /// flow never started.
    async fn launch_purchase_flow(
        &self,
        host: &dyn ForegroundHost,
        products: &[Product],
        options: &PurchaseOptions,
    ) -> Result<()>;

    /// Acknowledge a non-consumable or subscription purchase.
    async fn acknowledge(&self, token: &PurchaseToken) -> Result<()>;

    /// Consume a consumable purchase so it can be bought again.
    async fn consume(&self, token: &PurchaseToken) -> Result<()>;

    /// ISO country code of the user's storefront.
    async fn storefront_country_code(&self) -> Result<String>;
}

/// A host identified by name and always active.
#[derive(Clone, Debug)]
pub struct NamedHost(pub String);

impl NamedHost {
    /// Create a new host.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl ForegroundHost for NamedHost {
    fn host_id(&self) -> &str {
        &self.0
    }
}
