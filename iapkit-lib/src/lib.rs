//! IAPKit library.
//!
//! A single billing session surface over pluggable store backends. The
//! crate owns no platform code: concrete billing clients are injected through
//! the [`BillingBackend`] trait and report purchase outcomes back through the
//! [`PurchasesUpdatedListener`] push channel.
//!
//! # Features
//!
//! - **Connection lifecycle**: connect / disconnect with an observable state machine
//! - **Product cache**: per-session metadata cache with batched backend queries
//! - **Purchase correlation**: the flow launch and its out-of-band outcome are
//!   matched through a single-slot correlator
//! - **Listener fan-out**: every outcome reaches every registered listener
//! - **Idempotent finish**: acknowledge/consume runs at most once per token
//!
//! # Example
//!
//! ```ignore
//! use iapkit_lib::prelude::*;
//! use std::sync::Arc;
//!
//! let backend = Arc::new(InMemoryBackend::new(StoreKind::PlayStore));
//! let session = BillingSession::new(backend, SessionConfig::default());
//!
//! session.connect().await;
//! let products = session
//!     .fetch_products(&["premium".into()], ProductQuery::InApp)
//!     .await?;
//! ```

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod config;
pub mod errors;
pub mod listeners;
pub mod models;
pub mod prelude;
pub mod session;
pub mod status;

pub use backend::{BillingBackend, ForegroundHost, InMemoryBackend, PurchasesUpdatedListener};
pub use config::SessionConfig;
pub use errors::{IapError, IapErrorCode, Severity};
pub use models::{ActiveSubscription, Product, Purchase, PurchaseOptions, PurchaseRequest, PurchaseState};
pub use session::BillingSession;
pub use status::{ConnectionState, SessionStatus};

/// Common result alias for billing operations.
pub type Result<T> = std::result::Result<T, IapError>;

/// Identifier of a purchasable product, unique per backend.
///
/// # Example
///
/// ```
/// use iapkit_lib::ProductId;
///
/// let id: ProductId = "premium_upgrade".into();
/// assert_eq!(id.as_str(), "premium_upgrade");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    /// Create a new ProductId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-issued purchase token.
///
/// Tokens are never reused for two distinct transactions, which is what makes
/// them usable as idempotency keys for acknowledge/consume.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseToken(pub String);

impl PurchaseToken {
    /// Create a new token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty token.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PurchaseToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PurchaseToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for PurchaseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-time purchase vs. recurring subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// One-time product (consumable or not).
    InApp,
    /// Recurring subscription.
    Subs,
}

impl ProductKind {
    /// Backend-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "inapp",
            Self::Subs => "subs",
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind filter for product queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductQuery {
    /// One-time products only.
    #[default]
    InApp,
    /// Subscriptions only.
    Subs,
    /// Both kinds, one-time products first.
    All,
}

impl ProductQuery {
    /// Kinds covered by this filter, in response order.
    pub fn kinds(&self) -> &'static [ProductKind] {
        match self {
            Self::InApp => &[ProductKind::InApp],
            Self::Subs => &[ProductKind::Subs],
            Self::All => &[ProductKind::InApp, ProductKind::Subs],
        }
    }
}

impl From<ProductKind> for ProductQuery {
    fn from(kind: ProductKind) -> Self {
        match kind {
            ProductKind::InApp => Self::InApp,
            ProductKind::Subs => Self::Subs,
        }
    }
}

/// Which store a backend talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Play-Store-style billing client.
    #[default]
    PlayStore,
    /// Alternate store exposing a billing-compatible client.
    AlternateStore,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlayStore => f.write_str("play_store"),
            Self::AlternateStore => f.write_str("alternate_store"),
        }
    }
}

/// Current unix time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
