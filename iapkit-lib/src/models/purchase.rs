//! Purchase records.

use crate::{ProductId, ProductKind, PurchaseToken};
use serde::{Deserialize, Serialize};

/// Backend-reported state of a purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseState {
    /// Awaiting payment (cash, bank transfer...).
    Pending,
    /// Paid.
    Purchased,
    /// Payment failed.
    Failed,
    /// Backend gave no state.
    #[default]
    Unknown,
}

/// One transaction instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Token used for acknowledge/consume and idempotency.
    pub token: PurchaseToken,
    /// Order / transaction id. Pending purchases may not have one yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Products covered by this purchase (at least one).
    pub product_ids: Vec<ProductId>,
    /// One-time or subscription.
    pub kind: ProductKind,
    /// Purchase time (unix epoch millis).
    pub purchase_time_ms: i64,
    /// Backend-reported state.
    pub state: PurchaseState,
    /// Subscription auto-renews.
    #[serde(default)]
    pub auto_renewing: bool,
    /// Backend already considers this purchase acknowledged.
    #[serde(default)]
    pub acknowledged: bool,
    /// Quantity purchased.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Raw backend payload, kept verbatim for server-side validation.
    #[serde(default)]
    pub original_json: String,
    /// Backend signature over `original_json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Obfuscated account id supplied at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscated_account_id: Option<String>,
    /// Obfuscated profile id supplied at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscated_profile_id: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl Purchase {
    /// Create a purchased record for a single product.
    pub fn new(
        token: impl Into<PurchaseToken>,
        product_id: impl Into<ProductId>,
        kind: ProductKind,
    ) -> Self {
        Self {
            token: token.into(),
            order_id: None,
            product_ids: vec![product_id.into()],
            kind,
            purchase_time_ms: crate::now_millis(),
            state: PurchaseState::Purchased,
            auto_renewing: kind == ProductKind::Subs,
            acknowledged: false,
            quantity: 1,
            original_json: String::new(),
            signature: None,
            obfuscated_account_id: None,
            obfuscated_profile_id: None,
        }
    }

    /// Set the order id.
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Set the state.
    pub fn with_state(mut self, state: PurchaseState) -> Self {
        self.state = state;
        self
    }

    /// Set the acknowledged flag.
    pub fn with_acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = acknowledged;
        self
    }

    /// Set the auto-renewing flag.
    pub fn with_auto_renewing(mut self, auto_renewing: bool) -> Self {
        self.auto_renewing = auto_renewing;
        self
    }

    /// Set the raw backend payload.
    pub fn with_original_json(mut self, json: impl Into<String>) -> Self {
        self.original_json = json.into();
        self
    }

    /// Add another product to a multi-line purchase.
    pub fn with_product(mut self, product_id: impl Into<ProductId>) -> Self {
        self.product_ids.push(product_id.into());
        self
    }

    /// First product of this purchase.
    pub fn primary_product(&self) -> Option<&ProductId> {
        self.product_ids.first()
    }

    /// Returns true if `id` is one of this purchase's products.
    pub fn covers(&self, id: &ProductId) -> bool {
        self.product_ids.contains(id)
    }

    /// Returns true if the backend reports this purchase as paid.
    pub fn is_purchased(&self) -> bool {
        self.state == PurchaseState::Purchased
    }

    /// Parse the raw payload as JSON.
    pub fn original_json_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.original_json)?)
    }
}

/// An entitlement view over a purchased subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSubscription {
    /// Subscribed product.
    pub product_id: ProductId,
    /// Token of the backing purchase.
    pub purchase_token: PurchaseToken,
    /// Order id of the backing purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Subscription auto-renews.
    pub auto_renewing: bool,
    /// Purchase time (unix epoch millis).
    pub purchased_at_ms: i64,
}

impl ActiveSubscription {
    /// One entry per product covered by `purchase`.
    pub fn from_purchase(purchase: &Purchase) -> Vec<Self> {
        purchase
            .product_ids
            .iter()
            .map(|id| Self {
                product_id: id.clone(),
                purchase_token: purchase.token.clone(),
                transaction_id: purchase.order_id.clone(),
                auto_renewing: purchase.auto_renewing,
                purchased_at_ms: purchase.purchase_time_ms,
            })
            .collect()
    }
}
