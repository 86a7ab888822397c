//! Purchase request parameters.

use crate::{ProductId, ProductKind, PurchaseToken};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an existing subscription is replaced by the new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementMode {
    /// Let the backend decide.
    #[default]
    Unknown,
    /// Replace now, credit unused time.
    WithTimeProration,
    /// Replace now, charge the prorated difference.
    ChargeProratedPrice,
    /// Replace now, charge full price.
    ChargeFullPrice,
    /// Replace now, keep the old billing date.
    WithoutProration,
    /// Replace at next renewal.
    Deferred,
}

/// Upgrade / downgrade parameters for subscription purchases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionReplacement {
    /// Token of the subscription being replaced.
    pub old_purchase_token: PurchaseToken,
    /// Replacement mode.
    #[serde(default)]
    pub mode: ReplacementMode,
}

/// Options forwarded to the backend's flow launch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOptions {
    /// Obfuscated account id, for fraud detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscated_account_id: Option<String>,
    /// Obfuscated profile id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscated_profile_id: Option<String>,
    /// Selected subscription offer token per product.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub offer_tokens: HashMap<ProductId, String>,
    /// Price is personalized (EU disclosure).
    #[serde(default)]
    pub is_offer_personalized: bool,
    /// Subscription upgrade / downgrade parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<SubscriptionReplacement>,
}

impl PurchaseOptions {
    /// Set the obfuscated account id.
    pub fn with_account_id(mut self, id: impl Into<String>) -> Self {
        self.obfuscated_account_id = Some(id.into());
        self
    }

    /// Set the obfuscated profile id.
    pub fn with_profile_id(mut self, id: impl Into<String>) -> Self {
        self.obfuscated_profile_id = Some(id.into());
        self
    }

    /// Select an offer tier for one product.
    pub fn with_offer_token(
        mut self,
        product_id: impl Into<ProductId>,
        token: impl Into<String>,
    ) -> Self {
        self.offer_tokens.insert(product_id.into(), token.into());
        self
    }

    /// Replace an existing subscription.
    pub fn replacing(
        mut self,
        old_purchase_token: impl Into<PurchaseToken>,
        mode: ReplacementMode,
    ) -> Self {
        self.replacement = Some(SubscriptionReplacement {
            old_purchase_token: old_purchase_token.into(),
            mode,
        });
        self
    }
}

/// A purchase request for one or more products of one kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Products to buy.
    pub product_ids: Vec<ProductId>,
    /// Kind of every product in the request.
    pub kind: ProductKind,
    /// Launch options.
    #[serde(default)]
    pub options: PurchaseOptions,
}

impl PurchaseRequest {
    /// Request a single one-time product.
    pub fn in_app(product_id: impl Into<ProductId>) -> Self {
        Self::new(vec![product_id.into()], ProductKind::InApp)
    }

    /// Request a single subscription.
    pub fn subscription(product_id: impl Into<ProductId>) -> Self {
        Self::new(vec![product_id.into()], ProductKind::Subs)
    }

    /// Request several products of one kind.
    pub fn new(product_ids: Vec<ProductId>, kind: ProductKind) -> Self {
        Self {
            product_ids,
            kind,
            options: PurchaseOptions::default(),
        }
    }

    /// Set the launch options.
    pub fn with_options(mut self, options: PurchaseOptions) -> Self {
        self.options = options;
        self
    }
}
