//! Product metadata.

use crate::{ProductId, ProductKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Price as a decimal amount plus ISO 4217 currency code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in major currency units.
    pub amount: Decimal,
    /// Currency code (e.g., "USD", "EUR").
    pub currency: String,
}

impl Price {
    /// Create a new price.
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Build a price from micro-units, the unit Play-style backends report.
    pub fn from_micros(micros: i64, currency: impl Into<String>) -> Self {
        Self {
            amount: Decimal::new(micros, 6).normalize(),
            currency: currency.into(),
        }
    }

    /// Returns true for a zero amount (free trial phases).
    pub fn is_free(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Details of a one-time product offer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeOffer {
    /// Pre-formatted price string.
    pub formatted_price: String,
    /// Price.
    pub price: Price,
    /// Offer token to pass back when launching the flow, if the backend uses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_token: Option<String>,
}

/// How a pricing phase repeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceMode {
    /// Repeats until cancelled.
    #[default]
    InfiniteRecurring,
    /// Repeats for `billing_cycle_count` cycles.
    FiniteRecurring,
    /// Charged once.
    NonRecurring,
}

/// One step in a subscription offer's price schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPhase {
    /// Pre-formatted price string.
    pub formatted_price: String,
    /// Price.
    pub price: Price,
    /// ISO 8601 billing period (e.g., "P1M").
    pub billing_period: String,
    /// Number of cycles for finite phases.
    #[serde(default)]
    pub billing_cycle_count: u32,
    /// Recurrence mode.
    #[serde(default)]
    pub recurrence_mode: RecurrenceMode,
}

/// A subscription offer tier (base plan or promotional offer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOffer {
    /// Base plan this offer belongs to.
    pub base_plan_id: String,
    /// Promotional offer id; `None` for the base plan itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    /// Token selecting this offer when launching the flow.
    pub offer_token: String,
    /// Developer-assigned tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Price schedule, in order.
    pub pricing_phases: Vec<PricingPhase>,
}

impl SubscriptionOffer {
    /// The phase charged after any introductory phases.
    pub fn recurring_phase(&self) -> Option<&PricingPhase> {
        self.pricing_phases
            .iter()
            .find(|p| p.recurrence_mode == RecurrenceMode::InfiniteRecurring)
            .or_else(|| self.pricing_phases.last())
    }

    /// Returns true if any phase is free.
    pub fn has_free_trial(&self) -> bool {
        self.pricing_phases.iter().any(|p| p.price.is_free())
    }
}

/// A purchasable item as last reported by the backend.
///
/// Identifier plus kind uniquely determines a cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier.
    pub id: ProductId,
    /// One-time or subscription.
    pub kind: ProductKind,
    /// Human title.
    pub title: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Pre-formatted display price.
    pub display_price: String,
    /// Price of the default offer.
    pub price: Price,
    /// One-time offer details (in-app products).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_time_offer: Option<OneTimeOffer>,
    /// Offer tiers (subscriptions).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscription_offers: Vec<SubscriptionOffer>,
}

impl Product {
    /// Create a product with a plain price and no offer metadata.
    pub fn new(
        id: impl Into<ProductId>,
        kind: ProductKind,
        title: impl Into<String>,
        price: Price,
    ) -> Self {
        let display_price = price.to_string();
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            display_price,
            price,
            one_time_offer: None,
            subscription_offers: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the pre-formatted display price.
    pub fn with_display_price(mut self, display_price: impl Into<String>) -> Self {
        self.display_price = display_price.into();
        self
    }

    /// Attach one-time offer details.
    pub fn with_one_time_offer(mut self, offer: OneTimeOffer) -> Self {
        self.one_time_offer = Some(offer);
        self
    }

    /// Add a subscription offer tier.
    pub fn with_subscription_offer(mut self, offer: SubscriptionOffer) -> Self {
        self.subscription_offers.push(offer);
        self
    }

    /// Look up an offer tier by its token.
    pub fn offer_by_token(&self, token: &str) -> Option<&SubscriptionOffer> {
        self.subscription_offers
            .iter()
            .find(|o| o.offer_token == token)
    }

    /// The base-plan offer (no promotional offer id), if any.
    pub fn base_offer(&self) -> Option<&SubscriptionOffer> {
        self.subscription_offers.iter().find(|o| o.offer_id.is_none())
    }
}
