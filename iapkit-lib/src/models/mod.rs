//! Store data model.
//!
//! Products and purchases are plain serde values. They are created from
//! backend responses and replaced wholesale on re-fetch, never patched.

mod product;
mod purchase;
mod request;

pub use product::{OneTimeOffer, Price, PricingPhase, Product, RecurrenceMode, SubscriptionOffer};
pub use purchase::{ActiveSubscription, Purchase, PurchaseState};
pub use request::{PurchaseOptions, PurchaseRequest, ReplacementMode, SubscriptionReplacement};
