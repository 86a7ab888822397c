//! Billing backend abstraction.
//!
//! This module defines the capability set every store backend provides,
//! with one implementation shipped in-crate:
//! - In-memory store simulator (for tests, demos and development)
//!
//! Platform backends (Play-Store-style, alternate stores) live outside this
//! crate and are injected into [`BillingSession`](crate::BillingSession) at
//! construction.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iapkit_lib::backend::{InMemoryBackend, LaunchBehavior};
//!
//! let backend = InMemoryBackend::new(StoreKind::PlayStore).with_products(catalog);
//!
//! // Make the next purchase flow end with the user backing out
//! backend.script_launch(LaunchBehavior::Cancel);
//! ```

mod memory;
mod traits;

pub use memory::{BackendCall, BackendOp, InMemoryBackend, LaunchBehavior};
pub use traits::{
    BillingBackend, ForegroundHost, NamedHost, PurchasesUpdate, PurchasesUpdatedListener,
};
