//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits for
//! quick setup. Import everything with:
//!
//! ```rust,ignore
//! use iapkit_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Core types: `ProductId`, `PurchaseToken`, `ProductKind`, `ProductQuery`, `StoreKind`
//! - Error types: `IapError`, `IapErrorCode`, `Severity`, `Result`
//! - Backend traits: `BillingBackend`, `ForegroundHost`, `PurchasesUpdatedListener`
//! - Session: `BillingSession`, `SessionConfig`, `SessionStatus`
//! - Models: `Product`, `Purchase`, `PurchaseRequest`, `PurchaseOptions`

// Core types
pub use crate::{ProductId, ProductKind, ProductQuery, PurchaseToken, StoreKind};

// Error handling
pub use crate::errors::{IapError, IapErrorCode, Severity};
pub use crate::Result;

// Backend traits
pub use crate::backend::{
    BillingBackend, ForegroundHost, InMemoryBackend, NamedHost, PurchasesUpdatedListener,
};

// Listeners
pub use crate::listeners::{PurchaseErrorListener, PurchaseUpdateListener};

// Session
pub use crate::config::SessionConfig;
pub use crate::session::BillingSession;
pub use crate::status::{ConnectionState, SessionStatus};

// Models
pub use crate::models::{
    ActiveSubscription, Price, Product, Purchase, PurchaseOptions, PurchaseRequest, PurchaseState,
};
