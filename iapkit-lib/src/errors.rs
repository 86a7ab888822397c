//! Error types for billing session operations.
//!
//! Every failure in this crate is represented as data. Input validation
//! problems are returned directly to the caller, while backend and
//! asynchronous failures are also broadcast through the error listeners and
//! mirrored into the session status.

use crate::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for FFI and presentation-layer integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum IapErrorCode {
    /// No backend session is established
    NotConnected = 1000,
    /// Empty identifier list or empty token
    EmptyInput = 2000,
    /// Purchase flow requires a foreground host
    MissingForegroundContext = 2001,
    /// Requested product is absent from the backend catalog
    ItemNotFound = 3000,
    /// Item is already owned
    AlreadyOwned = 3001,
    /// Item is not owned
    NotOwned = 3002,
    /// User backed out of the purchase flow
    UserCancelled = 4000,
    /// A purchase flow is already awaiting its outcome
    PurchaseInProgress = 4001,
    /// Purchase is pending and cannot be finished yet
    PurchasePending = 4002,
    /// Billing service is unavailable
    ServiceUnavailable = 5000,
    /// Billing service connection dropped
    ServiceDisconnected = 5001,
    /// Billing service did not answer in time
    ServiceTimeout = 5002,
    /// Backend rejected the call as misuse
    DeveloperError = 6000,
    /// Backend-specific failure
    Backend = 7000,
    /// Unclassified failure
    Unknown = 9999,
}

/// How presentation layers should treat an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Completed successfully.
    Success,
    /// Nothing went wrong, but nothing was bought either.
    Info,
    /// Something went wrong.
    Error,
}

/// Error type for billing session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IapError {
    /// Operation attempted without an established backend session.
    #[error("billing service is not connected")]
    NotConnected,

    /// An identifier list (or token) was empty.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// One or more requested products are unknown to the backend.
    #[error("item not found: {}", join_ids(.product_ids))]
    ItemNotFound {
        /// The identifiers the backend did not return.
        product_ids: Vec<ProductId>,
    },

    /// Purchase flow requested without an active foreground host.
    #[error("purchase flow requires an active foreground host")]
    MissingForegroundContext,

    /// The user backed out of the purchase flow.
    #[error("purchase cancelled by user")]
    UserCancelled,

    /// Backend reports the item is already owned.
    #[error("item already owned")]
    AlreadyOwned,

    /// Backend reports the item is not owned.
    #[error("item not owned")]
    NotOwned,

    /// A purchase flow is already awaiting its outcome.
    #[error("another purchase is already in progress")]
    PurchaseInProgress,

    /// The purchase is still pending and cannot be finished.
    #[error("purchase {token} is pending")]
    PurchasePending {
        /// Token of the pending purchase.
        token: String,
    },

    /// Billing service is unavailable.
    #[error("billing service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Billing service connection dropped.
    #[error("billing service disconnected")]
    ServiceDisconnected,

    /// Billing service timed out.
    #[error("billing service timed out")]
    ServiceTimeout,

    /// Backend rejected the call as misuse (bad arguments, bad offer token...).
    #[error("developer error: {0}")]
    DeveloperError(String),

    /// Backend-specific failure with its native response code.
    #[error("backend error {code}: {message}")]
    Backend {
        /// Native backend response code.
        code: i32,
        /// Backend debug message.
        message: String,
    },

    /// Unclassified failure.
    #[error("unknown error: {0}")]
    Unknown(String),
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(ProductId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl IapError {
    /// Get the error code for FFI/presentation integration.
    pub fn code(&self) -> IapErrorCode {
        match self {
            Self::NotConnected => IapErrorCode::NotConnected,
            Self::EmptyInput(_) => IapErrorCode::EmptyInput,
            Self::ItemNotFound { .. } => IapErrorCode::ItemNotFound,
            Self::MissingForegroundContext => IapErrorCode::MissingForegroundContext,
            Self::UserCancelled => IapErrorCode::UserCancelled,
            Self::AlreadyOwned => IapErrorCode::AlreadyOwned,
            Self::NotOwned => IapErrorCode::NotOwned,
            Self::PurchaseInProgress => IapErrorCode::PurchaseInProgress,
            Self::PurchasePending { .. } => IapErrorCode::PurchasePending,
            Self::ServiceUnavailable(_) => IapErrorCode::ServiceUnavailable,
            Self::ServiceDisconnected => IapErrorCode::ServiceDisconnected,
            Self::ServiceTimeout => IapErrorCode::ServiceTimeout,
            Self::DeveloperError(_) => IapErrorCode::DeveloperError,
            Self::Backend { .. } => IapErrorCode::Backend,
            Self::Unknown(_) => IapErrorCode::Unknown,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// User cancellation is informational; everything else is an error.
    pub fn severity(&self) -> Severity {
        if self.is_user_cancelled() {
            Severity::Info
        } else {
            Severity::Error
        }
    }

    /// Returns true if the user backed out of the flow.
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ServiceUnavailable(_)
                | Self::ServiceDisconnected
                | Self::ServiceTimeout
        )
    }

    /// Create an item-not-found error.
    pub fn item_not_found(product_ids: Vec<ProductId>) -> Self {
        Self::ItemNotFound { product_ids }
    }

    /// Create a backend error from a native response code.
    pub fn backend(code: i32, message: impl Into<String>) -> Self {
        Self::Backend {
            code,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for IapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unknown(format!("serialization: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(IapError::NotConnected.code(), IapErrorCode::NotConnected);
        assert_eq!(IapError::NotConnected.code() as i32, 1000);
        assert_eq!(
            IapError::backend(5, "bad offer").code(),
            IapErrorCode::Backend
        );
    }

    #[test]
    fn test_user_cancel_is_informational() {
        assert_eq!(IapError::UserCancelled.severity(), Severity::Info);
        assert!(IapError::UserCancelled.is_user_cancelled());
        assert_eq!(IapError::AlreadyOwned.severity(), Severity::Error);
    }

    #[test]
    fn test_retryable() {
        assert!(IapError::ServiceDisconnected.is_retryable());
        assert!(IapError::ServiceUnavailable("down".into()).is_retryable());
        assert!(!IapError::UserCancelled.is_retryable());
        assert!(!IapError::EmptyInput("product ids").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = IapError::item_not_found(vec!["sku.a".into(), "sku.b".into()]);
        assert_eq!(err.to_string(), "item not found: sku.a, sku.b");
        assert!(IapError::backend(3, "billing unavailable")
            .message()
            .contains("billing unavailable"));
    }
}
