//! Finished-token tracking.
//!
//! A purchase token is recorded only after the backend confirmed the
//! acknowledge or consume. Membership turns a later finish of the same token
//! into a no-op.

use crate::PurchaseToken;
use std::collections::HashSet;
use std::sync::RwLock;

/// Tokens finished during the current connection.
#[derive(Default)]
pub struct ProcessedTokens {
    tokens: RwLock<HashSet<PurchaseToken>>,
}

impl ProcessedTokens {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `token` was already finished.
    pub fn contains(&self, token: &PurchaseToken) -> bool {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        tokens.contains(token)
    }

    /// Record `token` as finished.
    ///
    /// Returns `true` if the token was fresh, `false` if it was already there.
    pub fn mark(&self, token: PurchaseToken) -> bool {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.insert(token)
    }

    /// Number of finished tokens.
    pub fn len(&self) -> usize {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        tokens.len()
    }

    /// Returns true if nothing was finished yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every token. Only session teardown calls this.
    pub fn clear(&self) {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_once() {
        let tokens = ProcessedTokens::new();
        let token = PurchaseToken::from("tok-1");

        assert!(!tokens.contains(&token));
        assert!(tokens.mark(token.clone()));
        assert!(!tokens.mark(token.clone()));
        assert!(tokens.contains(&token));
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_clear() {
        let tokens = ProcessedTokens::new();
        tokens.mark("a".into());
        tokens.mark("b".into());
        tokens.clear();
        assert!(tokens.is_empty());
        assert!(!tokens.contains(&"a".into()));
    }
}
