//! Configuration for billing sessions.

use serde::{Deserialize, Serialize};

/// Configuration for a [`BillingSession`](crate::BillingSession).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of operation records kept in the status history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Remember ids the backend did not return, so repeated fetches of the
    /// same list stay off the backend until disconnect.
    #[serde(default = "default_cache_missing")]
    pub cache_missing_products: bool,
}

fn default_history_capacity() -> usize {
    32
}

fn default_cache_missing() -> bool {
    true
}

impl SessionConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            cache_missing_products: default_cache_missing(),
        }
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Enable or disable caching of ids the backend did not return.
    pub fn with_cache_missing_products(mut self, enabled: bool) -> Self {
        self.cache_missing_products = enabled;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.history_capacity, 32);
        assert!(config.cache_missing_products);
    }

    #[test]
    fn test_partial_json() {
        let config = SessionConfig::from_json(r#"{"history_capacity": 4}"#).unwrap();
        assert_eq!(config.history_capacity, 4);
        assert!(config.cache_missing_products);
    }

    #[test]
    fn test_invalid_json() {
        assert!(SessionConfig::from_json("not json").is_err());
    }
}
