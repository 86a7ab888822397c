//! CLI command implementations

pub mod buy;
pub mod demo;
pub mod entitlements;
pub mod products;
pub mod restore;

use anyhow::{Context, Result};
use iapkit_lib::backend::{InMemoryBackend, NamedHost};
use iapkit_lib::models::Price;
use iapkit_lib::{
    BillingSession, Product, ProductId, ProductKind, ProductQuery, Purchase, SessionConfig,
    StoreKind,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::KindArg;

/// Contents of a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default = "default_storefront")]
    pub storefront: String,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub owned: Vec<Purchase>,
}

fn default_storefront() -> String {
    "US".to_string()
}

impl Catalog {
    /// Catalog used when no file is given
    pub fn builtin() -> Self {
        Self {
            store: StoreKind::PlayStore,
            storefront: default_storefront(),
            products: vec![
                Product::new(
                    "coins_100",
                    ProductKind::InApp,
                    "100 Coins",
                    Price::from_micros(990_000, "USD"),
                )
                .with_description("A pile of coins"),
                Product::new(
                    "remove_ads",
                    ProductKind::InApp,
                    "Remove Ads",
                    Price::from_micros(2_990_000, "USD"),
                ),
                Product::new(
                    "pro_monthly",
                    ProductKind::Subs,
                    "Pro (monthly)",
                    Price::from_micros(4_990_000, "USD"),
                ),
            ],
            owned: Vec::new(),
        }
    }

    /// Load a catalog file, or the built-in catalog
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read catalog {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid catalog {}", path.display()))
            }
            None => Ok(Self::builtin()),
        }
    }
}

/// A session over a simulated store, shared by all commands
pub struct DemoContext {
    pub backend: Arc<InMemoryBackend>,
    pub session: BillingSession,
}

impl DemoContext {
    /// Build the simulated store and a session over it
    pub fn open(catalog: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let catalog = Catalog::load(catalog)?;
        let config = match config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                SessionConfig::from_json(&raw)?
            }
            None => SessionConfig::default(),
        };
        tracing::debug!(
            products = catalog.products.len(),
            owned = catalog.owned.len(),
            "catalog loaded"
        );

        let backend = Arc::new(
            InMemoryBackend::new(catalog.store)
                .with_products(catalog.products)
                .with_owned(catalog.owned)
                .with_storefront(catalog.storefront),
        );
        let session = BillingSession::new(backend.clone(), config);
        session.attach_host(Arc::new(NamedHost::new("iapkit-demo")));
        Ok(Self { backend, session })
    }

    /// Connect or fail with the recorded reason
    pub async fn connect(&self) -> Result<()> {
        self.session
            .try_connect()
            .await
            .context("Failed to connect to the billing service")
    }
}

/// Convert command-line ids
pub fn product_ids(raw: &[String]) -> Vec<ProductId> {
    raw.iter().map(|s| ProductId::from(s.as_str())).collect()
}

impl From<KindArg> for ProductQuery {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Inapp => ProductQuery::InApp,
            KindArg::Subs => ProductQuery::Subs,
            KindArg::All => ProductQuery::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_catalog_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "storefront": "FR",
                "products": [{{
                    "id": "gems",
                    "kind": "inapp",
                    "title": "Gems",
                    "display_price": "€1,99",
                    "price": {{ "amount": "1.99", "currency": "EUR" }}
                }}]
            }}"#
        )
        .unwrap();

        let catalog = Catalog::load(Some(file.path())).unwrap();
        assert_eq!(catalog.storefront, "FR");
        assert_eq!(catalog.store, StoreKind::PlayStore);
        assert_eq!(catalog.products[0].id.as_str(), "gems");
        assert!(catalog.owned.is_empty());
    }

    #[test]
    fn test_missing_catalog_file() {
        let err = Catalog::load(Some(Path::new("/nonexistent/catalog.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog"));
    }

    #[tokio::test]
    async fn test_builtin_context_connects() {
        let ctx = DemoContext::open(None, None).unwrap();
        ctx.connect().await.unwrap();
        let products = ctx
            .session
            .fetch_products(&product_ids(&["coins_100".into()]), ProductQuery::InApp)
            .await
            .unwrap();
        assert_eq!(products.len(), 1);
    }
}
