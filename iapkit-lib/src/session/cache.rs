//! Product metadata cache.
//!
//! Entries are keyed by (id, kind) and live until the session disconnects.
//! The map never leaves this module by reference; callers get clones.

use crate::models::Product;
use crate::{ProductId, ProductKind};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

type Key = (ProductId, ProductKind);

#[derive(Default)]
struct CacheState {
    products: HashMap<Key, Product>,
    /// Ids a query for this kind did not return.
    missing: HashSet<Key>,
}

/// Per-session product cache.
#[derive(Default)]
pub struct ProductCache {
    state: RwLock<CacheState>,
}

impl ProductCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `id` of `kind`.
    pub fn get(&self, id: &ProductId, kind: ProductKind) -> Option<Product> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.products.get(&(id.clone(), kind)).cloned()
    }

    /// Ids of `kind` that need a backend query, deduplicated, in first-seen order.
    ///
    /// With `skip_known_missing`, ids a previous query did not return are not
    /// asked for again.
    pub fn misses(
        &self,
        ids: &[ProductId],
        kind: ProductKind,
        skip_known_missing: bool,
    ) -> Vec<ProductId> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(*id))
            .filter(|id| {
                let key = ((*id).clone(), kind);
                !state.products.contains_key(&key)
                    && !(skip_known_missing && state.missing.contains(&key))
            })
            .cloned()
            .collect()
    }

    /// Store the answer to a query for `requested` ids of `kind`.
    ///
    /// Returned products replace entries with the same key. Requested ids the
    /// backend did not return are remembered as missing.
    pub fn store_query(
        &self,
        requested: &[ProductId],
        kind: ProductKind,
        products: Vec<Product>,
    ) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let returned: HashSet<Key> = products.iter().map(|p| (p.id.clone(), p.kind)).collect();
        for id in requested {
            let key = (id.clone(), kind);
            if !returned.contains(&key) {
                state.missing.insert(key);
            }
        }
        for product in products {
            let key = (product.id.clone(), product.kind);
            state.missing.remove(&key);
            state.products.insert(key, product);
        }
    }

    /// Cached entries for `ids` in caller order, one per kind in `kinds` order.
    ///
    /// Ids without an entry are skipped; repeated ids appear once.
    pub fn collect(&self, ids: &[ProductId], kinds: &[ProductKind]) -> Vec<Product> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(ids.len() * kinds.len());
        for id in ids.iter().filter(|id| seen.insert(*id)) {
            for kind in kinds {
                if let Some(product) = state.products.get(&(id.clone(), *kind)) {
                    out.push(product.clone());
                }
            }
        }
        out
    }

    /// Number of cached products.
    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.products.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, including remembered misses.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.products.clear();
        state.missing.clear();
    }
}
