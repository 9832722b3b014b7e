//! Stored-request/impression fetch + TTL cache + deep merge
//! (spec.md §4.1).
//!
//! Grounded on the teacher's `moka::sync::Cache` usage for device/ip
//! lookups (`app/config.rs::CacheConfig`) and `core/config_manager.rs`'s
//! pattern of a trait-free external-fetch boundary wrapped by an
//! in-process cache.

pub mod merge;

use async_trait::async_trait;
use moka::sync::Cache;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Request,
    Impression,
    Account,
}

#[derive(Debug, Clone)]
pub enum StoreFetchError {
    NotFound,
    Transport(String),
}

/// External collaborator boundary: the persistence layer behind stored
/// configs (spec.md §1, out of core). Production wiring is external;
/// tests supply an in-memory fake.
#[async_trait]
pub trait StoredConfigStore: Send + Sync {
    async fn fetch(&self, kind: StoreKind, id: &str) -> Result<Value, StoreFetchError>;

    /// Cheap liveness probe used by `GET /health/ready` (spec.md §6).
    /// Defaults to "healthy"; a real backend overrides this with an
    /// actual connectivity check.
    async fn health_check(&self) -> bool {
        true
    }
}

/// A best-effort batch fetch, with missing IDs yielded per-id as
/// `NotFound` rather than failing the whole batch (spec.md §4.1).
pub struct StoreCache {
    store: Arc<dyn StoredConfigStore>,
    cache: Cache<(StoreKind, String), Value>,
}

impl StoreCache {
    pub fn new(store: Arc<dyn StoredConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Fetches and caches a single entry; transport errors bypass the
    /// cache and are not stored (spec.md §4.1).
    pub async fn fetch(&self, kind: StoreKind, id: &str) -> Result<Value, StoreFetchError> {
        if let Some(hit) = self.cache.get(&(kind, id.to_string())) {
            return Ok(hit);
        }

        let value = self.store.fetch(kind, id).await?;
        self.cache.insert((kind, id.to_string()), value.clone());
        Ok(value)
    }

    pub async fn fetch_many(
        &self,
        kind: StoreKind,
        ids: &[String],
    ) -> HashMap<String, Result<Value, StoreFetchError>> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            out.insert(id.clone(), self.fetch(kind, id).await);
        }
        out
    }

    pub fn invalidate(&self, kind: StoreKind, id: &str) {
        self.cache.invalidate(&(kind, id.to_string()));
    }

    /// Single publisher-account lookup (spec.md §4.1 `fetch_account`).
    /// Not cached separately from other kinds: account config changes
    /// (floor overrides, margin policy) should be picked up within one
    /// TTL window like any other stored entity.
    pub async fn fetch_account(&self, id: &str) -> Result<Value, StoreFetchError> {
        self.fetch(StoreKind::Account, id).await
    }

    pub async fn is_healthy(&self) -> bool {
        self.store.health_check().await
    }
}
