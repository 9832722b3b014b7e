//! Bidder adapter contract and registry (spec.md §4.2).
//!
//! Grounded on the teacher's `core::managers::publishers::PublisherManager`
//! (copy-on-write `ArcSwap<HashMap<...>>`, spec.md §5 "Favour
//! copy-on-write for the registry") and its `Provider<T>` trait shape in
//! `core/providers/provider.rs`.

use crate::rtb::{BidRequest, BidType, Bid};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct TypedBid {
    pub bid: Bid,
    pub bid_type: Option<BidType>,
    pub video_cache_id: Option<String>,
    pub deal_tier: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AdapterParseResult {
    pub bids: Vec<TypedBid>,
    pub currency: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BidderInfo {
    pub enabled: bool,
    pub maintainer: String,
    pub supported_media_types: Vec<BidType>,
    pub supports_gdpr: bool,
    pub supports_ccpa: bool,
    pub usersync_urls: Vec<String>,
}

/// The per-bidder integration contract. Implementations are pure with
/// respect to shared state: they receive an owned request clone and may
/// not retain it or any sub-object beyond the call (spec.md §3 Ownership,
/// §9 "Request cloning").
#[async_trait]
pub trait BidderAdapter: Send + Sync {
    fn code(&self) -> &str;

    fn info(&self) -> BidderInfo;

    fn build_requests(
        &self,
        request: &BidRequest,
        fpd_view: &serde_json::Value,
    ) -> Result<Vec<HttpRequest>, anyhow::Error>;

    fn parse_response(
        &self,
        http_response: &HttpResponse,
        original_request: &BidRequest,
    ) -> Result<AdapterParseResult, anyhow::Error>;
}

/// Case-insensitive, copy-on-write bidder namespace. Enumeration yields a
/// stable ordering (insertion order of the snapshot) per spec.md §4.2.
pub struct AdapterRegistry {
    by_code: ArcSwap<HashMap<String, Arc<dyn BidderAdapter>>>,
    order: ArcSwap<Vec<String>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            by_code: ArcSwap::from_pointee(HashMap::new()),
            order: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn from_adapters(adapters: Vec<Arc<dyn BidderAdapter>>) -> Self {
        let registry = Self::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    pub fn register(&self, adapter: Arc<dyn BidderAdapter>) {
        let key = adapter.code().to_lowercase();

        let mut map = (**self.by_code.load()).clone();
        let is_new = !map.contains_key(&key);
        map.insert(key.clone(), adapter);
        self.by_code.store(Arc::new(map));

        if is_new {
            let mut order = (**self.order.load()).clone();
            order.push(key);
            self.order.store(Arc::new(order));
        }
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn BidderAdapter>> {
        self.by_code.load().get(&code.to_lowercase()).cloned()
    }

    /// Stable-order snapshot of currently registered, enabled bidder
    /// codes.
    pub fn enabled_codes(&self) -> Vec<String> {
        let map = self.by_code.load();
        self.order
            .load()
            .iter()
            .filter(|code| map.get(*code).map(|a| a.info().enabled).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Intersects the request-declared bidder codes with the registry and
    /// enablement flags (spec.md §4.3 step 3).
    pub fn resolve(&self, requested: &[String]) -> Vec<Arc<dyn BidderAdapter>> {
        let map = self.by_code.load();
        requested
            .iter()
            .filter_map(|code| {
                let adapter = map.get(&code.to_lowercase())?;
                if adapter.info().enabled {
                    Some(adapter.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAdapter {
        code: String,
        enabled: bool,
    }

    #[async_trait]
    impl BidderAdapter for StubAdapter {
        fn code(&self) -> &str {
            &self.code
        }

        fn info(&self) -> BidderInfo {
            BidderInfo {
                enabled: self.enabled,
                ..Default::default()
            }
        }

        fn build_requests(
            &self,
            _request: &BidRequest,
            _fpd_view: &serde_json::Value,
        ) -> Result<Vec<HttpRequest>, anyhow::Error> {
            Ok(vec![])
        }

        fn parse_response(
            &self,
            _http_response: &HttpResponse,
            _original_request: &BidRequest,
        ) -> Result<AdapterParseResult, anyhow::Error> {
            Ok(AdapterParseResult::default())
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { code: "AdapterA".into(), enabled: true }));

        assert!(registry.get("adaptera").is_some());
        assert!(registry.get("ADAPTERA").is_some());
    }

    #[test]
    fn resolve_skips_disabled_and_unknown() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { code: "a".into(), enabled: true }));
        registry.register(Arc::new(StubAdapter { code: "b".into(), enabled: false }));

        let resolved = registry.resolve(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].code(), "a");
    }

    #[test]
    fn enumeration_is_stable_ordered() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { code: "z".into(), enabled: true }));
        registry.register(Arc::new(StubAdapter { code: "a".into(), enabled: true }));

        assert_eq!(registry.enabled_codes(), vec!["z".to_string(), "a".to_string()]);
    }
}
