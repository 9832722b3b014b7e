//! Exchange tuning knobs (spec.md §6), grounded on the teacher's
//! `app/config.rs` `Builder`-derived config structs with `serde(default)`
//! for YAML-loaded optional fields.

use crate::circuit::CircuitBreakerConfig;
use crate::resolver::{AuctionType, PriceGranularity};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default)]
pub struct ExchangeConfig {
    pub default_timeout_ms: u64,
    pub max_bidders: usize,
    pub max_concurrent_bidders: usize,
    #[serde(with = "auction_type_serde")]
    pub auction_type: AuctionType,
    pub currency_enabled: bool,
    pub default_currency: String,
    pub event_record_enabled: bool,
    pub event_buffer_size: usize,
    pub floor_safety_margin_ms: u64,
    /// Gates `ext.prebid.debug` in the response (spec.md §7): debug
    /// payloads are attached only when the caller requested them *and*
    /// this is `true`. Default `false` in production; tests flip it on.
    pub debug_authorized: bool,
    #[serde(skip)]
    pub price_granularity: PriceGranularity,
    #[serde(skip)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 1000,
            max_bidders: 20,
            max_concurrent_bidders: 50,
            auction_type: AuctionType::SecondPrice,
            currency_enabled: true,
            default_currency: "USD".to_string(),
            event_record_enabled: true,
            event_buffer_size: 4096,
            floor_safety_margin_ms: 20,
            debug_authorized: false,
            price_granularity: PriceGranularity::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ExchangeConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// The dispatch deadline is `tmax_ms` minus the configured safety
    /// margin reserved for response assembly (spec.md §4.3 "leave
    /// headroom to assemble and serialize the response").
    pub fn dispatch_budget(&self, tmax_ms: i64) -> Duration {
        let budget = tmax_ms.saturating_sub(self.floor_safety_margin_ms as i64).max(0);
        Duration::from_millis(budget as u64)
    }
}

mod auction_type_serde {
    use super::AuctionType;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &AuctionType, serializer: S) -> Result<S::Ok, S::Error> {
        let s = match value {
            AuctionType::FirstPrice => "first_price",
            AuctionType::SecondPrice => "second_price",
        };
        serializer.serialize_str(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AuctionType, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "first_price" => Ok(AuctionType::FirstPrice),
            "second_price" => Ok(AuctionType::SecondPrice),
            other => Err(serde::de::Error::custom(format!("unknown auction_type: {other}"))),
        }
    }
}
