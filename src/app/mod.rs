//! Process lifecycle: config load, observability bootstrap, collaborator
//! wiring, into one shared [`Exchange`]. Grounded on the teacher's
//! `app/lifecycle/startup/startup.rs` ordered-steps pattern (config,
//! then observability, then managers, then the pipeline).

pub mod config;

use crate::adapter::AdapterRegistry;
use crate::adjuster::{AdjusterBounds, BidAdjuster};
use crate::circuit::CircuitBreaker;
use crate::currency::CurrencyConverter;
use crate::exchange::{Exchange, ExchangeServices};
use crate::fpd::FpdProcessor;
use crate::margin::{InfeasiblePolicy, MarginEngine, MarginPolicy};
use crate::observability::{self, ObservabilityGuard};
use crate::privacy::{BidderPrivacyCapabilities, PrivacySignals};
use config::AppConfig;
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    pub config: AppConfig,
    pub exchange: Arc<Exchange>,
    _observability_guard: ObservabilityGuard,
}

/// Brings the process up in the teacher's order: load config, install
/// the global tracing subscriber, then assemble the stateless
/// collaborators the hot path needs, finally constructing the
/// [`Exchange`]. Any step failing aborts startup (spec.md §9 "fail
/// closed on startup, fail open on a single auction").
pub fn bootstrap(config_path: &str) -> Result<App, anyhow::Error> {
    let config = config::load(config_path)?;

    let observability_guard = observability::init(&config.observability)?;

    let registry = Arc::new(AdapterRegistry::new());
    let circuit_breaker = Arc::new(CircuitBreaker::new(config.exchange.circuit_breaker.clone()));
    let currency = Arc::new(CurrencyConverter::default());
    let resolver = Arc::new(crate::resolver::AuctionResolver::new(
        config.exchange.auction_type,
        config.exchange.price_granularity.clone(),
    ));
    let adjuster = Arc::new(BidAdjuster::new(vec![], AdjusterBounds::default()));
    let margin = Arc::new(MarginEngine::new(MarginPolicy::default(), InfeasiblePolicy::ReduceMargin));

    let transport = Arc::new(crate::exchange::transport::ReqwestTransport::new(Duration::from_millis(
        config.exchange.default_timeout_ms.min(2000),
    ))?);

    let telemetry = if config.exchange.event_record_enabled {
        Some(crate::telemetry::TelemetrySink::spawn(config.exchange.event_buffer_size, |event| {
            tracing::debug!(?event, "telemetry event");
        }))
    } else {
        None
    };

    let services = ExchangeServices {
        registry,
        circuit_breaker,
        currency,
        resolver,
        adjuster,
        margin,
        store: None,
        telemetry,
        transport,
        privacy_signals_resolver: Arc::new(|_req| PrivacySignals::default()),
        bidder_privacy_caps: Arc::new(|_code: &str| BidderPrivacyCapabilities::default()),
        fpd: Arc::new(parking_lot::RwLock::new(FpdProcessor::new())),
        config: Arc::new(config.exchange.clone()),
    };

    let exchange = Arc::new(Exchange::new(services));

    Ok(App { config, exchange, _observability_guard: observability_guard })
}
