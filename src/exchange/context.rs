use crate::adapter::{AdapterRegistry, TypedBid};
use crate::adjuster::BidAdjuster;
use crate::circuit::CircuitBreaker;
use crate::currency::CurrencyConverter;
use crate::fpd::FpdProcessor;
use crate::margin::MarginEngine;
use crate::privacy::{BidderPrivacyCapabilities, PrivacySignals};
use crate::resolver::AuctionResolver;
use crate::rtb::BidRequest;
use crate::rtb::BidResponseState;
use crate::store::StoreCache;
use crate::telemetry::TelemetrySink;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// The shared, thread-safe collaborators an auction pulls from. One
/// instance lives for the life of the process and is cheaply cloned
/// (every field is already an `Arc`), matching spec.md §5 "the Exchange
/// object is shared and thread-safe".
#[derive(Clone)]
pub struct ExchangeServices {
    pub registry: Arc<AdapterRegistry>,
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub currency: Arc<CurrencyConverter>,
    pub resolver: Arc<AuctionResolver>,
    pub adjuster: Arc<BidAdjuster>,
    pub margin: Arc<MarginEngine>,
    pub store: Option<Arc<StoreCache>>,
    pub telemetry: Option<Arc<TelemetrySink>>,
    pub transport: Arc<dyn crate::exchange::transport::BidderTransport>,
    pub privacy_signals_resolver: Arc<dyn Fn(&BidRequest) -> PrivacySignals + Send + Sync>,
    pub bidder_privacy_caps: Arc<dyn Fn(&str) -> BidderPrivacyCapabilities + Send + Sync>,
    pub fpd: Arc<parking_lot::RwLock<FpdProcessor>>,
    pub config: Arc<crate::exchange::ExchangeConfig>,
}

#[derive(Debug, Clone)]
pub struct CalloutSkip {
    pub reason_code: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct BidderCallout {
    pub response: Vec<TypedBid>,
    pub response_currency: Option<String>,
    pub skip_reason: Option<&'static str>,
    pub arrival_order: Option<u64>,
}

pub struct BidderContext {
    pub bidder_code: String,
    pub callout: BidderCallout,
}

/// Top-level auction context carried through the pipeline. Interior
/// mutability mirrors the teacher's `AuctionContext`
/// (`app/pipeline/ortb/context.rs`): `RwLock` for the evolving request,
/// `OnceLock` for the terminal response, `Mutex` for collections mutated
/// by concurrent fan-out workers.
pub struct AuctionContext {
    pub services: ExchangeServices,
    pub publisher_id: String,
    pub original_auction_id: String,
    pub req: RwLock<BidRequest>,
    pub res: OnceLock<BidResponseState>,
    pub deadline: Instant,
    pub floors: Mutex<HashMap<String, f64>>,
    pub bidders: Mutex<Vec<BidderContext>>,
    pub warnings: Mutex<Vec<String>>,
    pub no_bid_reasons: Mutex<Vec<i32>>,
    pub arrival_counter: AtomicU64,
    pub candidates: Mutex<HashMap<String, Vec<crate::resolver::Candidate>>>,
    pub winners: Mutex<HashMap<String, crate::resolver::Winner>>,
    pub publisher_payouts: Mutex<HashMap<String, crate::margin::MarginOutcome>>,
    pub debug_requested: bool,
    pub debug_authorized: bool,
}

impl AuctionContext {
    pub fn new(
        services: ExchangeServices,
        publisher_id: String,
        req: BidRequest,
        deadline: Instant,
        debug_authorized: bool,
    ) -> Self {
        let debug_requested = req
            .ext
            .get("prebid")
            .and_then(|p| p.get("debug"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        Self {
            services,
            publisher_id,
            original_auction_id: req.id.clone(),
            req: RwLock::new(req),
            res: OnceLock::new(),
            deadline,
            floors: Mutex::new(HashMap::new()),
            bidders: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            no_bid_reasons: Mutex::new(Vec::new()),
            arrival_counter: AtomicU64::new(0),
            candidates: Mutex::new(HashMap::new()),
            winners: Mutex::new(HashMap::new()),
            publisher_payouts: Mutex::new(HashMap::new()),
            debug_requested,
            debug_authorized,
        }
    }

    pub fn next_arrival(&self) -> u64 {
        self.arrival_counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn set_no_bid(&self, nbr: i32, desc: Option<String>) {
        self.no_bid_reasons.lock().push(nbr);
        let _ = self.res.set(BidResponseState::NoBidReason {
            reqid: self.original_auction_id.clone(),
            nbr,
            desc,
        });
    }
}
