//! The auction's pipeline stages (spec.md §4.3.1), each an
//! [`AsyncTask`] run in order against one [`AuctionContext`]. Grounded on
//! the teacher's `app/pipeline/ortb/tasks/auction/*` one-struct-per-stage
//! layout; every stage short-circuits once `ctx.res` has already been set
//! by an earlier stage (the teacher's `OnceLock`-guarded early-exit
//! idiom).

use crate::adapter::TypedBid;
use crate::circuit::CallOutcome;
use crate::exchange::context::{AuctionContext, BidderCallout, BidderContext};
use crate::pipeline::AsyncTask;
use crate::privacy;
use crate::resolver::Candidate;
use crate::rtb::nobidreason;
use crate::telemetry::TelemetryEvent;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Instant;

/// spec.md §4.6's named floor-violation counter, kept distinct from the
/// generic `BidError{reason: "below_floor"}` telemetry event so a floor
/// breach is queryable without filtering analytics event payloads.
static COUNTER_FLOOR_ENFORCED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    global::meter("exchange:floors")
        .u64_counter("floor.enforced")
        .with_description("Count of bids rejected for failing to clear the effective floor")
        .with_unit("1")
        .build()
});

fn already_resolved(ctx: &AuctionContext) -> bool {
    ctx.res.get().is_some()
}

pub struct MergeStoredRequestTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for MergeStoredRequestTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        let Some(store) = &ctx.services.store else {
            return Ok(());
        };

        let incoming = ctx.req.read().clone();

        let stored_request = match incoming.stored_ref() {
            Some(r) => store.fetch(crate::store::StoreKind::Request, &r.id).await.ok(),
            None => None,
        };

        let stored_imp_refs: Vec<String> = incoming
            .imp
            .iter()
            .filter_map(|imp| imp.stored_ref().map(|r| r.id))
            .collect();

        let stored_imps = store.fetch_many(crate::store::StoreKind::Impression, &stored_imp_refs).await;
        let stored_imps: std::collections::HashMap<String, serde_json::Value> = stored_imps
            .into_iter()
            .filter_map(|(id, result)| result.ok().map(|v| (id, v)))
            .collect();

        match crate::store::merge::merge_request(&incoming, stored_request, &stored_imps) {
            Ok(outcome) => {
                *ctx.req.write() = outcome.merged;
                ctx.warnings.lock().extend(outcome.warnings);
            }
            Err(err) => {
                ctx.warnings.lock().push(format!("stored request merge failed: {err}"));
            }
        }

        Ok(())
    }
}

pub struct ValidateRequestTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for ValidateRequestTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        let invalid = ctx.req.read().validate().err();
        if let Some(reason) = invalid {
            ctx.warnings.lock().push(reason);
            ctx.set_no_bid(nobidreason::INVALID_REQUEST, ctx.warnings.lock().last().cloned());
        }
        Ok(())
    }
}

pub struct ResolveBiddersTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for ResolveBiddersTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        if already_resolved(ctx) {
            return Ok(());
        }

        let requested: Vec<String> = {
            let req = ctx.req.read();
            req.ext
                .get("prebid")
                .and_then(|p| p.get("bidders"))
                .and_then(|b| b.as_object())
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default()
        };

        let requested: Vec<String> = requested
            .into_iter()
            .take(ctx.services.config.max_bidders)
            .collect();

        let resolved = ctx.services.registry.resolve(&requested);
        if resolved.is_empty() {
            ctx.set_no_bid(nobidreason::NO_BUYERS_PREMATCHED, Some("no registered bidder matched the request".to_string()));
            return Ok(());
        }

        let signals = (ctx.services.privacy_signals_resolver)(&ctx.req.read());

        let mut bidders = ctx.bidders.lock();
        let mut all_privacy_blocked = true;
        for adapter in resolved {
            let caps = (ctx.services.bidder_privacy_caps)(adapter.code());
            let decision = privacy::evaluate(&signals, &caps);

            if !decision.allowed {
                bidders.push(BidderContext {
                    bidder_code: adapter.code().to_string(),
                    callout: BidderCallout { skip_reason: Some("privacy_blocked"), ..Default::default() },
                });
                continue;
            }
            all_privacy_blocked = false;

            if !ctx.services.circuit_breaker.try_acquire(adapter.code()) {
                bidders.push(BidderContext {
                    bidder_code: adapter.code().to_string(),
                    callout: BidderCallout { skip_reason: Some("circuit_open"), ..Default::default() },
                });
                continue;
            }

            bidders.push(BidderContext {
                bidder_code: adapter.code().to_string(),
                callout: BidderCallout::default(),
            });
        }

        if bidders.iter().all(|b| b.callout.skip_reason == Some("circuit_open")) && !bidders.is_empty() {
            drop(bidders);
            ctx.set_no_bid(nobidreason::ALL_BIDDERS_CIRCUIT_OPEN, Some("every matched bidder's circuit is open".to_string()));
        } else if all_privacy_blocked {
            drop(bidders);
            ctx.set_no_bid(nobidreason::ALL_BIDDERS_BLOCKED_BY_PRIVACY, Some("every matched bidder was blocked by privacy signals".to_string()));
        }

        Ok(())
    }
}

pub struct FloorResolutionTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for FloorResolutionTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        if already_resolved(ctx) {
            return Ok(());
        }

        let req = ctx.req.read();
        let auction_cur = req.auction_currency().to_string();
        let mut floors = ctx.floors.lock();
        for imp in &req.imp {
            let deal_floor = imp
                .pmp
                .as_ref()
                .and_then(|p| p.deals.first())
                .map(|d| d.bidfloor);

            let overrides = crate::floors::FloorOverrides { publisher_floor_override: None, deal_floor };
            match crate::floors::effective_floor_usd(imp, overrides, &auction_cur, &ctx.services.currency) {
                Ok(floor) => {
                    floors.insert(imp.id.clone(), floor);
                }
                Err(_) => {
                    ctx.warnings.lock().push(format!("unknown floor currency for imp {}", imp.id));
                }
            }
        }

        Ok(())
    }
}

pub struct FanOutTask;

impl FanOutTask {
    async fn dispatch_one(
        ctx: &AuctionContext,
        bidder_code: String,
        base_json: serde_json::Value,
        deadline: Instant,
    ) -> BidderCallout {
        let Some(adapter) = ctx.services.registry.get(&bidder_code) else {
            return BidderCallout { skip_reason: Some("unknown_bidder"), ..Default::default() };
        };

        if let Some(sink) = &ctx.services.telemetry {
            sink.emit(TelemetryEvent::BidRequestSent {
                request_id: ctx.original_auction_id.clone(),
                bidder: bidder_code.clone(),
            });
        }

        let fpd_view = ctx.services.fpd.read().view_for(&bidder_code, &base_json);
        let req_snapshot = ctx.req.read().clone();

        let http_requests = match adapter.build_requests(&req_snapshot, &fpd_view) {
            Ok(reqs) => reqs,
            Err(err) => {
                ctx.services.circuit_breaker.record(&bidder_code, CallOutcome::Failure);
                if let Some(sink) = &ctx.services.telemetry {
                    sink.emit(TelemetryEvent::BidError {
                        request_id: ctx.original_auction_id.clone(),
                        bidder: bidder_code.clone(),
                        reason: err.to_string(),
                    });
                }
                return BidderCallout { skip_reason: Some("adapter_build_error"), ..Default::default() };
            }
        };

        let mut bids = Vec::new();
        let mut currency = None;
        let mut any_failure = false;

        for http_request in http_requests {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                any_failure = true;
                break;
            }

            let outcome = tokio::time::timeout(remaining, ctx.services.transport.send(http_request)).await;

            let http_response = match outcome {
                Ok(Ok(resp)) => resp,
                Ok(Err(_)) | Err(_) => {
                    any_failure = true;
                    continue;
                }
            };

            if http_response.status >= 500 {
                any_failure = true;
                continue;
            }

            match adapter.parse_response(&http_response, &req_snapshot) {
                Ok(parsed) => {
                    if let Some(sink) = &ctx.services.telemetry {
                        for typed_bid in &parsed.bids {
                            sink.emit(TelemetryEvent::BidReceived {
                                request_id: ctx.original_auction_id.clone(),
                                bidder: bidder_code.clone(),
                                imp_id: typed_bid.bid.imp_id.clone(),
                                price: typed_bid.bid.price,
                            });
                        }
                    }
                    bids.extend(parsed.bids);
                    if currency.is_none() {
                        currency = parsed.currency;
                    }
                }
                Err(_) => any_failure = true,
            }
        }

        ctx.services.circuit_breaker.record(
            &bidder_code,
            if any_failure { CallOutcome::Failure } else { CallOutcome::Success },
        );

        if let Some(sink) = &ctx.services.telemetry {
            if bids.is_empty() {
                sink.emit(TelemetryEvent::NoBid {
                    request_id: ctx.original_auction_id.clone(),
                    bidder: bidder_code.clone(),
                    reason: if any_failure { "transport_error".to_string() } else { "no_bid".to_string() },
                });
            }
        }

        BidderCallout { response: bids, response_currency: currency, skip_reason: None, arrival_order: Some(ctx.next_arrival()) }
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for FanOutTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        if already_resolved(ctx) {
            return Ok(());
        }

        let base_json = serde_json::to_value(&*ctx.req.read()).unwrap_or_default();
        let pending: Vec<String> = ctx
            .bidders
            .lock()
            .iter()
            .filter(|b| b.callout.skip_reason.is_none())
            .map(|b| b.bidder_code.clone())
            .collect();

        let concurrency = ctx.services.config.max_concurrent_bidders.max(1);
        let deadline = ctx.deadline;

        let results: Vec<(String, BidderCallout)> = stream::iter(pending.into_iter())
            .map(|bidder_code| {
                let base_json = base_json.clone();
                async move {
                    let callout = Self::dispatch_one(ctx, bidder_code.clone(), base_json, deadline).await;
                    (bidder_code, callout)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut bidders = ctx.bidders.lock();
        for (code, callout) in results {
            if let Some(entry) = bidders.iter_mut().find(|b| b.bidder_code == code) {
                entry.callout = callout;
            }
        }

        Ok(())
    }
}

pub struct NormalizeAndValidateTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for NormalizeAndValidateTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        if already_resolved(ctx) {
            return Ok(());
        }

        let req = ctx.req.read();
        let auction_cur = req.auction_currency().to_string();
        let floors = ctx.floors.lock();
        let mut candidates = ctx.candidates.lock();
        let mut seen: HashSet<(String, String, String)> = HashSet::new();

        let bidders = ctx.bidders.lock();
        for bidder_ctx in bidders.iter() {
            for typed_bid in &bidder_ctx.callout.response {
                let bid = &typed_bid.bid;
                let key = (bidder_ctx.bidder_code.clone(), bid.imp_id.clone(), bid.id.clone());
                if !seen.insert(key) {
                    emit_bid_error(ctx, &bidder_ctx.bidder_code, "duplicate");
                    continue;
                }

                let Some(imp) = req.imp.iter().find(|i| i.id == bid.imp_id) else {
                    emit_bid_error(ctx, &bidder_ctx.bidder_code, "unknown_imp");
                    continue;
                };

                if let Some(bid_type) = typed_bid.bid_type {
                    if !imp.supports(bid_type) {
                        emit_bid_error(ctx, &bidder_ctx.bidder_code, "media_mismatch");
                        continue;
                    }
                }

                if !bid.has_creative() {
                    emit_bid_error(ctx, &bidder_ctx.bidder_code, "missing_creative");
                    continue;
                }

                let source_currency = bidder_ctx
                    .callout
                    .response_currency
                    .clone()
                    .unwrap_or_else(|| bid.currency.clone());

                let converted = match ctx.services.currency.convert(bid.price, &source_currency, &auction_cur) {
                    Ok(v) => v,
                    Err(_) => {
                        emit_bid_error(ctx, &bidder_ctx.bidder_code, "unknown_currency");
                        continue;
                    }
                };

                let media_type = typed_bid.bid_type.map(|t| t.to_string()).unwrap_or_default();
                let adjusted = ctx.services.adjuster.apply(
                    converted,
                    &crate::adjuster::MatchContext {
                        bidder: &bidder_ctx.bidder_code,
                        media_type: &media_type,
                        deal_id: bid.deal_id.as_deref(),
                        publisher_id: &ctx.publisher_id,
                    },
                );

                let floor = floors.get(&bid.imp_id).copied().unwrap_or(0.0);
                if adjusted < floor {
                    COUNTER_FLOOR_ENFORCED.add(1, &[KeyValue::new("bidder", bidder_ctx.bidder_code.clone())]);
                    ctx.no_bid_reasons.lock().push(nobidreason::BELOW_FLOOR);
                    emit_bid_error(ctx, &bidder_ctx.bidder_code, "below_floor");
                    continue;
                }

                let arrival = bidder_ctx.callout.arrival_order.unwrap_or_else(|| ctx.next_arrival());

                candidates.entry(bid.imp_id.clone()).or_default().push(Candidate {
                    bidder_code: bidder_ctx.bidder_code.clone(),
                    typed_bid: typed_bid.clone(),
                    effective_price: adjusted,
                    has_deal: bid.deal_id.is_some(),
                    arrival_order: arrival,
                });
            }
        }

        Ok(())
    }
}

fn emit_bid_error(ctx: &AuctionContext, bidder: &str, reason: &str) {
    if let Some(sink) = &ctx.services.telemetry {
        sink.emit(TelemetryEvent::BidError {
            request_id: ctx.original_auction_id.clone(),
            bidder: bidder.to_string(),
            reason: reason.to_string(),
        });
    }
}

pub struct ResolveWinnersTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for ResolveWinnersTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        if already_resolved(ctx) {
            return Ok(());
        }

        let req = ctx.req.read();
        let floors = ctx.floors.lock();
        let mut candidates = ctx.candidates.lock();
        let mut winners = ctx.winners.lock();

        for imp in &req.imp {
            let imp_candidates: Vec<Candidate> = candidates.remove(&imp.id).unwrap_or_default();
            let floor = floors.get(&imp.id).copied().unwrap_or(0.0);

            if let Some(winner) = ctx.services.resolver.resolve_imp(&imp.id, imp_candidates, floor) {
                if let Some(sink) = &ctx.services.telemetry {
                    sink.emit(TelemetryEvent::BidWon {
                        request_id: ctx.original_auction_id.clone(),
                        imp_id: imp.id.clone(),
                        bidder: winner.bidder_code.clone(),
                        clearing_price: winner.clearing_price,
                    });
                }
                winners.insert(imp.id.clone(), winner);
            }
        }

        Ok(())
    }
}

pub struct MarginTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for MarginTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        if already_resolved(ctx) {
            return Ok(());
        }

        let mut winners = ctx.winners.lock();
        let mut payouts = ctx.publisher_payouts.lock();
        let mut infeasible = Vec::new();

        for (imp_id, winner) in winners.iter() {
            match ctx.services.margin.apply(&ctx.publisher_id, &winner.bidder_code, winner.clearing_price) {
                Some(outcome) => {
                    payouts.insert(imp_id.clone(), outcome);
                }
                None => infeasible.push(imp_id.clone()),
            }
        }

        for imp_id in infeasible {
            winners.remove(&imp_id);
        }

        Ok(())
    }
}

pub struct AssembleResponseTask;

#[async_trait]
impl AsyncTask<AuctionContext, anyhow::Error> for AssembleResponseTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), anyhow::Error> {
        if already_resolved(ctx) {
            return Ok(());
        }

        let winners = ctx.winners.lock();
        if winners.is_empty() {
            let reasons = ctx.no_bid_reasons.lock().clone();
            let nbr = if reasons.is_empty() { nobidreason::NO_CAMPAIGNS_FOUND } else { nobidreason::dominant(&reasons) };
            drop(winners);
            ctx.set_no_bid(nbr, Some("no impression cleared".to_string()));
            return Ok(());
        }

        let req = ctx.req.read();
        let auction_cur = req.auction_currency().to_string();

        let mut by_bidder: std::collections::HashMap<String, Vec<TypedBid>> = std::collections::HashMap::new();
        for winner in winners.values() {
            let targeting = crate::resolver::targeting_keys(winner);
            let mut bid = winner.typed_bid.bid.clone();
            bid.price = winner.clearing_price;
            bid.ext = serde_json::json!({
                "prebid": {
                    "targeting": {
                        "hb_pb": targeting.hb_pb,
                        "hb_bidder": targeting.hb_bidder,
                        "hb_size": targeting.hb_size,
                        "hb_deal": targeting.hb_deal,
                    }
                }
            });

            let mut typed = winner.typed_bid.clone();
            typed.bid = bid;
            by_bidder.entry(winner.bidder_code.clone()).or_default().push(typed);
        }

        let seatbid = by_bidder
            .into_iter()
            .map(|(seat, typed_bids)| crate::rtb::SeatBid {
                seat,
                bid: typed_bids.into_iter().map(|t| t.bid).collect(),
            })
            .collect();

        let ext = if ctx.debug_requested && ctx.debug_authorized {
            serde_json::json!({ "debug": { "warnings": ctx.warnings.lock().clone() } })
        } else {
            serde_json::Value::Null
        };

        let response = crate::rtb::BidResponse {
            id: ctx.original_auction_id.clone(),
            seatbid,
            cur: auction_cur,
            nbr: None,
            ext,
        };

        let _ = ctx.res.set(crate::rtb::BidResponseState::Bid(response));
        Ok(())
    }
}
