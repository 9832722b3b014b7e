//! The Exchange: the hot-path auction orchestrator (spec.md §4.3).
//!
//! Grounded on the teacher's `app/pipeline/ortb/pipeline.rs`
//! (`PipelineBuilder::new().with_async(...).build()` composition) wired
//! around an `AuctionContext` the way
//! `app/pipeline/ortb/context.rs`/`tasks/auction/*` do, generalized from
//! a single demand-side flow into the full multi-bidder, multi-imp
//! auction spec.md §4.3.1 describes.

pub mod config;
pub mod context;
pub mod tasks;
pub mod transport;

pub use config::{ExchangeConfig, ExchangeConfigBuilder};
pub use context::{AuctionContext, ExchangeServices};

use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::rtb::{BidRequest, BidResponseState};
use crate::telemetry::TelemetryEvent;
use std::time::{Duration, Instant};

pub struct AuctionRequest {
    pub publisher_id: String,
    pub body: BidRequest,
    pub debug_authorized: bool,
}

/// The shared, cloneable auction entry point. One instance serves every
/// request concurrently; all mutable state lives in the per-request
/// [`AuctionContext`], never here (spec.md §5).
pub struct Exchange {
    services: ExchangeServices,
    config: std::sync::Arc<ExchangeConfig>,
    pipeline: Pipeline<AuctionContext, anyhow::Error>,
}

impl Exchange {
    pub fn new(services: ExchangeServices) -> Self {
        let config = services.config.clone();

        let pipeline = PipelineBuilder::new()
            .with_async(Box::new(tasks::MergeStoredRequestTask))
            .with_async(Box::new(tasks::ValidateRequestTask))
            .with_async(Box::new(tasks::ResolveBiddersTask))
            .with_async(Box::new(tasks::FloorResolutionTask))
            .with_async(Box::new(tasks::FanOutTask))
            .with_blocking(Box::new(tasks::NormalizeAndValidateTask))
            .with_blocking(Box::new(tasks::ResolveWinnersTask))
            .with_blocking(Box::new(tasks::MarginTask))
            .with_blocking(Box::new(tasks::AssembleResponseTask))
            .build()
            .expect("auction pipeline always has stages");

        Self { services, config, pipeline }
    }

    /// Runs one auction to completion, honoring `tmax_ms` minus the
    /// configured safety margin as the overall deadline (spec.md §4.3
    /// "the exchange must always answer inside tmax"). Never returns an
    /// `Err` for business outcomes (no bids, privacy blocks, circuit
    /// trips all surface as a [`BidResponseState::NoBidReason`]); `Err`
    /// is reserved for unrecoverable internal failures.
    #[tracing::instrument(skip_all, fields(auction_id = %request.body.id, publisher_id = %request.publisher_id))]
    pub async fn run_auction(&self, request: AuctionRequest) -> Result<BidResponseState, anyhow::Error> {
        let mut body = request.body;
        if body.tmax_ms <= 0 {
            body.tmax_ms = self.config.default_timeout_ms as i64;
        }
        let tmax_ms = body.tmax_ms;
        let dispatch_budget = self.config.dispatch_budget(tmax_ms);
        let deadline = Instant::now() + dispatch_budget;

        let ctx = AuctionContext::new(
            self.services.clone(),
            request.publisher_id,
            body,
            deadline,
            request.debug_authorized,
        );

        if let Some(sink) = &self.services.telemetry {
            sink.emit(TelemetryEvent::AuctionStart { request_id: ctx.original_auction_id.clone() });
        }

        let overall_timeout = Duration::from_millis(tmax_ms.max(0) as u64);
        let run_result = tokio::time::timeout(overall_timeout, self.pipeline.run(&ctx)).await;

        match run_result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "auction pipeline returned an error");
                ctx.set_no_bid(crate::rtb::nobidreason::TECHNICAL_ERROR, Some(err.to_string()));
            }
            Err(_elapsed) => {
                tracing::warn!("auction exceeded tmax_ms, returning partial result");
                if ctx.res.get().is_none() {
                    ctx.set_no_bid(crate::rtb::nobidreason::TECHNICAL_ERROR, Some("auction deadline exceeded".to_string()));
                }
            }
        }

        if let Some(sink) = &self.services.telemetry {
            sink.emit(TelemetryEvent::AuctionEnd { request_id: ctx.original_auction_id.clone() });
        }

        Ok(ctx
            .res
            .into_inner()
            .unwrap_or(BidResponseState::NoBidReason {
                reqid: ctx.original_auction_id.clone(),
                nbr: crate::rtb::nobidreason::TECHNICAL_ERROR,
                desc: Some("pipeline completed without a terminal state".to_string()),
            }))
    }

    pub fn circuit_breaker_stats(&self) -> std::collections::HashMap<String, crate::circuit::CircuitStats> {
        self.services.circuit_breaker.stats()
    }

    pub fn telemetry_dropped_count(&self) -> u64 {
        self.services.telemetry.as_ref().map(|t| t.dropped_count()).unwrap_or(0)
    }

    pub fn store(&self) -> Option<&std::sync::Arc<crate::store::StoreCache>> {
        self.services.store.as_ref()
    }
}
