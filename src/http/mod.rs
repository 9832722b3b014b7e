//! HTTP front door (spec.md §6), grounded on the teacher's actix-web
//! handler layout (`app/http` route modules returning `impl Responder`,
//! JSON extraction, `web::Data<T>` for shared state).

use crate::app::App;
use crate::exchange::AuctionRequest;
use crate::rtb::BidRequest;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;

const REQUEST_ID_HEADER: &str = "X-Request-ID";
const PUBLISHER_ID_HEADER: &str = "X-Publisher-ID";

/// `POST /openrtb2/auction` — the single hot-path entry point. Per
/// spec.md §6, this always answers with an OpenRTB `BidResponse` JSON
/// body and HTTP 200, even on no-bid (empty `seatbid`, `nbr` set);
/// `X-Request-ID` is echoed back when the caller supplied one.
pub async fn auction(app: web::Data<App>, http_req: HttpRequest, body: web::Json<BidRequest>) -> impl Responder {
    let bid_request = body.into_inner();
    let auction_cur = bid_request.auction_currency().to_string();

    let header_publisher_id = http_req
        .headers()
        .get(PUBLISHER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let publisher_id = bid_request
        .distribution_channel()
        .and_then(|c| match c {
            crate::rtb::DistributionChannel::Site(s) => s.publisher_id,
            crate::rtb::DistributionChannel::App(a) => a.publisher_id,
        })
        .or(header_publisher_id)
        .unwrap_or_default();

    let debug_authorized = app.config.exchange.debug_authorized;
    let request = AuctionRequest { publisher_id, body: bid_request, debug_authorized };

    let mut http_response = match app.exchange.run_auction(request).await {
        Ok(state) => HttpResponse::Ok().json(state.into_response(&auction_cur)),
        Err(err) => {
            tracing::error!(error = %err, "auction failed");
            HttpResponse::InternalServerError().finish()
        }
    };

    if let Some(request_id) = http_req.headers().get(REQUEST_ID_HEADER) {
        if let Ok(name) = HeaderName::try_from(REQUEST_ID_HEADER) {
            if let Ok(value) = HeaderValue::from_bytes(request_id.as_bytes()) {
                http_response.headers_mut().insert(name, value);
            }
        }
    }

    http_response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct DependencyStatus {
    name: &'static str,
    healthy: bool,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    dependencies: Vec<DependencyStatus>,
}

/// `GET /health/ready` (spec.md §6): 200 when every mandatory
/// dependency responds, 503 otherwise, enumerating per-dependency
/// status. The store is the only mandatory dependency the core wires
/// directly; when none is configured there is nothing to check and the
/// process is trivially ready.
pub async fn health_ready(app: web::Data<App>) -> impl Responder {
    let dependencies = match app.exchange.store() {
        Some(store) => vec![DependencyStatus { name: "store", healthy: store.is_healthy().await }],
        None => Vec::new(),
    };

    let ready = dependencies.iter().all(|d| d.healthy);
    let body = ReadyResponse { ready, dependencies };

    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

#[derive(Serialize)]
struct CircuitBreakerView {
    bidder: String,
    state: String,
    failure_count: u32,
    rejects: u64,
    successes: u64,
}

pub async fn circuit_breaker_status(app: web::Data<App>) -> impl Responder {
    let stats = app.exchange.circuit_breaker_stats();
    let view: Vec<CircuitBreakerView> = stats
        .into_iter()
        .map(|(bidder, s)| CircuitBreakerView {
            bidder,
            state: format!("{:?}", s.state),
            failure_count: s.failure_count,
            rejects: s.rejects,
            successes: s.successes,
        })
        .collect();

    HttpResponse::Ok().json(view)
}

/// Process metrics are pushed via OTLP (spec.md §10.1); this endpoint is
/// a lightweight pull-based snapshot of the counters an operator most
/// often needs without a collector in front of them.
pub async fn metrics(app: web::Data<App>) -> impl Responder {
    let dropped = app.exchange.telemetry_dropped_count();
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(format!("telemetry_events_dropped_total {}\n", dropped))
}

pub fn configure(cfg: &mut web::ServiceConfig, app: Arc<App>) {
    cfg.app_data(web::Data::from(app))
        .route("/openrtb2/auction", web::post().to(auction))
        .route("/health", web::get().to(health))
        .route("/health/ready", web::get().to(health_ready))
        .route("/metrics", web::get().to(metrics))
        .route("/admin/circuit-breaker", web::get().to(circuit_breaker_status));
}
