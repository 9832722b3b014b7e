//! HTTP transport boundary for bidder dispatch.
//!
//! Grounded on the teacher's `core::demand::client` reqwest-backed demand
//! client: a single shared `reqwest::Client` (connection pooling,
//! rustls) behind a small trait so tests can substitute a fake transport
//! without touching the network.

use crate::adapter::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait BidderTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, anyhow::Error>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BidderTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, anyhow::Error> {
        let mut builder = self.client.post(&request.url).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub struct StubTransport {
    pub responder: Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, anyhow::Error> + Send + Sync>,
    /// Simulated latency before `responder` runs, keyed off the request
    /// (e.g. the bidder-specific URL a `BidderAdapter` built). Used to
    /// exercise deadline/cancellation behavior (spec.md §4.3.1, §8
    /// Scenario D) without a real network call.
    pub delay: Box<dyn Fn(&HttpRequest) -> Duration + Send + Sync>,
}

#[cfg(test)]
impl StubTransport {
    pub fn new(responder: Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, anyhow::Error> + Send + Sync>) -> Self {
        Self { responder, delay: Box::new(|_| Duration::ZERO) }
    }

    pub fn with_delay(
        responder: Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, anyhow::Error> + Send + Sync>,
        delay: Box<dyn Fn(&HttpRequest) -> Duration + Send + Sync>,
    ) -> Self {
        Self { responder, delay }
    }
}

#[cfg(test)]
#[async_trait]
impl BidderTransport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, anyhow::Error> {
        let wait = (self.delay)(&request);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        (self.responder)(&request)
    }
}
