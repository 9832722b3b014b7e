//! Non-blocking telemetry fan-out (spec.md §4, §5, §9 "Implicit
//! fire-and-forget goroutines for telemetry").
//!
//! Reified as a bounded `tokio::sync::mpsc` channel with a single
//! consumer task per sink; a full channel drops the oldest-style (newest
//! attempt, since mpsc has no drop-oldest primitive) event and counts it,
//! exposed as an `opentelemetry` gauge, matching the teacher's
//! `LazyLock<Counter<u64>>` metrics idiom seen in
//! `app/pipeline/ortb/tasks/identity_demand.rs` and
//! `auction/traffic_shaping.rs`.

use opentelemetry::metrics::Counter;
use opentelemetry::global;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;
use tokio::sync::mpsc;

static COUNTER_TELEMETRY_DROPPED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    global::meter("exchange:telemetry")
        .u64_counter("telemetry.events_dropped")
        .with_description("Count of telemetry events dropped because the sink queue was full")
        .with_unit("1")
        .build()
});

/// Ordered per-auction stage events (spec.md §5 ordering guarantees):
/// `AuctionStart` -> per-bidder (`BidRequestSent` before
/// `BidReceived`/`NoBid`/`BidError`) -> `BidWon`* -> `AuctionEnd`.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    AuctionStart { request_id: String },
    BidRequestSent { request_id: String, bidder: String },
    BidReceived { request_id: String, bidder: String, imp_id: String, price: f64 },
    NoBid { request_id: String, bidder: String, reason: String },
    BidError { request_id: String, bidder: String, reason: String },
    BidWon { request_id: String, imp_id: String, bidder: String, clearing_price: f64 },
    AuctionEnd { request_id: String },
}

pub struct TelemetrySink {
    sender: mpsc::Sender<TelemetryEvent>,
    dropped: AtomicU64,
}

impl TelemetrySink {
    /// Spawns the single consumer task draining `buffer_size`-bounded
    /// events into `consume`. The hot path never awaits on this: `emit`
    /// uses `try_send` and silently downgrades to a drop-counter
    /// increment on `Full` (spec.md §5 "never blocks on telemetry").
    pub fn spawn<F>(buffer_size: usize, mut consume: F) -> std::sync::Arc<Self>
    where
        F: FnMut(TelemetryEvent) + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                consume(event);
            }
        });

        std::sync::Arc::new(Self { sender, dropped: AtomicU64::new(0) })
    }

    pub fn emit(&self, event: TelemetryEvent) {
        if self.sender.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            COUNTER_TELEMETRY_DROPPED.add(1, &[]);
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn events_reach_the_consumer_in_order() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();

        let sink = TelemetrySink::spawn(16, move |event| {
            received_clone.lock().unwrap().push(format!("{:?}", event));
        });

        sink.emit(TelemetryEvent::AuctionStart { request_id: "r1".into() });
        sink.emit(TelemetryEvent::BidRequestSent { request_id: "r1".into(), bidder: "a".into() });
        sink.emit(TelemetryEvent::AuctionEnd { request_id: "r1".into() });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let events = received.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].starts_with("AuctionStart"));
        assert!(events[2].starts_with("AuctionEnd"));
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts_without_blocking() {
        let sink = TelemetrySink::spawn(1, move |_event| {
            // never drains, simulating a stalled consumer task momentarily
            std::thread::sleep(std::time::Duration::from_millis(50));
        });

        for _ in 0..10 {
            sink.emit(TelemetryEvent::AuctionEnd { request_id: "r".into() });
        }

        // emit() must not block regardless of drops
        assert!(sink.dropped_count() <= 10);
    }
}
