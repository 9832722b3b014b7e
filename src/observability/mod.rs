//! Observability bootstrap (spec.md §10.1 of SPEC_FULL.md).
//!
//! Grounded on the teacher's `core/observability/provider.rs`: a
//! `tracing-subscriber` registry layered with an env-filter, a JSON
//! stdout layer, and an optional OTLP exporter wired through
//! `tracing-opentelemetry`, torn down via a guard dropped at shutdown.

pub mod macros;

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

pub struct ObservabilityGuard {
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
    meter_provider: Option<opentelemetry_sdk::metrics::SdkMeterProvider>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            let _ = provider.shutdown();
        }
        if let Some(provider) = self.meter_provider.take() {
            let _ = provider.shutdown();
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub env_filter: String,
    pub json_logs: bool,
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "hb-exchange".to_string(),
            env_filter: "info".to_string(),
            json_logs: true,
            otlp_endpoint: None,
        }
    }
}

/// Deterministic per-request sampling decision (SPEC_FULL.md §10.5):
/// hashes `request_id` with a fixed-seed `ahash` into `[0,1)` and compares
/// against `rate`. Unlike [`macros::sample_or_attach_root_span`], which
/// samples the *current* span on every call, this is stable across
/// repeated calls for the same request id — used to decide once, up
/// front, whether an auction gets verbose per-stage tracing.
pub fn should_sample(request_id: &str, rate: f32) -> bool {
    use std::hash::{Hash, Hasher};
    let mut hasher = ahash::AHasher::default();
    request_id.hash(&mut hasher);
    let bucket = (hasher.finish() % 1_000_000) as f32 / 1_000_000.0;
    bucket < rate
}

/// Installs the global `tracing` subscriber and, when an OTLP endpoint
/// is configured, a span/metric exporter pipeline. Returns a guard that
/// must be kept alive for the process lifetime and dropped (flushing
/// exporters) on shutdown, mirroring the teacher's
/// `startup::init_observability` return value.
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard, anyhow::Error> {
    let env_filter = EnvFilter::try_new(&config.env_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let resource = Resource::builder().with_service_name(config.service_name.clone()).build();

    let (tracer_provider, otel_layer) = if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()?;

        let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource.clone())
            .build();

        global::set_tracer_provider(provider.clone());
        let tracer = provider.tracer(config.service_name.clone());
        (Some(provider), Some(tracing_opentelemetry::layer().with_tracer(tracer)))
    } else {
        (None, None)
    };

    let meter_provider = if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_periodic_exporter(exporter)
            .with_resource(resource)
            .build();

        global::set_meter_provider(provider.clone());
        Some(provider)
    } else {
        None
    };

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(ObservabilityGuard { tracer_provider, meter_provider })
}

#[cfg(test)]
mod tests {
    use super::should_sample;

    #[test]
    fn rate_zero_never_samples() {
        for id in ["a", "req-1", "some-long-request-id-1234"] {
            assert!(!should_sample(id, 0.0));
        }
    }

    #[test]
    fn rate_one_always_samples() {
        for id in ["a", "req-1", "some-long-request-id-1234"] {
            assert!(should_sample(id, 1.0));
        }
    }

    #[test]
    fn same_id_is_deterministic() {
        let a = should_sample("req-42", 0.5);
        let b = should_sample("req-42", 0.5);
        assert_eq!(a, b);
    }
}
