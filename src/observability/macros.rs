//! Span-sampling macros (SPEC_FULL.md §10.1), grounded on the teacher's
//! `core/observability/macros.rs` head-based sampler: a span is promoted
//! to a recorded root span for a deterministic fraction of request ids
//! (hashed with `ahash`), everything else attaches as a child of the
//! current span at whatever level it's logged.

/// Hashes `key` with a fixed-seed `ahash` and compares against
/// `sample_rate` (0.0..=1.0) to decide whether this auction's root span
/// should be sampled and recorded.
#[macro_export]
macro_rules! sample_or_attach_root_span {
    ($name:expr, $key:expr, $sample_rate:expr) => {{
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        $key.hash(&mut hasher);
        let bucket = (hasher.finish() % 1_000_000) as f64 / 1_000_000.0;
        if bucket < $sample_rate {
            tracing::info_span!($name, sampled = true)
        } else {
            tracing::Span::current()
        }
    }};
}

#[macro_export]
macro_rules! child_span_info {
    ($($arg:tt)*) => {
        tracing::info!(parent: &tracing::Span::current(), $($arg)*)
    };
}

#[macro_export]
macro_rules! child_span_debug {
    ($($arg:tt)*) => {
        tracing::debug!(parent: &tracing::Span::current(), $($arg)*)
    };
}

#[macro_export]
macro_rules! child_span_trace {
    ($($arg:tt)*) => {
        tracing::trace!(parent: &tracing::Span::current(), $($arg)*)
    };
}
