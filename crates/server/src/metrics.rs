//! Per-request metric counters.
//!
//! The sink is an interface; the bundled implementation is a set of atomics
//! surfaced through the `/status` document. Deployments that ship metrics
//! elsewhere implement [`MetricsSink`] against their collector.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait MetricsSink: Send + Sync {
    fn record_request(&self);
    fn record_error(&self, status: u16);
    fn record_rate_limited(&self);
    fn snapshot(&self) -> MetricsSnapshot;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub rate_limited: u64,
}

/// Process-local counters.
#[derive(Default)]
pub struct AtomicMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    rate_limited: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for AtomicMetrics {
    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, _status: u16) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}
