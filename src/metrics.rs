//! Wrapper metrics
//!
//! Lock-free counters updated on every wrapped request. Counters only
//! ever grow; [`Metrics::snapshot`] reads each one independently, so a
//! snapshot taken mid-request may be off by that request.

use crate::outcome::OutcomeStatus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one wrapper instance
#[derive(Debug, Default)]
pub struct Metrics {
    success: AtomicU64,
    error: AtomicU64,
    timeout: AtomicU64,
    policy_rejections: AtomicU64,
    duplicate_rejections: AtomicU64,
    traces_stripped: AtomicU64,
    break_glass: AtomicU64,
    latency_ms_total: AtomicU64,
    /// f64 bit pattern
    cost_cents_total: AtomicU64,
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub success: u64,
    pub error: u64,
    pub timeout: u64,
    pub policy_rejections: u64,
    pub duplicate_rejections: u64,
    pub traces_stripped: u64,
    pub break_glass: u64,
    pub latency_ms_total: u64,
    pub cost_cents_total: f64,
}

impl MetricsSnapshot {
    /// Mean latency over completed requests
    pub fn mean_latency_ms(&self) -> Option<f64> {
        (self.requests_total > 0)
            .then(|| self.latency_ms_total as f64 / self.requests_total as f64)
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a completed (attested) request
    pub fn record_outcome(&self, status: OutcomeStatus, latency_ms: u64, cost_cents: f64) {
        let counter = match status {
            OutcomeStatus::Success => &self.success,
            OutcomeStatus::Error => &self.error,
            OutcomeStatus::Timeout => &self.timeout,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.latency_ms_total
            .fetch_add(latency_ms, Ordering::Relaxed);
        if cost_cents.is_finite() && cost_cents > 0.0 {
            // fetch_update only fails when the closure returns None
            let _ = self
                .cost_cents_total
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    Some((f64::from_bits(bits) + cost_cents).to_bits())
                });
        }
    }

    pub fn record_policy_rejection(&self) {
        self.policy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_rejection(&self) {
        self.duplicate_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_traces_stripped(&self) {
        self.traces_stripped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_break_glass(&self) {
        self.break_glass.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let success = self.success.load(Ordering::Relaxed);
        let error = self.error.load(Ordering::Relaxed);
        let timeout = self.timeout.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests_total: success + error + timeout,
            success,
            error,
            timeout,
            policy_rejections: self.policy_rejections.load(Ordering::Relaxed),
            duplicate_rejections: self.duplicate_rejections.load(Ordering::Relaxed),
            traces_stripped: self.traces_stripped.load(Ordering::Relaxed),
            break_glass: self.break_glass.load(Ordering::Relaxed),
            latency_ms_total: self.latency_ms_total.load(Ordering::Relaxed),
            cost_cents_total: f64::from_bits(self.cost_cents_total.load(Ordering::Relaxed)),
        }
    }
}
