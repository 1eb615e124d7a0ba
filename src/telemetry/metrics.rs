//! In-process loop metrics
//!
//! Counts evaluation loops, submits, and rejects, and summarizes
//! decision-to-submit latency. Snapshots feed the periodic
//! `telemetry_snapshot` audit record and the reject-spike alert.

use std::sync::Mutex;

/// Latency percentiles in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileSummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Point-in-time counters
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub loops: u64,
    pub submits: u64,
    pub rejects: u64,
    pub reject_rate: f64,
    pub submit_latency_ms: Option<PercentileSummary>,
}

#[derive(Debug, Default)]
struct Inner {
    loops: u64,
    submits: u64,
    rejects: u64,
    submit_latency_ms: Vec<f64>,
}

/// Shared counter set, used behind an `Arc` by both series pipelines
#[derive(Debug, Default)]
pub struct LoopMetrics {
    inner: Mutex<Inner>,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_loop(&self) {
        self.lock().loops += 1;
    }

    pub fn record_submit(&self, latency_ms: f64) {
        let mut inner = self.lock();
        inner.submits += 1;
        inner.submit_latency_ms.push(latency_ms);
    }

    pub fn record_reject(&self) {
        self.lock().rejects += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        let denom = inner.submits + inner.rejects;
        MetricsSnapshot {
            loops: inner.loops,
            submits: inner.submits,
            rejects: inner.rejects,
            reject_rate: if denom > 0 {
                inner.rejects as f64 / denom as f64
            } else {
                0.0
            },
            submit_latency_ms: summarize(&inner.submit_latency_ms),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn summarize(values: &[f64]) -> Option<PercentileSummary> {
    if values.is_empty() {
        return None;
    }
    let mut ordered = values.to_vec();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(PercentileSummary {
        p50: percentile(&ordered, 50.0),
        p95: percentile(&ordered, 95.0),
        p99: percentile(&ordered, 99.0),
    })
}

/// Nearest-rank percentile over a sorted slice
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let index = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Alert thresholds evaluated against a metrics snapshot
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    pub max_reject_rate: f64,
    /// Decisions (submits + rejects) required before the alert is armed
    pub min_decisions: u64,
}

impl AlertThresholds {
    /// True when rejects are spiking enough to trip the kill switch
    pub fn reject_spike(&self, snapshot: &MetricsSnapshot) -> bool {
        let decisions = snapshot.submits + snapshot.rejects;
        decisions >= self.min_decisions && snapshot.reject_rate > self.max_reject_rate
    }
}
