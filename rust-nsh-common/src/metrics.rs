//! Metrics collection for the NSH forwarder.
//!
//! Lock-free counters the rewrite engine bumps per packet, and gauges the
//! control plane keeps in step with table sizes.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        let c = Counter::new();
        c.value.store(self.value(), Ordering::Relaxed);
        c
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Clone for Gauge {
    fn clone(&self) -> Self {
        let g = Gauge::new();
        g.value.store(self.value(), Ordering::Relaxed);
        g
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for the forwarding node
 * ---------------------------------------------------------------- */

/// Counters matching the per-node outcome taxonomy, plus table-size gauges.
#[derive(Debug, Default, Clone)]
pub struct NshMetrics {
    // Rewrite engine outcomes
    /// NSH header found and mapped.
    pub packets_mapped: Counter,
    /// No mapping for the packet's service-path key.
    pub no_mapping: Counter,
    /// No header entry for a mapping's target key.
    pub no_entry: Counter,
    /// Proxied ingress with no proxy session for the arrival tunnel.
    pub no_proxy_session: Counter,
    /// Inline header shorter than it declares.
    pub truncated_header: Counter,

    // Table sizes
    pub header_entries: Gauge,
    pub mappings: Gauge,
    pub proxy_sessions: Gauge,
}

impl NshMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total packets that went through the rewrite engine.
    pub fn packets_processed(&self) -> u64 {
        self.packets_mapped.value()
            + self.no_mapping.value()
            + self.no_entry.value()
            + self.no_proxy_session.value()
            + self.truncated_header.value()
    }
}
