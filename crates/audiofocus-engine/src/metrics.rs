//! Arbitration and delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

use audiofocus_ipc::FocusMetrics;

/// Collects focus metrics.
#[derive(Default)]
pub struct MetricsCollector {
    activations_granted: AtomicU64,
    activations_denied: AtomicU64,
    deactivations: AtomicU64,
    events_published: AtomicU64,
    events_delivered: AtomicU64,
    events_dropped: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a granted activation.
    pub fn record_granted(&self) {
        self.activations_granted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a denied activation.
    pub fn record_denied(&self) {
        self.activations_denied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deactivation that released an interrupt.
    pub fn record_deactivation(&self) {
        self.deactivations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event handed to a subscriber queue.
    pub fn record_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event handed to a handler or receiver.
    pub fn record_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event discarded after its subscription ended.
    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self, active_streams: usize) -> FocusMetrics {
        FocusMetrics {
            activations_granted: self.activations_granted.load(Ordering::Relaxed),
            activations_denied: self.activations_denied.load(Ordering::Relaxed),
            deactivations: self.deactivations.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            active_streams,
        }
    }
}
