use std::sync::atomic::{AtomicU64, Ordering};

use crate::controller::CycleReport;

/// Process-wide counters, accumulated over every drain cycle since startup.
///
/// All counters use `Relaxed` ordering; they are independent observations.
/// Share via `Arc<Metrics>`.
#[derive(Default)]
pub struct Metrics {
    pub cycles_run: AtomicU64,
    /// Cycles that ended early because the input queue could not be read.
    pub cycles_failed: AtomicU64,
    pub messages_received: AtomicU64,
    /// Malformed or foreign notifications acknowledged without processing.
    pub messages_dropped: AtomicU64,
    pub jobs_submitted: AtomicU64,
    pub messages_retried: AtomicU64,
    pub messages_dead_lettered: AtomicU64,
    /// Skipped for a short lease or a failed renewal.
    pub leases_lost: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the outcome of one completed cycle into the totals.
    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
        add(&self.messages_received, report.received);
        add(&self.messages_dropped, report.dropped);
        add(&self.jobs_submitted, report.jobs_submitted);
        add(&self.messages_retried, report.retried);
        add(&self.messages_dead_lettered, report.dead_lettered);
        add(&self.leases_lost, report.lease_lost + report.skipped);
    }

    pub fn inc_cycle_failed(&self) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    // ── Snapshot ──────────────────────────────────────────────────────────────

    /// Approximate point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles:        self.cycles_run.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            received:      self.messages_received.load(Ordering::Relaxed),
            dropped:       self.messages_dropped.load(Ordering::Relaxed),
            jobs:          self.jobs_submitted.load(Ordering::Relaxed),
            retried:       self.messages_retried.load(Ordering::Relaxed),
            dead_lettered: self.messages_dead_lettered.load(Ordering::Relaxed),
            leases_lost:   self.leases_lost.load(Ordering::Relaxed),
        }
    }

    /// Log a summary of all metrics via `tracing`.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            cycles        = s.cycles,
            cycles_failed = s.cycles_failed,
            received      = s.received,
            dropped       = s.dropped,
            jobs          = s.jobs,
            retried       = s.retried,
            dead_lettered = s.dead_lettered,
            leases_lost   = s.leases_lost,
            "📊 metrics summary"
        );
    }
}

fn add(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

/// A point-in-time snapshot of [`Metrics`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles:        u64,
    pub cycles_failed: u64,
    pub received:      u64,
    pub dropped:       u64,
    pub jobs:          u64,
    pub retried:       u64,
    pub dead_lettered: u64,
    pub leases_lost:   u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_cycle_reports() {
        let metrics = Metrics::new();
        let report = CycleReport {
            received: 25,
            dropped: 2,
            skipped: 1,
            lease_lost: 1,
            duplicates: 0,
            jobs_submitted: 2,
            acknowledged: 20,
            retried: 1,
            dead_lettered: 0,
            deferred: 0,
        };

        metrics.record_cycle(&report);
        metrics.record_cycle(&report);
        metrics.inc_cycle_failed();

        let s = metrics.snapshot();
        assert_eq!(s.cycles, 3);
        assert_eq!(s.cycles_failed, 1);
        assert_eq!(s.received, 50);
        assert_eq!(s.jobs, 4);
        assert_eq!(s.leases_lost, 4);
    }
}
