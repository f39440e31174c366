// SPEC_FULL.md §10.3: a minimal in-process metrics surface. No external
// metrics crate: the distilled spec's "CLI/admin dumps" non-goal excludes
// an exposed dump format, not the counters themselves.
//
// Implements `rtc_core::MetricsSink` so a live `Rtc` can record against it
// through `RtcContext` the same way it reads time through `Clock`, rather
// than holding counters that only this module's own tests ever touch.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct RtcMetrics {
    sessions_created: AtomicU64,
    sessions_reaped: AtomicU64,
    commits_applied: AtomicU64,
    deadlocks_returned: AtomicU64,
}

/// Plain copy of the counters at one instant, for tests and for whatever
/// admin surface wires this up later.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MetricsSnapshot {
    pub sessions_created: u64,
    pub sessions_reaped: u64,
    pub commits_applied: u64,
    pub deadlocks_returned: u64,
}

impl RtcMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_reaped(&self) {
        self.sessions_reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit_applied(&self) {
        self.commits_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deadlock_returned(&self) {
        self.deadlocks_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_reaped: self.sessions_reaped.load(Ordering::Relaxed),
            commits_applied: self.commits_applied.load(Ordering::Relaxed),
            deadlocks_returned: self.deadlocks_returned.load(Ordering::Relaxed),
        }
    }
}

impl rtc_core::MetricsSink for RtcMetrics {
    fn record_session_created(&self) {
        RtcMetrics::record_session_created(self)
    }

    fn record_session_reaped(&self) {
        RtcMetrics::record_session_reaped(self)
    }

    fn record_commit_applied(&self) {
        RtcMetrics::record_commit_applied(self)
    }

    fn record_deadlock_returned(&self) {
        RtcMetrics::record_deadlock_returned(self)
    }
}
