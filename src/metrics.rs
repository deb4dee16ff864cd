//! Flow counters recorded by the orchestrator

use metrics::{Counter, Gauge, Histogram};
use std::time::Duration;

pub struct Metrics {
    pub logins_performed: Counter,
    pub sessions_reused: Counter,
    pub artifacts_downloaded: Counter,
    pub artifacts_dispatched: Counter,
    pub dispatch_failures: Counter,
    pub flows_failed: Counter,
    pub flow_duration: Histogram,
    pub active_sessions: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            logins_performed: Counter::noop(),
            sessions_reused: Counter::noop(),
            artifacts_downloaded: Counter::noop(),
            artifacts_dispatched: Counter::noop(),
            dispatch_failures: Counter::noop(),
            flows_failed: Counter::noop(),
            flow_duration: Histogram::noop(),
            active_sessions: Gauge::noop(),
        }
    }

    pub fn record_checkout(&self, reused: bool) {
        if reused {
            self.sessions_reused.increment(1);
        } else {
            self.logins_performed.increment(1);
        }
    }

    pub fn record_download(&self) {
        self.artifacts_downloaded.increment(1);
    }

    pub fn record_dispatch(&self, success: bool) {
        if success {
            self.artifacts_dispatched.increment(1);
        } else {
            self.dispatch_failures.increment(1);
        }
    }

    pub fn record_flow(&self, duration: Duration) {
        self.flow_duration.record(duration.as_secs_f64());
    }

    pub fn record_failure(&self, kind: &str) {
        self.flows_failed.increment(1);

        if kind == "upload" {
            self.dispatch_failures.increment(1);
        }
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions.set(count as f64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
