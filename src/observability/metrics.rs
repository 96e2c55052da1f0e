//! Process-wide pipeline counters
//!
//! Atomic counters for runs and searches plus run durations, collected into a
//! serializable snapshot at the end of a run. Managers report into the
//! process-wide collector unless handed their own.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MAX_DURATION_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<Arc<PipelineMetrics>> = Lazy::new(|| Arc::new(PipelineMetrics::new()));

/// Handle to the global metrics collector
pub fn metrics() -> Arc<PipelineMetrics> {
    Arc::clone(&METRICS)
}

#[derive(Default)]
pub struct PipelineMetrics {
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    searches_attempted: AtomicU64,
    searches_succeeded: AtomicU64,
    searches_failed: AtomicU64,
    reports_verified: AtomicU64,
    reports_unverified: AtomicU64,
    run_durations: Mutex<Vec<u64>>, // in milliseconds
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_completed(&self, duration: Duration, verified: bool) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        if verified {
            self.reports_verified.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reports_unverified.fetch_add(1, Ordering::Relaxed);
        }
        self.record_duration(duration);
    }

    pub fn run_failed(&self, duration: Duration) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
    }

    /// Record the outcome counts of one search fan-out
    pub fn searches_finished(&self, attempted: usize, succeeded: usize, failed: usize) {
        self.searches_attempted
            .fetch_add(attempted as u64, Ordering::Relaxed);
        self.searches_succeeded
            .fetch_add(succeeded as u64, Ordering::Relaxed);
        self.searches_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    fn record_duration(&self, duration: Duration) {
        let mut durations = self.run_durations.lock().unwrap_or_else(|e| e.into_inner());
        durations.push(duration.as_millis() as u64);
        if durations.len() > MAX_DURATION_SAMPLES {
            durations.remove(0);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self
            .run_durations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let avg_run_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            searches_attempted: self.searches_attempted.load(Ordering::Relaxed),
            searches_succeeded: self.searches_succeeded.load(Ordering::Relaxed),
            searches_failed: self.searches_failed.load(Ordering::Relaxed),
            reports_verified: self.reports_verified.load(Ordering::Relaxed),
            reports_unverified: self.reports_unverified.load(Ordering::Relaxed),
            avg_run_duration_ms,
        }
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.runs_completed,
            &self.runs_failed,
            &self.searches_attempted,
            &self.searches_succeeded,
            &self.searches_failed,
            &self.reports_verified,
            &self.reports_unverified,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.run_durations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub searches_attempted: u64,
    pub searches_succeeded: u64,
    pub searches_failed: u64,
    pub reports_verified: u64,
    pub reports_unverified: u64,
    pub avg_run_duration_ms: f64,
}
