//! Shared health state for the /health endpoint.
//! Written by the Sweeper, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

use crate::sweep::SweepReport;

/// Shared sweep metrics.
#[derive(Debug, Default)]
pub struct HealthState {
    /// True while a sweep holds the single-flight guard.
    pub sweep_running: AtomicBool,
    pub sweeps_completed: AtomicU64,
    /// Unix milliseconds of the last finished sweep (0 = none yet).
    pub last_sweep_at_ms: AtomicU64,
    pub last_duration_ms: AtomicU64,
    pub last_stored: AtomicU64,
    pub last_empty: AtomicU64,
    pub last_failed: AtomicU64,
    pub last_records: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LastSweep {
    pub finished_at_ms: u64,
    pub duration_ms: u64,
    pub stored: u64,
    pub empty: u64,
    pub failed: u64,
    pub records: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sweep_running(&self) -> bool {
        self.sweep_running.load(Ordering::Acquire)
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps_completed.load(Ordering::Relaxed)
    }

    pub fn record_sweep(&self, report: &SweepReport, finished_at_ms: u64) {
        self.last_duration_ms.store(report.duration_ms, Ordering::Relaxed);
        self.last_stored.store(report.stored() as u64, Ordering::Relaxed);
        self.last_empty.store(report.empty() as u64, Ordering::Relaxed);
        self.last_failed.store(report.failed() as u64, Ordering::Relaxed);
        self.last_records.store(report.records(), Ordering::Relaxed);
        self.last_sweep_at_ms.store(finished_at_ms, Ordering::Relaxed);
        self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_sweep(&self) -> Option<LastSweep> {
        let finished_at_ms = self.last_sweep_at_ms.load(Ordering::Relaxed);
        if finished_at_ms == 0 {
            return None;
        }
        Some(LastSweep {
            finished_at_ms,
            duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
            stored: self.last_stored.load(Ordering::Relaxed),
            empty: self.last_empty.load(Ordering::Relaxed),
            failed: self.last_failed.load(Ordering::Relaxed),
            records: self.last_records.load(Ordering::Relaxed),
        })
    }
}
