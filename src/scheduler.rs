use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::sweep::{SweepReport, Sweeper};
use crate::types::Combination;

/// Runs a sweep at startup and then every `period`.
pub struct Scheduler {
    sweeper: Arc<Sweeper>,
    catalog: Vec<Combination>,
    period: Duration,
}

impl Scheduler {
    pub fn new(sweeper: Arc<Sweeper>, catalog: Vec<Combination>, period: Duration) -> Self {
        Self { sweeper, catalog, period }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        // A sweep that overruns the period is followed by one sweep, not a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            period_secs = self.period.as_secs(),
            combinations = self.catalog.len(),
            "Scheduler started",
        );

        loop {
            // First tick completes immediately: the startup sweep.
            ticker.tick().await;
            if let Ok(report) = self.tick().await {
                debug!(sweep_no = report.sweep_no, next_in_secs = self.period.as_secs(), "Waiting for next sweep");
            }
        }
    }

    /// One scheduled invocation. Overlap is logged and skipped, not queued.
    pub async fn tick(&self) -> Result<SweepReport> {
        let result = self.sweeper.run_sweep(&self.catalog).await;
        match &result {
            Ok(_) => {}
            Err(AppError::SweepOverlap) => warn!("Previous sweep still running, skipping this tick"),
            Err(e) => error!("Sweep failed: {e}"),
        }
        result
    }
}
