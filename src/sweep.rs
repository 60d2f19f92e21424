use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::catalog::resolve_parameters;
use crate::config::DEFAULT_SWEEP_CONCURRENCY;
use crate::db::{table_name_for, FlowWriter, SweepLedger};
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::normalizer::{capture_timestamp, Normalizer};
use crate::state::ReadinessFlag;
use crate::types::Combination;

/// What happened to one combination in one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CombinationOutcome {
    /// Table replaced with `rows` records.
    Stored { rows: u64 },
    /// Upstream had nothing for it; the table was left as it was.
    Empty,
    /// Resolve, fetch, parse or write failed; the table was left as it was.
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinationReport {
    pub combination: Combination,
    pub outcome: CombinationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep_no: u64,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    /// In catalog order.
    pub units: Vec<CombinationReport>,
}

impl SweepReport {
    fn count(&self, pred: impl Fn(&CombinationOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.outcome)).count()
    }

    pub fn stored(&self) -> usize {
        self.count(|o| matches!(o, CombinationOutcome::Stored { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|o| matches!(o, CombinationOutcome::Empty))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CombinationOutcome::Failed { .. }))
    }

    pub fn records(&self) -> u64 {
        self.units
            .iter()
            .map(|u| match u.outcome {
                CombinationOutcome::Stored { rows } => rows,
                _ => 0,
            })
            .sum()
    }
}

/// Releases the single-flight flag when the sweep ends, however it ends.
struct SweepGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives every combination of a catalog through fetch, normalize and write.
pub struct Sweeper {
    fetcher: Fetcher,
    writer: FlowWriter,
    ledger: SweepLedger,
    readiness: ReadinessFlag,
    health: Arc<HealthState>,
    concurrency: usize,
    pages_per_combination: u32,
    sweeps_started: AtomicU64,
}

impl Sweeper {
    pub fn new(
        fetcher: Fetcher,
        writer: FlowWriter,
        ledger: SweepLedger,
        readiness: ReadinessFlag,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            fetcher,
            writer,
            ledger,
            readiness,
            health,
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
            pages_per_combination: 1,
            sweeps_started: AtomicU64::new(0),
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages_per_combination = pages.max(1);
        self
    }

    /// One full pass over `catalog`.
    ///
    /// Refuses to start while another pass is running. Per-combination failures
    /// are recorded in the report and never abort the pass; readiness is set
    /// once every combination has been attempted.
    pub async fn run_sweep(&self, catalog: &[Combination]) -> Result<SweepReport> {
        let _guard = SweepGuard::acquire(&self.health.sweep_running).ok_or(AppError::SweepOverlap)?;

        let sweep_no = self.sweeps_started.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let started_at = capture_timestamp();

        let cycle = self.readiness.begin_cycle(sweep_no).await?;
        info!(sweep_no, combinations = catalog.len(), concurrency = self.concurrency, "Sweep started");

        let mut units: Vec<(usize, CombinationReport)> = stream::iter(catalog.iter().copied().enumerate())
            .map(|(idx, c)| async move { (idx, self.run_combination(c).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        units.sort_by_key(|(idx, _)| *idx);

        // Every combination has been attempted.
        let ended = self.readiness.end_cycle(cycle).await;

        let report = SweepReport {
            sweep_no,
            started_at,
            finished_at: capture_timestamp(),
            duration_ms: started.elapsed().as_millis() as u64,
            units: units.into_iter().map(|(_, u)| u).collect(),
        };

        if let Err(e) = self.ledger.record(&report).await {
            warn!(sweep_no, "Failed to record sweep in ledger: {e}");
        }
        self.health
            .record_sweep(&report, Utc::now().timestamp_millis().max(0) as u64);

        info!(
            sweep_no,
            stored = report.stored(),
            empty = report.empty(),
            failed = report.failed(),
            records = report.records(),
            elapsed_ms = report.duration_ms,
            "Sweep finished",
        );

        ended?;
        Ok(report)
    }

    /// One unit of work. Never returns an error: failures become an outcome.
    async fn run_combination(&self, c: Combination) -> CombinationReport {
        let outcome = match self.harvest(c).await {
            Ok(Some(rows)) => CombinationOutcome::Stored { rows },
            Ok(None) => CombinationOutcome::Empty,
            Err(e) => {
                error!(combination = %c, "Combination failed: {e}");
                CombinationOutcome::Failed { error: e.to_string() }
            }
        };
        CombinationReport { combination: c, outcome }
    }

    /// `Ok(None)` when there was nothing to store.
    async fn harvest(&self, c: Combination) -> Result<Option<u64>> {
        let started = Instant::now();
        let query = resolve_parameters(&c)?;
        let table = table_name_for(&c)?;

        let page_size = self.fetcher.page_size() as usize;
        let mut raws = Vec::new();
        for page in 1..=self.pages_per_combination {
            let batch = self.fetcher.fetch_page(&query, page).await?;
            let short = batch.len() < page_size;
            raws.extend(batch);
            if short {
                break;
            }
        }

        if raws.is_empty() {
            warn!(combination = %c, table = %table, "No records upstream, keeping previous snapshot");
            return Ok(None);
        }

        let mut normalizer = Normalizer::new(c, query.dictionary, capture_timestamp());
        let records = normalizer.normalize_all(&raws);
        let stats = normalizer.stats();
        if records.is_empty() {
            warn!(
                combination = %c,
                skipped = stats.skipped,
                "Every row lacked an identity, keeping previous snapshot",
            );
            return Ok(None);
        }

        let rows = self.writer.write_combination(&table, &records).await?;
        info!(
            combination = %c,
            table = %table,
            records = rows,
            skipped = stats.skipped,
            accepted = stats.accepted,
            coerced = stats.coerced,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Combination stored",
        );
        Ok(Some(rows))
    }
}
