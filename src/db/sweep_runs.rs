use sqlx::SqlitePool;

use crate::db::models::SweepRunRow;
use crate::error::Result;
use crate::sweep::SweepReport;

/// Append-only log of finished sweeps, read by the `/sweeps/recent` endpoint.
#[derive(Debug, Clone)]
pub struct SweepLedger {
    pool: SqlitePool,
}

impl SweepLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, report: &SweepReport) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sweep_runs (
                sweep_no, started_at, finished_at, duration_ms,
                combinations, stored, empty, failed, records
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.sweep_no as i64)
        .bind(&report.started_at)
        .bind(&report.finished_at)
        .bind(report.duration_ms as i64)
        .bind(report.units.len() as i64)
        .bind(report.stored() as i64)
        .bind(report.empty() as i64)
        .bind(report.failed() as i64)
        .bind(report.records() as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<SweepRunRow>> {
        let rows = sqlx::query_as::<_, SweepRunRow>(
            r#"
            SELECT id, sweep_no, started_at, finished_at, duration_ms,
                   combinations, stored, empty, failed, records
            FROM sweep_runs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open;
    use crate::sweep::{CombinationOutcome, CombinationReport};
    use crate::types::{Combination, MarketSegment, Period, SectorCategory};

    fn report(sweep_no: u64) -> SweepReport {
        SweepReport {
            sweep_no,
            started_at: "2024-01-02 09:30:00".to_string(),
            finished_at: "2024-01-02 09:30:04".to_string(),
            duration_ms: 4000,
            units: vec![
                CombinationReport {
                    combination: Combination::instrument(MarketSegment::AllStocks, Period::Today),
                    outcome: CombinationOutcome::Stored { rows: 50 },
                },
                CombinationReport {
                    combination: Combination::sector(SectorCategory::Concept, Period::Today),
                    outcome: CombinationOutcome::Empty,
                },
                CombinationReport {
                    combination: Combination::sector(SectorCategory::Regional, Period::TenDay),
                    outcome: CombinationOutcome::Failed { error: "timeout".to_string() },
                },
            ],
        }
    }

    #[tokio::test]
    async fn recorded_runs_come_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("ledger.db").to_string_lossy()).await.unwrap();
        let ledger = SweepLedger::new(pool);

        ledger.record(&report(1)).await.unwrap();
        ledger.record(&report(2)).await.unwrap();

        let rows = ledger.recent(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sweep_no, 2);
        assert_eq!(rows[0].combinations, 3);
        assert_eq!((rows[0].stored, rows[0].empty, rows[0].failed), (1, 1, 1));
        assert_eq!(rows[0].records, 50);

        assert_eq!(ledger.recent(1).await.unwrap().len(), 1);
    }
}
