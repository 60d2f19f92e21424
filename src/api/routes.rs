use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthState, LastSweep};
use crate::catalog::{enumerate, resolve_parameters, FieldDictionary};
use crate::db::models::SweepRunRow;
use crate::db::{table_name_for, SweepLedger, TableName};
use crate::error::AppError;
use crate::state::ReadinessFlag;
use crate::types::Combination;

const DEFAULT_RECENT_LIMIT: i64 = 20;
const MAX_RECENT_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct ApiState {
    pub health: Arc<HealthState>,
    pub readiness: ReadinessFlag,
    pub ledger: SweepLedger,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/ready", get(get_ready))
        .route("/sweeps/recent", get(get_recent_sweeps))
        .route("/catalog", get(get_catalog))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RecentSweepsQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct CatalogQuery {
    /// `today`, `3d`, `5d` or `10d`.
    pub period: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub sweep_in_progress: bool,
    pub sweeps_completed: u64,
    pub last_sweep: Option<LastSweep>,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub key: String,
    pub ready: bool,
}

#[derive(Serialize)]
pub struct CatalogEntry {
    pub combination: Combination,
    pub table: TableName,
    pub ranking_field: &'static str,
    pub filter: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    let ready = state.readiness.is_ready().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        ready,
        sweep_in_progress: state.health.sweep_running(),
        sweeps_completed: state.health.sweeps_completed(),
        last_sweep: state.health.last_sweep(),
    }))
}

async fn get_ready(State(state): State<ApiState>) -> Result<impl IntoResponse, AppError> {
    let ready = state.readiness.is_ready().await?;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((
        status,
        Json(ReadyResponse {
            key: state.readiness.key().to_string(),
            ready,
        }),
    ))
}

async fn get_recent_sweeps(
    State(state): State<ApiState>,
    Query(params): Query<RecentSweepsQuery>,
) -> Result<Json<Vec<SweepRunRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    Ok(Json(state.ledger.recent(limit).await?))
}

async fn get_catalog(Query(params): Query<CatalogQuery>) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    let period = params
        .period
        .as_deref()
        .map(FieldDictionary::lookup)
        .transpose()?
        .map(|dict| dict.period);

    let mut entries = Vec::new();
    for c in enumerate() {
        if period.is_some_and(|p| p != c.period) {
            continue;
        }
        let query = resolve_parameters(&c)?;
        entries.push(CatalogEntry {
            combination: c,
            table: table_name_for(&c)?,
            ranking_field: query.ranking_field,
            filter: query.filter,
        });
    }
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::db::open;
    use crate::state::KvStore;

    async fn serve() -> (tempfile::TempDir, String, ApiState) {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("api.db").to_string_lossy()).await.unwrap();
        let state = ApiState {
            health: Arc::new(HealthState::new()),
            readiness: ReadinessFlag::new(KvStore::sqlite(pool.clone()), "DATA_READY", Duration::from_secs(60)),
            ledger: SweepLedger::new(pool),
        };
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (dir, format!("http://{addr}"), state)
    }

    #[tokio::test]
    async fn ready_follows_the_cycle() {
        let (_dir, base, state) = serve().await;

        let resp = reqwest::get(format!("{base}/ready")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        let cycle = state.readiness.begin_cycle(1).await.unwrap();
        state.readiness.end_cycle(cycle).await.unwrap();

        let resp = reqwest::get(format!("{base}/ready")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ready"], true);
        assert_eq!(body["key"], "DATA_READY");
    }

    #[tokio::test]
    async fn health_reports_no_sweep_yet() {
        let (_dir, base, _state) = serve().await;
        let body: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ready"], false);
        assert_eq!(body["sweeps_completed"], 0);
        assert!(body["last_sweep"].is_null());
    }

    #[tokio::test]
    async fn catalog_lists_tables_and_filters_by_period() {
        let (_dir, base, _state) = serve().await;

        let all: Vec<Value> = reqwest::get(format!("{base}/catalog")).await.unwrap().json().await.unwrap();
        assert_eq!(all.len(), enumerate().len());
        assert_eq!(all[0]["table"], "Stock_Flow_All_Stocks_Today");

        // Sectors have no 3-day window.
        let three_day: Vec<Value> = reqwest::get(format!("{base}/catalog?period=3d"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(three_day.len(), 8);

        let resp = reqwest::get(format!("{base}/catalog?period=7d")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn recent_sweeps_is_empty_before_the_first_sweep() {
        let (_dir, base, _state) = serve().await;
        let rows: Vec<Value> = reqwest::get(format!("{base}/sweeps/recent?limit=5"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
