pub mod models;
pub mod sweep_runs;
pub mod table_router;
pub mod writer;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::DB_BUSY_TIMEOUT_SECS;
use crate::error::Result;

pub use sweep_runs::SweepLedger;
pub use table_router::{table_name_for, TableName};
pub use writer::FlowWriter;

/// Open (creating if needed) the harvester database and apply migrations.
///
/// WAL lets readers keep serving the previous snapshot while a replace is in flight.
pub async fn open(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(DB_BUSY_TIMEOUT_SECS));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!(path, "Database ready");
    Ok(pool)
}
