use std::time::Duration;

use crate::error::{AppError, Result};

pub const UPSTREAM_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

/// Static client token the upstream expects on every list query.
pub const UPSTREAM_UT: &str = "b2884a393a59ad64002292a3e90d46a5";

/// Fixed protocol flags sent with every request: descending order, single
/// page window, two-decimal floats, inverted sort sense.
pub const UPSTREAM_FLAGS: &[(&str, &str)] = &[("po", "1"), ("np", "1"), ("fltt", "2"), ("invt", "2")];

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Upstream page size (`pz`).
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Per-request timeout (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Seconds between scheduled sweeps of the full catalog.
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Default size of the per-sweep worker pool.
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;

/// Well-known key consumers poll for the readiness signal.
pub const READINESS_KEY: &str = "DATA_READY";

/// Expiry on the readiness key so a crashed process cannot leave "ready" behind.
pub const READINESS_TTL_SECS: u64 = 24 * 3600;

/// Upper bound on any key expiry. Keeps deadline arithmetic far from overflow.
pub const MAX_READINESS_TTL_SECS: u64 = 30 * 24 * 3600;

/// SQLite busy timeout; concurrent unit writers queue on the database lock.
pub const DB_BUSY_TIMEOUT_SECS: u64 = 5;

/// Where the readiness flag is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessBackend {
    /// `kv_store` table in the harvester database, visible to other processes.
    Sqlite,
    /// Process-local map. Only useful when the health surface is the sole reader.
    Memory,
}

impl ReadinessBackend {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(ReadinessBackend::Sqlite),
            "memory" => Ok(ReadinessBackend::Memory),
            other => Err(AppError::Config(format!(
                "READINESS_BACKEND must be 'sqlite' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seconds between sweeps (SWEEP_INTERVAL_SECS)
    pub sweep_interval_secs: u64,
    /// Max combinations in flight at once (SWEEP_CONCURRENCY)
    pub sweep_concurrency: usize,
    /// Pages requested per combination, starting at 1 (PAGES_PER_COMBINATION)
    pub pages_per_combination: u32,
    /// Rows per upstream page (PAGE_SIZE)
    pub page_size: u32,
    /// Per-request HTTP timeout in seconds (HTTP_TIMEOUT_SECS)
    pub http_timeout_secs: u64,
    pub readiness_backend: ReadinessBackend,
    pub readiness_key: String,
    pub readiness_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            upstream_url: std::env::var("UPSTREAM_URL").unwrap_or_else(|_| UPSTREAM_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "fundflow.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| SWEEP_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("SWEEP_INTERVAL_SECS must be a whole number of seconds".to_string()))?
                .max(1),
            sweep_concurrency: std::env::var("SWEEP_CONCURRENCY")
                .unwrap_or_else(|_| DEFAULT_SWEEP_CONCURRENCY.to_string())
                .parse::<usize>()
                .unwrap_or(DEFAULT_SWEEP_CONCURRENCY)
                .max(1),
            pages_per_combination: std::env::var("PAGES_PER_COMBINATION")
                .unwrap_or_else(|_| "1".to_string())
                .parse::<u32>()
                .unwrap_or(1)
                .max(1),
            page_size: std::env::var("PAGE_SIZE")
                .unwrap_or_else(|_| DEFAULT_PAGE_SIZE.to_string())
                .parse::<u32>()
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .max(1),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_HTTP_TIMEOUT_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
                .max(1),
            readiness_backend: ReadinessBackend::parse(
                &std::env::var("READINESS_BACKEND").unwrap_or_else(|_| "sqlite".to_string()),
            )?,
            readiness_key: std::env::var("READINESS_KEY").unwrap_or_else(|_| READINESS_KEY.to_string()),
            readiness_ttl_secs: readiness_ttl_secs(
                &std::env::var("READINESS_TTL_SECS").unwrap_or_else(|_| READINESS_TTL_SECS.to_string()),
            ),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn readiness_ttl(&self) -> Duration {
        Duration::from_secs(self.readiness_ttl_secs)
    }
}

/// Unparseable values fall back to the default; the rest are clamped to `1..=MAX_READINESS_TTL_SECS`.
fn readiness_ttl_secs(raw: &str) -> u64 {
    raw.trim()
        .parse::<u64>()
        .unwrap_or(READINESS_TTL_SECS)
        .clamp(1, MAX_READINESS_TTL_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_ttl_is_clamped() {
        assert_eq!(readiness_ttl_secs("600"), 600);
        assert_eq!(readiness_ttl_secs("0"), 1);
        assert_eq!(readiness_ttl_secs(&u64::MAX.to_string()), MAX_READINESS_TTL_SECS);
        assert_eq!(readiness_ttl_secs("soon"), READINESS_TTL_SECS);
    }

    #[test]
    fn readiness_backend_accepts_known_names() {
        assert_eq!(ReadinessBackend::parse("sqlite").unwrap(), ReadinessBackend::Sqlite);
        assert_eq!(ReadinessBackend::parse(" Memory ").unwrap(), ReadinessBackend::Memory);
    }

    #[test]
    fn readiness_backend_rejects_unknown_names() {
        assert!(matches!(ReadinessBackend::parse("redis"), Err(AppError::Config(_))));
    }
}
