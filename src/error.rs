use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response envelope not recognized: {0}")]
    EnvelopeParse(String),

    #[error("Invalid combination: {0}")]
    InvalidCombination(String),

    #[error("Unknown period: {0}")]
    UnknownPeriod(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Write to {table} failed: {source}")]
    WriteFailure {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("A sweep is already in progress")]
    SweepOverlap,

    #[error("Readiness store error: {0}")]
    Readiness(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::InvalidCombination(_) | AppError::UnknownPeriod(_) => StatusCode::BAD_REQUEST,
            AppError::SweepOverlap => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
