use std::time::{Duration, Instant};

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::UpstreamQuery;
use crate::config::{Config, UPSTREAM_FLAGS, UPSTREAM_UT, USER_AGENT};
use crate::error::{AppError, Result};
use crate::normalizer::RawRecord;

/// How much of an unparseable body to keep in errors and logs.
const BODY_SNIPPET_CHARS: usize = 200;

/// Issues list queries against the upstream quote API. No caching, no retries:
/// a failed page fails the combination for this sweep.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl Fetcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_settings(&cfg.upstream_url, cfg.page_size, cfg.http_timeout())
    }

    pub fn with_settings(base_url: &str, page_size: u32, timeout: Duration) -> Result<Self> {
        // Fail on a malformed base URL at startup rather than on the first sweep.
        Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("UPSTREAM_URL '{base_url}' is not a valid URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            page_size,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Full request URL for one page. Pages start at 1.
    pub fn page_url(&self, query: &UpstreamQuery, page: u32) -> Result<Url> {
        let page = page.to_string();
        let page_size = self.page_size.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("cb", query.callback),
            ("fid", query.ranking_field),
            ("pn", &page),
            ("pz", &page_size),
            ("fs", query.filter),
            ("fields", query.fields),
        ];
        params.extend_from_slice(UPSTREAM_FLAGS);
        params.push(("ut", UPSTREAM_UT));

        Url::parse_with_params(&self.base_url, &params)
            .map_err(|e| AppError::Config(format!("cannot build upstream URL: {e}")))
    }

    /// Fetch one page and return its raw records.
    ///
    /// A well-formed response without a `data` object (the upstream's error
    /// envelope) yields an empty list, not an error.
    pub async fn fetch_page(&self, query: &UpstreamQuery, page: u32) -> Result<Vec<RawRecord>> {
        let url = self.page_url(query, page)?;
        let started = Instant::now();

        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().await?;

        let envelope = unwrap_envelope(&body)?;
        let records = extract_records(envelope);
        if records.is_empty() {
            warn!(
                combination = %query.combination,
                page,
                "Upstream returned no data: {}",
                snippet(&body),
            );
        }

        debug!(
            combination = %query.combination,
            page,
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched page",
        );
        Ok(records)
    }
}

/// Strip the transport envelope: either a bare JSON object or `token({...})`.
pub fn unwrap_envelope(body: &str) -> Result<Value> {
    let trimmed = body.trim();

    let json_str = if trimmed.starts_with('{') {
        trimmed
    } else {
        match (trimmed.find('('), trimmed.rfind(')')) {
            (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
            _ => {
                return Err(AppError::EnvelopeParse(format!(
                    "neither JSON nor JSONP: {}",
                    snippet(trimmed)
                )))
            }
        }
    };

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| AppError::EnvelopeParse(format!("{e}: {}", snippet(trimmed))))?;
    if !value.is_object() {
        return Err(AppError::EnvelopeParse(format!(
            "payload is not a JSON object: {}",
            snippet(trimmed)
        )));
    }
    Ok(value)
}

/// Pull the `data.diff` rows out of a parsed envelope.
///
/// `diff` is normally an array; with some flag combinations the upstream sends
/// an object keyed by row index instead, so both are accepted. Non-object rows
/// are dropped.
pub fn extract_records(envelope: Value) -> Vec<RawRecord> {
    let Value::Object(mut root) = envelope else {
        return Vec::new();
    };
    let Some(Value::Object(mut data)) = root.remove("data") else {
        return Vec::new();
    };

    let rows: Vec<Value> = match data.remove("diff") {
        Some(Value::Array(rows)) => rows,
        Some(Value::Object(keyed)) => {
            let mut keyed: Vec<(String, Value)> = keyed.into_iter().collect();
            keyed.sort_by_key(|(k, _)| k.parse::<u64>().unwrap_or(u64::MAX));
            keyed.into_iter().map(|(_, v)| v).collect()
        }
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter_map(|row| match row {
            Value::Object(fields) => Some(RawRecord::new(fields)),
            _ => None,
        })
        .collect()
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}
