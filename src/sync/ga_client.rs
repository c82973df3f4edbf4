//! Google Analytics Core Reporting API client
//!
//! Fetches one page of `ga:pagePath` / `ga:pageviews` rows per call.
//!
//! ## API Reference
//!
//! Endpoint: `GET https://www.googleapis.com/analytics/v3/data/ga`
//!
//! Query: `ids=ga:<profile>`, `dimensions`, `metrics`, `start-date`,
//! `end-date`, `start-index`, `max-results`.
//!
//! Returns:
//! ```json
//! {
//!   "totalResults": 2,
//!   "totalsForAllResults": { "ga:pageviews": "13" },
//!   "rows": [["/node/5", "10"], ["/en/node/5", "3"]]
//! }
//! ```
//!
//! The bearer token is supplied by configuration; acquiring and refreshing
//! it (OAuth) happens outside this crate.

use super::source::{AnalyticsSource, RemoteError, ReportPage, ReportRequest};
use crate::config::CounterConfig;
use crate::error::{CounterError, CounterResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Raw response body
#[derive(Debug, Deserialize)]
struct GaResponse {
    #[serde(rename = "totalResults")]
    total_results: Option<u64>,
    #[serde(rename = "totalsForAllResults", default)]
    totals_for_all_results: HashMap<String, Value>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
    error: Option<GaErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GaErrorBody {
    code: Option<u16>,
    message: Option<String>,
}

pub struct GaReportingClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GaReportingClient {
    /// Build a client with the configured endpoint, token and timeout
    pub fn new(config: &CounterConfig) -> CounterResult<Self> {
        config.validate_remote()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CounterError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn query_params(request: &ReportRequest) -> Vec<(&'static str, String)> {
        vec![
            ("ids", format!("ga:{}", request.profile_id)),
            ("dimensions", request.dimension.clone()),
            ("metrics", request.metric.clone()),
            ("start-date", request.start_date.format("%Y-%m-%d").to_string()),
            ("end-date", request.end_date.format("%Y-%m-%d").to_string()),
            ("start-index", request.start_index.to_string()),
            ("max-results", request.max_results.to_string()),
        ]
    }
}

#[async_trait]
impl AnalyticsSource for GaReportingClient {
    async fn fetch_page(&self, request: &ReportRequest) -> Result<ReportPage, RemoteError> {
        let response = self
            .client
            .get(&self.base_url)
            .bearer_auth(&self.access_token)
            .query(&Self::query_params(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Transport(format!("request timed out: {}", e))
                } else {
                    RemoteError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Auth(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(RemoteError::Transport(format!("Analytics API error: {}", status)));
        }

        parse_report(&body, request.metric.as_str())
    }
}

/// Decode a report body into a page
///
/// Empty or malformed payloads are transport errors: the cycle is aborted
/// and retried on the next schedule.
pub fn parse_report(body: &str, metric: &str) -> Result<ReportPage, RemoteError> {
    if body.trim().is_empty() {
        return Err(RemoteError::Transport("empty response body".to_string()));
    }

    let parsed: GaResponse = serde_json::from_str(body)
        .map_err(|e| RemoteError::Transport(format!("malformed response: {}", e)))?;

    if let Some(error) = parsed.error {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        return match error.code {
            Some(401) | Some(403) => Err(RemoteError::Auth(message)),
            _ => Err(RemoteError::Transport(message)),
        };
    }

    let total_results = parsed
        .total_results
        .ok_or_else(|| RemoteError::Transport("response has no totalResults".to_string()))?;

    let total_pageviews = parsed
        .totals_for_all_results
        .get(metric)
        .and_then(as_count)
        .unwrap_or(0);

    let mut rows = Vec::with_capacity(parsed.rows.len());
    for row in &parsed.rows {
        let path = row.first().and_then(|v| v.as_str());
        let views = row.get(1).and_then(as_count);
        match (path, views) {
            (Some(path), Some(views)) => rows.push((path.to_string(), views)),
            _ => {
                return Err(RemoteError::Transport(format!("malformed row: {:?}", row)));
            }
        }
    }

    Ok(ReportPage {
        rows,
        total_results,
        total_pageviews,
        from_cache: false,
    })
}

/// Counts arrive as strings ("13") or numbers (13)
fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
