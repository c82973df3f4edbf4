//! Remote analytics source interface
//!
//! The wire format belongs to the client implementation (see `ga_client`);
//! the sync engine only sees `ReportRequest` in and `ReportPage` out.

use crate::error::CounterResult;
use crate::hashing::request_cache_id;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dimension and metric mirrored by the sync engine
pub const PATH_DIMENSION: &str = "ga:pagePath";
pub const PAGEVIEWS_METRIC: &str = "ga:pageviews";

/// Reports can not start before this date
pub fn earliest_report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2005, 1, 1).unwrap_or_default()
}

/// How far back a report reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    AllTime,
    Seconds(i64),
}

impl Lookback {
    /// 0 (or negative) seconds means all time
    pub fn from_secs(secs: i64) -> Self {
        if secs <= 0 {
            Lookback::AllTime
        } else {
            Lookback::Seconds(secs)
        }
    }

    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Lookback::AllTime => earliest_report_date(),
            Lookback::Seconds(secs) => {
                let start = today - Duration::seconds(*secs);
                start.max(earliest_report_date())
            }
        }
    }
}

/// One page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub profile_id: String,
    pub dimension: String,
    pub metric: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 1-based
    pub start_index: u64,
    pub max_results: u64,
}

impl ReportRequest {
    /// Pageviews-per-path request for one page of results
    ///
    /// The end date is tomorrow to absorb timezone skew between this host
    /// and the analytics service.
    pub fn pageviews_by_path(
        profile_id: &str,
        lookback: Lookback,
        today: NaiveDate,
        start_index: u64,
        max_results: u64,
    ) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            dimension: PATH_DIMENSION.to_string(),
            metric: PAGEVIEWS_METRIC.to_string(),
            start_date: lookback.start_date(today),
            end_date: today + Duration::days(1),
            start_index,
            max_results,
        }
    }

    /// Response cache id derived from every request parameter
    pub fn cache_id(&self) -> CounterResult<String> {
        let serialized = serde_json::to_string(self)?;
        Ok(request_cache_id(&serialized))
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPage {
    /// `(path, pageviews)` pairs
    pub rows: Vec<(String, i64)>,
    /// Number of rows across all pages
    pub total_results: u64,
    /// Pageview sum across all pages
    pub total_pageviews: i64,
    /// Served from the response cache (no remote call made)
    #[serde(skip)]
    pub from_cache: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote source of pageview rows
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn fetch_page(&self, request: &ReportRequest) -> Result<ReportPage, RemoteError>;
}
