//! ENTSO-E load feed client.
//!
//! Feed constraints:
//! - Queries longer than a year are rejected, so ranges are split into
//!   365-day chunks
//! - The gateway is flaky under load; transient failures are retried with
//!   a short pause
//! - Record timestamps carry the operator's local offset and are
//!   normalized to UTC at this boundary

use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{RawObservation, RawSeries, Timestamp};

/// ENTSO-E transparency gateway base URL.
const BASE_URL: &str = "https://web-api.tp.entsoe.eu/api";

/// Attempts per chunk before giving up.
pub const MAX_ATTEMPTS: u32 = 10;

/// Pause between attempts.
const RETRY_PAUSE: StdDuration = StdDuration::from_secs(1);

/// Earliest hour the feed serves load data for.
pub fn series_epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed error: {0}")]
    Api(String),

    #[error("invalid response format: {0}")]
    Decode(String),

    #[error("invalid query range: start {start} is after end {end}")]
    InvalidRange { start: Timestamp, end: Timestamp },

    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// A fetch either yields rows or reports that the range holds no data yet
/// (querying past the feed's horizon is routine, not an error).
#[derive(Debug)]
pub enum FetchOutcome {
    Data(RawSeries),
    Empty,
}

/// Gateway response wrapper: {"data": [...]}.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    data: Vec<LoadRecord>,
}

/// Raw feed record.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadRecord {
    pub timestamp: String,
    #[serde(default)]
    pub forecasted_load: Option<f64>,
    #[serde(default)]
    pub actual_load: Option<f64>,
}

impl LoadRecord {
    fn to_observation(&self) -> Result<RawObservation, FeedError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FeedError::Decode(format!("bad timestamp {:?}: {e}", self.timestamp)))?;
        Ok(RawObservation {
            timestamp,
            forecast: self.forecasted_load,
            load: self.actual_load,
        })
    }
}

/// Split `[start, end)` into contiguous chunks of at most 365 days.
pub fn split_yearly(
    start: Timestamp,
    end: Timestamp,
) -> Result<Vec<(Timestamp, Timestamp)>, FeedError> {
    if start > end {
        return Err(FeedError::InvalidRange { start, end });
    }
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let chunk_end = (cursor + Duration::days(365)).min(end);
        chunks.push((cursor, chunk_end));
        cursor = chunk_end;
    }
    Ok(chunks)
}

/// Run `attempt` until it succeeds, retrying transient failures with a
/// pause in between. Malformed payloads and bad ranges are permanent and
/// fail immediately.
pub fn fetch_with_retry<F>(
    max_attempts: u32,
    pause: StdDuration,
    mut attempt: F,
) -> Result<FetchOutcome, FeedError>
where
    F: FnMut() -> Result<FetchOutcome, FeedError>,
{
    let mut last_error = String::new();
    for n in 1..=max_attempts {
        match attempt() {
            Ok(outcome) => return Ok(outcome),
            Err(e @ (FeedError::Decode(_) | FeedError::InvalidRange { .. })) => return Err(e),
            Err(e) => {
                warn!(attempt = n, max_attempts, error = %e, "feed request failed");
                last_error = e.to_string();
                if n < max_attempts {
                    thread::sleep(pause);
                }
            }
        }
    }
    Err(FeedError::Exhausted {
        attempts: max_attempts,
        last_error,
    })
}

/// ENTSO-E gateway client.
pub struct EntsoeClient {
    http: Client,
    base_url: String,
    api_key: String,
    country: String,
    max_attempts: u32,
    pause: StdDuration,
}

impl EntsoeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: BASE_URL.to_string(),
            api_key: api_key.into(),
            country: "CH".to_string(),
            max_attempts: MAX_ATTEMPTS,
            pause: RETRY_PAUSE,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Fetch the load series over `[start, end)`, chunked yearly, each
    /// chunk retried independently.
    pub fn fetch(&self, start: Timestamp, end: Timestamp) -> Result<FetchOutcome, FeedError> {
        let mut combined = RawSeries::new();
        for (chunk_start, chunk_end) in split_yearly(start, end)? {
            let outcome = fetch_with_retry(self.max_attempts, self.pause, || {
                self.fetch_chunk(chunk_start, chunk_end)
            })?;
            if let FetchOutcome::Data(series) = outcome {
                combined.append(series);
            }
        }
        if combined.is_empty() {
            Ok(FetchOutcome::Empty)
        } else {
            Ok(FetchOutcome::Data(combined))
        }
    }

    /// Fetch everything newer than the current series: from the hour after
    /// the latest actual on record (or the feed epoch for an empty series)
    /// through tomorrow, which picks up day-ahead forecasts already
    /// published.
    pub fn update(&self, current: &RawSeries) -> Result<FetchOutcome, FeedError> {
        let start = update_start(current);
        let end = Utc::now() + Duration::days(1);
        self.fetch(start, end)
    }

    fn fetch_chunk(&self, start: Timestamp, end: Timestamp) -> Result<FetchOutcome, FeedError> {
        info!(%start, %end, country = %self.country, "requesting load chunk");
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("securityToken", self.api_key.as_str()),
                ("country", self.country.as_str()),
                ("start", &start.to_rfc3339()),
                ("end", &end.to_rfc3339()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(FeedError::Api(format!("{status}: {text}")));
        }

        let payload: ApiResponse = response
            .json()
            .map_err(|e| FeedError::Decode(e.to_string()))?;
        if payload.data.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        let rows = payload
            .data
            .iter()
            .map(LoadRecord::to_observation)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FetchOutcome::Data(RawSeries::from_rows(rows)))
    }
}

fn update_start(current: &RawSeries) -> Timestamp {
    current
        .latest_actual_timestamp()
        .map(|t| t + Duration::hours(1))
        .unwrap_or_else(series_epoch)
}
