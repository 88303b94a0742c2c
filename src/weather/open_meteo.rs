//! Open-Meteo historical archive client
//!
//! Queries the archive endpoint for daily mean temperature and precipitation
//! sum and maps the parallel `daily` arrays into [`Observation`]s.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{FetchError, WeatherSource};
use crate::config::SourceConfig;
use crate::models::{DateRange, Observation, Region};

const DAILY_METRICS: &str = "temperature_2m_mean,precipitation_sum";

/// Weather source backed by the Open-Meteo archive API
pub struct OpenMeteoArchiveClient {
    client: Client,
    base_url: String,
    timezone: String,
}

impl OpenMeteoArchiveClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(config.user_agent.as_str())
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timezone: config.timezone.clone(),
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoArchiveClient {
    #[instrument(skip(self, region), fields(region = %region.id, range = %range))]
    async fn fetch(&self, region: &Region, range: DateRange) -> Result<Vec<Observation>, FetchError> {
        let start_time = Instant::now();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", region.latitude.to_string()),
                ("longitude", region.longitude.to_string()),
                ("start_date", range.start().to_string()),
                ("end_date", range.end().to_string()),
                ("daily", DAILY_METRICS.to_string()),
                ("timezone", self.timezone.clone()),
            ])
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let observations = parse_daily(&region.id, range, &body)?;

        let elapsed = start_time.elapsed();
        debug!(
            "Received {} days for {} in {:.3}s",
            observations.len(),
            region.id,
            elapsed.as_secs_f64()
        );
        if elapsed.as_secs() > 30 {
            warn!("Slow archive response: {:.3}s", elapsed.as_secs_f64());
        }

        Ok(observations)
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::transport(error.to_string())
    }
}

/// 429 and 5xx may clear up on their own; any other rejection means the
/// request itself is wrong and will be rejected again. Other 4xx statuses
/// are deliberately not retried even though a blanket status check would
/// treat them like any other HTTP error: a 400 for a date outside the
/// archive fails the chunk at once instead of after every backoff.
fn classify_status(status: StatusCode, body: &str) -> FetchError {
    let reason = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.reason)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
    let message = format!("HTTP {}: {reason}", status.as_u16());

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::transport(message)
    } else {
        info!("Archive rejected request: {}", message);
        FetchError::format(message)
    }
}

/// Map an archive response body into one observation per day of `range`.
pub fn parse_daily(region: &str, range: DateRange, body: &str) -> Result<Vec<Observation>, FetchError> {
    let response: ArchiveResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::format(format!("[{region}] invalid JSON body: {e}")))?;

    let daily = response
        .daily
        .ok_or_else(|| FetchError::format(format!("[{region}] response has no 'daily' field")))?;

    let days = daily.time.len();
    let temperatures = metric_or_nulls(daily.temperature, days, region, "temperature_2m_mean")?;
    let precipitations = metric_or_nulls(daily.precipitation, days, region, "precipitation_sum")?;

    let dates = daily
        .time
        .iter()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| FetchError::format(format!("[{region}] invalid date '{raw}': {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !dates.iter().copied().eq(range.days()) {
        return Err(FetchError::format(format!(
            "[{region}] expected {} days for {range}, got {} ({})",
            range.num_days(),
            dates.len(),
            match (dates.first(), dates.last()) {
                (Some(first), Some(last)) => format!("{first}~{last}"),
                _ => "none".to_string(),
            }
        )));
    }

    Ok(dates
        .into_iter()
        .zip(temperatures)
        .zip(precipitations)
        .map(|((date, temperature), precipitation)| {
            Observation::new(region, date, temperature, precipitation)
        })
        .collect())
}

fn metric_or_nulls(
    values: Option<Vec<Option<f64>>>,
    days: usize,
    region: &str,
    name: &str,
) -> Result<Vec<Option<f64>>, FetchError> {
    match values {
        None => Ok(vec![None; days]),
        Some(values) if values.len() == days => Ok(values),
        Some(values) => Err(FetchError::format(format!(
            "[{region}] '{name}' has {} values for {days} days",
            values.len()
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<DailyData>,
}

#[derive(Debug, Deserialize)]
struct DailyData {
    time: Vec<String>,
    #[serde(rename = "temperature_2m_mean")]
    temperature: Option<Vec<Option<f64>>>,
    #[serde(rename = "precipitation_sum")]
    precipitation: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    reason: Option<String>,
}
