//! Incremental sync controller
//!
//! For each region: resolve the resume point from the store, plan chunks up
//! to yesterday, then fetch (with retry) and commit one chunk at a time.
//! Committed chunks are never rolled back, so a failed run can simply be
//! repeated and resumes after the last committed day.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::IngestConfig;
use crate::models::{DateRange, Region};
use crate::planner::Chunks;
use crate::store::{ObservationStore, StoreError};
use crate::weather::{FetchError, RetryError, RetryPolicy, Sleeper, WeatherSource, fetch_with_retry};

/// Behaviour after a chunk of a region fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abandon the region's remaining chunks
    #[default]
    FailFast,
    /// Keep going with later chunks after a fetch failure; the region is still
    /// reported failed. A later commit moves the resume point past the failed
    /// gap. Store failures always end the region.
    Continue,
}

/// Tunables of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub chunk_span_days: NonZeroU32,
    pub backfill_years: u32,
    pub retry: RetryPolicy,
    pub failure_policy: FailurePolicy,
}

impl SyncSettings {
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let chunk_span_days = NonZeroU32::new(config.sync.chunk_span_days)
            .context("sync.chunk_span_days must be at least 1")?;
        let max_attempts = NonZeroU32::new(config.retry.max_attempts)
            .context("retry.max_attempts must be at least 1")?;

        Ok(Self {
            chunk_span_days,
            backfill_years: config.sync.backfill_years,
            retry: RetryPolicy::new(
                max_attempts,
                Duration::from_secs(config.retry.base_delay_seconds),
            ),
            failure_policy: config.sync.failure_policy,
        })
    }
}

/// Why a region did not complete
#[derive(Error, Debug)]
pub enum SyncFailure {
    #[error("[{region}] {range}: failed after {attempts} attempts, last error: {last}")]
    ExhaustedRetries {
        region: String,
        range: DateRange,
        attempts: u32,
        last: FetchError,
    },

    #[error("[{region}] {range}: {source}")]
    NonTransient {
        region: String,
        range: DateRange,
        #[source]
        source: FetchError,
    },

    #[error("[{region}] store failure: {source}")]
    Store {
        region: String,
        #[source]
        source: StoreError,
    },
}

impl SyncFailure {
    fn from_retry(region: &Region, range: DateRange, error: RetryError) -> Self {
        match error {
            RetryError::Exhausted { attempts, last } => Self::ExhaustedRetries {
                region: region.id.clone(),
                range,
                attempts,
                last,
            },
            RetryError::NonTransient(source) => Self::NonTransient {
                region: region.id.clone(),
                range,
                source,
            },
        }
    }

    fn store(region: &Region, source: StoreError) -> Self {
        Self::Store {
            region: region.id.clone(),
            source,
        }
    }
}

#[derive(Debug)]
pub enum RegionStatus {
    Done,
    Failed(SyncFailure),
}

/// Result of syncing one region
#[derive(Debug)]
pub struct RegionOutcome {
    pub region: String,
    /// Range planned for this run; `None` when the region was already current
    /// or its resume point could not be read
    pub planned: Option<DateRange>,
    pub chunks_committed: usize,
    pub rows_upserted: usize,
    pub status: RegionStatus,
}

impl RegionOutcome {
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.status, RegionStatus::Done)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&SyncFailure> {
        match &self.status {
            RegionStatus::Done => None,
            RegionStatus::Failed(failure) => Some(failure),
        }
    }
}

impl fmt::Display for RegionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            RegionStatus::Done => write!(
                f,
                "{}: DONE ({} chunks, {} days)",
                self.region, self.chunks_committed, self.rows_upserted
            ),
            RegionStatus::Failed(failure) => write!(
                f,
                "{}: FAILED after {} chunks, {} days: {}",
                self.region, self.chunks_committed, self.rows_upserted, failure
            ),
        }
    }
}

/// Outcomes of every region of a run, in processing order
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<RegionOutcome>,
}

impl SyncReport {
    /// True when every region finished
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(RegionOutcome::is_done)
    }

    pub fn failed(&self) -> impl Iterator<Item = &RegionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_done())
    }

    #[must_use]
    pub fn outcome(&self, region: &str) -> Option<&RegionOutcome> {
        self.outcomes.iter().find(|o| o.region == region)
    }
}

/// Drives resume-point resolution, chunk planning, fetching and committing
pub struct SyncController {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn ObservationStore>,
    sleeper: Arc<dyn Sleeper>,
    settings: SyncSettings,
}

impl SyncController {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn ObservationStore>,
        sleeper: Arc<dyn Sleeper>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            sleeper,
            settings,
        }
    }

    /// Sync every region in order. A failed region does not stop the others.
    pub async fn run(&self, regions: &[Region], today: NaiveDate) -> SyncReport {
        let mut report = SyncReport::default();

        for region in regions {
            let outcome = self.sync_region(region, today).await;
            match &outcome.status {
                RegionStatus::Done => info!("{}", outcome),
                RegionStatus::Failed(_) => error!("{}", outcome),
            }
            report.outcomes.push(outcome);
        }

        info!(
            "Sync finished: {} of {} regions done",
            report.outcomes.iter().filter(|o| o.is_done()).count(),
            report.outcomes.len()
        );
        report
    }

    /// Range still missing for the region: from the day after the latest
    /// stored date (or the backfill horizon) through yesterday. `None` when
    /// the region is already current.
    pub async fn resume_range(
        &self,
        region: &Region,
        today: NaiveDate,
    ) -> Result<Option<DateRange>, StoreError> {
        let latest = self.store.latest_date(&region.id).await?;

        let Some(end) = today.checked_sub_days(Days::new(1)) else {
            return Ok(None);
        };

        let start = match latest {
            None => {
                let start = today
                    .checked_sub_months(Months::new(self.settings.backfill_years.saturating_mul(12)))
                    .unwrap_or(NaiveDate::MIN);
                info!("[INIT] {}: {} ~ {}", region.id, start, end);
                start
            }
            Some(latest) => {
                let Some(start) = latest.checked_add_days(Days::new(1)) else {
                    return Ok(None);
                };
                info!("[INCREMENTAL] {}: {} ~ {}", region.id, start, end);
                start
            }
        };

        Ok(DateRange::new(start, end))
    }

    #[instrument(name = "sync_region", skip_all, fields(region = %region.id))]
    pub async fn sync_region(&self, region: &Region, today: NaiveDate) -> RegionOutcome {
        info!("=== {} ({}) ===", region.id, region.format_coordinates());

        let mut outcome = RegionOutcome {
            region: region.id.clone(),
            planned: None,
            chunks_committed: 0,
            rows_upserted: 0,
            status: RegionStatus::Done,
        };

        let planned = match self.resume_range(region, today).await {
            Ok(Some(planned)) => planned,
            Ok(None) => {
                info!("{}: already up to date", region.id);
                return outcome;
            }
            Err(e) => {
                outcome.status = RegionStatus::Failed(SyncFailure::store(region, e));
                return outcome;
            }
        };
        outcome.planned = Some(planned);

        let mut first_failure = None;
        for chunk in Chunks::new(planned.start(), planned.end(), self.settings.chunk_span_days) {
            info!(" - {}: {}", region.id, chunk);

            let observations = match fetch_with_retry(
                self.source.as_ref(),
                self.sleeper.as_ref(),
                region,
                chunk,
                &self.settings.retry,
            )
            .await
            {
                Ok(observations) => observations,
                Err(e) => {
                    let failure = SyncFailure::from_retry(region, chunk, e);
                    error!("{}", failure);
                    match self.settings.failure_policy {
                        FailurePolicy::FailFast => {
                            first_failure = Some(failure);
                            break;
                        }
                        FailurePolicy::Continue => {
                            warn!("{}: continuing with remaining chunks", region.id);
                            first_failure.get_or_insert(failure);
                            continue;
                        }
                    }
                }
            };

            // Store failures end the region under every policy: committing a
            // later chunk would move the resume point past this window.
            if let Err(e) = self.store.upsert(&observations).await {
                let failure = SyncFailure::store(region, e);
                error!("{}", failure);
                first_failure.get_or_insert(failure);
                break;
            }

            outcome.chunks_committed += 1;
            outcome.rows_upserted += observations.len();
            info!("{}: upserted {} days", region.id, observations.len());
        }

        if let Some(failure) = first_failure {
            outcome.status = RegionStatus::Failed(failure);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;
    use crate::store::MemoryStore;
    use crate::weather::TokioSleeper;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Serves every requested day, recording the ranges asked for
    #[derive(Default)]
    struct EchoSource {
        requests: Mutex<Vec<DateRange>>,
    }

    #[async_trait]
    impl WeatherSource for EchoSource {
        async fn fetch(&self, region: &Region, range: DateRange) -> Result<Vec<Observation>, FetchError> {
            self.requests.lock().unwrap().push(range);
            Ok(range
                .days()
                .map(|d| Observation::new(region.id.as_str(), d, Some(10.0), Some(0.0)))
                .collect())
        }
    }

    fn settings() -> SyncSettings {
        SyncSettings::from_config(&IngestConfig::default()).unwrap()
    }

    fn controller(source: Arc<EchoSource>, store: Arc<MemoryStore>) -> SyncController {
        SyncController::new(source, store, Arc::new(TokioSleeper), settings())
    }

    #[test]
    fn test_settings_from_default_config() {
        let settings = settings();
        assert_eq!(settings.chunk_span_days.get(), 30);
        assert_eq!(settings.backfill_years, 5);
        assert_eq!(settings.retry.max_attempts(), 3);
        assert_eq!(settings.retry.delay_after(2), Duration::from_secs(10));
        assert_eq!(settings.failure_policy, FailurePolicy::FailFast);
    }

    #[tokio::test]
    async fn test_resume_range_without_history_uses_backfill_horizon() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller(Arc::new(EchoSource::default()), store);

        let range = controller
            .resume_range(&Region::new("seoul", 37.5, 127.0), date(2024, 3, 10))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(range.start(), date(2019, 3, 10));
        assert_eq!(range.end(), date(2024, 3, 9));
    }

    #[tokio::test]
    async fn test_resume_range_after_latest_stored_date() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(&[Observation::new("seoul", date(2024, 1, 1), None, None)])
            .await
            .unwrap();
        let controller = controller(Arc::new(EchoSource::default()), store);
        let region = Region::new("seoul", 37.5, 127.0);

        let range = controller.resume_range(&region, date(2024, 1, 10)).await.unwrap().unwrap();
        assert_eq!(range.start(), date(2024, 1, 2));
        assert_eq!(range.end(), date(2024, 1, 9));

        assert_eq!(controller.resume_range(&region, date(2024, 1, 2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sync_region_commits_every_chunk() {
        let source = Arc::new(EchoSource::default());
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(&[Observation::new("jeju", date(2023, 12, 31), None, None)])
            .await
            .unwrap();
        let controller = controller(source.clone(), store.clone());

        let outcome = controller
            .sync_region(&Region::new("jeju", 33.5, 126.5), date(2024, 3, 1))
            .await;

        assert!(outcome.is_done());
        assert_eq!(outcome.chunks_committed, 2);
        assert_eq!(outcome.rows_upserted, 60);
        assert_eq!(source.requests.lock().unwrap().len(), 2);
        assert_eq!(store.latest_date("jeju").await.unwrap(), Some(date(2024, 2, 29)));
        assert!(outcome.to_string().starts_with("jeju: DONE"));
    }
}
