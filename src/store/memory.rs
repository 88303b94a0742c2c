//! In-memory observation store with injectable failures

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{ObservationStore, Result, StoreError};
use crate::models::{DateRange, Observation};

type Row = (Option<f64>, Option<f64>);

/// In-process observation store with the same semantics as [`super::SqliteStore`].
/// Failures can be injected for exercising error paths.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(String, NaiveDate), Row>>,
    fail_reads: AtomicBool,
    fail_next_upsert: AtomicBool,
    committed_batches: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `latest_date` call fail
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make the next non-empty `upsert` fail without writing anything
    pub fn fail_next_upsert(&self) {
        self.fail_next_upsert.store(true, Ordering::SeqCst);
    }

    /// Number of non-empty batches committed so far
    pub fn committed_batches(&self) -> usize {
        self.committed_batches.load(Ordering::SeqCst)
    }

    pub fn count(&self, region: &str) -> usize {
        self.lock().keys().filter(|(r, _)| r == region).count()
    }

    /// Stored observations of the region within `range`, ordered by date
    pub fn observations(&self, region: &str, range: DateRange) -> Vec<Observation> {
        self.lock()
            .range((region.to_string(), range.start())..=(region.to_string(), range.end()))
            .map(|((region, date), (temperature, precipitation))| Observation {
                region: region.clone(),
                date: *date,
                temperature: *temperature,
                precipitation: *precipitation,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, NaiveDate), Row>> {
        // a poisoned map is still structurally valid
        self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn latest_date(&self, region: &str) -> Result<Option<NaiveDate>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }

        Ok(self
            .lock()
            .keys()
            .filter(|(r, _)| r == region)
            .map(|(_, date)| *date)
            .next_back())
    }

    async fn upsert(&self, observations: &[Observation]) -> Result<()> {
        if observations.is_empty() {
            return Ok(());
        }
        if self.fail_next_upsert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected upsert failure".into()));
        }

        let mut rows = self.lock();
        for observation in observations {
            rows.insert(
                (observation.region.clone(), observation.date),
                (observation.temperature, observation.precipitation),
            );
        }
        self.committed_batches.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_latest_date_ignores_other_regions() {
        let store = MemoryStore::new();
        store
            .upsert(&[
                Observation::new("jeju", date(2024, 5, 1), None, None),
                Observation::new("seoul", date(2024, 1, 3), Some(1.0), None),
                Observation::new("seoul", date(2024, 1, 1), Some(0.0), None),
            ])
            .await
            .unwrap();

        assert_eq!(store.latest_date("seoul").await.unwrap(), Some(date(2024, 1, 3)));
        assert_eq!(store.latest_date("busan").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_upsert_writes_nothing() {
        let store = MemoryStore::new();
        store.fail_next_upsert();

        let batch = [Observation::new("seoul", date(2024, 1, 1), Some(1.0), None)];
        assert!(store.upsert(&batch).await.is_err());
        assert_eq!(store.count("seoul"), 0);

        store.upsert(&batch).await.unwrap();
        assert_eq!(store.count("seoul"), 1);
        assert_eq!(store.committed_batches(), 1);
    }

    #[tokio::test]
    async fn test_empty_upsert_does_not_count() {
        let store = MemoryStore::new();
        store.upsert(&[]).await.unwrap();
        assert_eq!(store.committed_batches(), 0);
    }
}
