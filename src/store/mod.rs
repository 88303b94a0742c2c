//! Observation store
//!
//! Persists daily observations keyed by (region, date) and exposes the
//! latest stored date per region, which is the only resume state.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Observation;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Maximum stored date for the region, `None` when it has no rows.
    async fn latest_date(&self, region: &str) -> Result<Option<NaiveDate>>;

    /// Insert or replace every observation by (region, date) as one unit.
    /// Either the whole batch is committed or nothing is. Empty batches are a no-op.
    async fn upsert(&self, observations: &[Observation]) -> Result<()>;
}

fn parse_stored_date(value: String) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|source| StoreError::InvalidDate { value, source })
}
