//! SQLite observation store: one row per (region, date), upserted per batch

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, instrument};

use super::{ObservationStore, Result, parse_stored_date};
use crate::config::StoreConfig;
use crate::models::{DateRange, Observation};

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS weather (
    region        TEXT NOT NULL,
    date          TEXT NOT NULL,
    temperature   REAL,
    precipitation REAL,
    PRIMARY KEY (region, date)
)
";

const UPSERT: &str = r"
INSERT INTO weather (region, date, temperature, precipitation)
VALUES (?, ?, ?, ?)
ON CONFLICT(region, date) DO UPDATE SET
    temperature   = excluded.temperature,
    precipitation = excluded.precipitation
";

const LATEST_DATE: &str = "SELECT MAX(date) FROM weather WHERE region = ?";

/// SQLite-backed observation store. Dates are stored as ISO 8601 text so
/// lexical and chronological order agree.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database described by `config`, creating the table if needed.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        debug!("Observation store ready at {}", config.database_url);

        Ok(Self { pool })
    }

    /// Number of rows stored for the region
    pub async fn count(&self, region: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weather WHERE region = ?")
            .bind(region)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Stored observations of the region within `range`, ordered by date
    pub async fn observations(&self, region: &str, range: DateRange) -> Result<Vec<Observation>> {
        let rows = sqlx::query(
            "SELECT region, date, temperature, precipitation FROM weather \
             WHERE region = ? AND date BETWEEN ? AND ? ORDER BY date",
        )
        .bind(region)
        .bind(range.start().to_string())
        .bind(range.end().to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<Observation> {
                Ok(Observation {
                    region: row.try_get("region")?,
                    date: parse_stored_date(row.try_get("date")?)?,
                    temperature: row.try_get("temperature")?,
                    precipitation: row.try_get("precipitation")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ObservationStore for SqliteStore {
    #[instrument(name = "latest_date", level = "debug", skip(self))]
    async fn latest_date(&self, region: &str) -> Result<Option<NaiveDate>> {
        let latest: Option<String> = sqlx::query_scalar(LATEST_DATE)
            .bind(region)
            .fetch_one(&self.pool)
            .await?;

        latest.map(parse_stored_date).transpose()
    }

    #[instrument(name = "upsert", level = "debug", skip_all, fields(rows = observations.len()))]
    async fn upsert(&self, observations: &[Observation]) -> Result<()> {
        if observations.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for observation in observations {
            sqlx::query(UPSERT)
                .bind(&observation.region)
                .bind(observation.date.to_string())
                .bind(observation.temperature)
                .bind(observation.precipitation)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
