//! Configuration management for the weather ingest application
//!
//! Handles loading configuration from a TOML file and environment variables,
//! and provides validation for all configuration settings.

use crate::IngestError;
use crate::models::{Region, default_regions};
use crate::sync::FailurePolicy;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Root configuration structure for the weather ingest application
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Upstream archive API configuration
    pub source: SourceConfig,
    /// Retry behaviour for upstream fetches
    pub retry: RetryConfig,
    /// Incremental sync settings
    pub sync: SyncConfig,
    /// Observation store configuration
    pub store: StoreConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Regions to ingest, in processing order
    pub regions: Vec<Region>,
}

/// Upstream archive API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Archive endpoint URL
    #[serde(default = "default_source_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub timeout_seconds: u32,
    /// Timezone used by the archive to cut days
    #[serde(default = "default_source_timezone")]
    pub timezone: String,
    /// User agent sent with every request
    #[serde(default = "default_source_user_agent")]
    pub user_agent: String,
}

impl SourceConfig {
    /// Calendar date at `now` in the archive's timezone. Days the archive has
    /// not closed yet must not be requested.
    pub fn today(&self, now: DateTime<Utc>) -> Result<NaiveDate> {
        let tz = self.parse_timezone()?;
        Ok(now.with_timezone(&tz).date_naive())
    }

    fn parse_timezone(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            IngestError::config(format!(
                "Unknown source timezone '{}'. Use an IANA name such as Asia/Seoul",
                self.timezone
            ))
            .into()
        })
    }
}

/// Retry configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per chunk, including the first
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    /// Backoff unit in seconds; attempt `n` waits `n * base_delay_seconds`
    #[serde(default = "default_retry_base_delay")]
    pub base_delay_seconds: u64,
}

/// Incremental sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum days between a chunk's first and last date
    #[serde(default = "default_chunk_span_days")]
    pub chunk_span_days: u32,
    /// History fetched for a region with no stored rows
    #[serde(default = "default_backfill_years")]
    pub backfill_years: u32,
    /// What to do with the rest of a region after a chunk fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Observation store configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database connection URL
    #[serde(default = "default_store_database_url")]
    pub database_url: String,
    /// Connection pool size
    #[serde(default = "default_store_max_connections")]
    pub max_connections: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_source_base_url() -> String {
    "https://archive-api.open-meteo.com/v1/archive".to_string()
}

fn default_source_timeout() -> u32 {
    90
}

fn default_source_timezone() -> String {
    "Asia/Seoul".to_string()
}

fn default_source_user_agent() -> String {
    format!("weather-ingest/{}", crate::VERSION)
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    5
}

fn default_chunk_span_days() -> u32 {
    30
}

fn default_backfill_years() -> u32 {
    5
}

fn default_store_database_url() -> String {
    "sqlite://weather.db?mode=rwc".to_string()
}

fn default_store_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            retry: RetryConfig::default(),
            sync: SyncConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            regions: default_regions(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            timeout_seconds: default_source_timeout(),
            timezone: default_source_timezone(),
            user_agent: default_source_user_agent(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay_seconds: default_retry_base_delay(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_span_days: default_chunk_span_days(),
            backfill_years: default_backfill_years(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_store_database_url(),
            max_connections: default_store_max_connections(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from the given file, or the default location when
    /// `None`, layered under `WEATHER_INGEST_*` environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // An explicitly given file must exist; the default location is optional
        match config_path {
            Some(path) => {
                builder = builder.add_source(
                    File::from(path)
                        .required(true)
                        .format(config::FileFormat::Toml),
                );
            }
            None => {
                let default_file =
                    Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"));
                builder = builder.add_source(
                    File::from(default_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // Environment overrides, e.g. WEATHER_INGEST_RETRY__MAX_ATTEMPTS=5
        builder = builder.add_source(
            Environment::with_prefix("WEATHER_INGEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: IngestConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weather-ingest").join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_regions()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.source.timeout_seconds == 0 || self.source.timeout_seconds > 300 {
            return Err(IngestError::config(
                "Source timeout must be between 1 and 300 seconds",
            )
            .into());
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > 10 {
            return Err(IngestError::config("Retry max attempts must be between 1 and 10").into());
        }

        if self.sync.chunk_span_days == 0 || self.sync.chunk_span_days > 366 {
            return Err(IngestError::config("Chunk span must be between 1 and 366 days").into());
        }

        if self.sync.backfill_years == 0 || self.sync.backfill_years > 80 {
            return Err(IngestError::config("Backfill horizon must be between 1 and 80 years").into());
        }

        if self.store.max_connections == 0 {
            return Err(IngestError::config("Store pool needs at least one connection").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(IngestError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(IngestError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.source.base_url.starts_with("http://") && !self.source.base_url.starts_with("https://") {
            return Err(IngestError::config(
                "Source base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        self.source.parse_timezone()?;

        if self.store.database_url.is_empty() {
            return Err(IngestError::config("Store database URL cannot be empty").into());
        }

        Ok(())
    }

    /// Validate the region table
    fn validate_regions(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(IngestError::config("At least one region must be configured").into());
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.id.trim().is_empty() {
                return Err(IngestError::config("Region id cannot be empty").into());
            }
            if !seen.insert(region.id.as_str()) {
                return Err(IngestError::config(format!("Duplicate region id '{}'", region.id)).into());
            }
            if !(-90.0..=90.0).contains(&region.latitude) {
                return Err(IngestError::config(format!(
                    "Region '{}' latitude {} is outside [-90, 90]",
                    region.id, region.latitude
                ))
                .into());
            }
            if !(-180.0..=180.0).contains(&region.longitude) {
                return Err(IngestError::config(format!(
                    "Region '{}' longitude {} is outside [-180, 180]",
                    region.id, region.longitude
                ))
                .into());
            }
        }

        Ok(())
    }
}
