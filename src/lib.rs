//! Weather ingest - incremental daily weather ingestion per region
//!
//! This library resumes each region from its latest stored date, splits the
//! missing history into bounded windows, fetches each window with retries
//! and commits it before moving on.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod planner;
pub mod store;
pub mod sync;
pub mod weather;

// Re-export core types for public API
pub use config::IngestConfig;
pub use error::IngestError;
pub use models::{DateRange, Observation, Region};
pub use store::{MemoryStore, ObservationStore, SqliteStore, StoreError};
pub use sync::{FailurePolicy, RegionOutcome, RegionStatus, SyncController, SyncFailure, SyncReport, SyncSettings};
pub use weather::{FetchError, OpenMeteoArchiveClient, RetryError, RetryPolicy, Sleeper, TokioSleeper, WeatherSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, IngestError>;
