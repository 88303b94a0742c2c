//! Weather source
//!
//! A [`WeatherSource`] returns one observation per day of a requested date
//! range, or a classified [`FetchError`]. The classification drives the
//! retry policy in [`retry`].

pub mod open_meteo;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DateRange, Observation, Region};

pub use open_meteo::OpenMeteoArchiveClient;
pub use retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper, fetch_with_retry};

/// Failure of a single upstream fetch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No response within the configured wait
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure or retryable HTTP status
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Response received but it does not match the expected contract
    #[error("unexpected upstream response: {message}")]
    UpstreamFormat { message: String },
}

impl FetchError {
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::UpstreamFormat {
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport { .. })
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch daily observations for every date of `range`.
    async fn fetch(&self, region: &Region, range: DateRange) -> Result<Vec<Observation>, FetchError>;
}
