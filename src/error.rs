//! Error types and handling for the weather ingest application

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for the weather ingest application
#[derive(Error, Debug)]
pub enum IngestError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Observation store errors
    #[error("Store error: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            IngestError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file and WEATHER_INGEST_* variables.")
            }
            IngestError::Store { .. } => {
                "Unable to access the observation store. Please check the database URL and permissions."
                    .to_string()
            }
            IngestError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}
