//! Data models for the weather ingest pipeline
//!
//! This module contains the core domain models organized by concern:
//! - Region: Fixed aggregation points with coordinates
//! - Observation: One stored day of weather for a region
//! - DateRange: Closed calendar-date intervals used as units of work

pub mod date_range;
pub mod observation;
pub mod region;

// Re-export all public types for convenient access
pub use date_range::DateRange;
pub use observation::Observation;
pub use region::{Region, default_regions};
