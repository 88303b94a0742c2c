//! Daily weather observation for a single region

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of weather for a region, keyed by (region, date)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Observation {
    /// Region identifier
    pub region: String,
    /// Calendar date of the observation
    pub date: NaiveDate,
    /// Daily mean temperature at 2m in Celsius
    pub temperature: Option<f64>,
    /// Daily precipitation sum in mm
    pub precipitation: Option<f64>,
}

impl Observation {
    #[must_use]
    pub fn new(
        region: impl Into<String>,
        date: NaiveDate,
        temperature: Option<f64>,
        precipitation: Option<f64>,
    ) -> Self {
        Self {
            region: region.into(),
            date,
            temperature,
            precipitation,
        }
    }
}
