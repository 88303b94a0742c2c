//! Region model for fixed geographic aggregation points

use serde::{Deserialize, Serialize};

/// A named aggregation point used as the fetch and storage key
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Region {
    /// Stable identifier, also the store key
    pub id: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Region {
    /// Create a new region
    #[must_use]
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
        }
    }

    /// Format region as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// The eight Korean aggregation regions, each represented by its city hall.
#[must_use]
pub fn default_regions() -> Vec<Region> {
    vec![
        Region::new("seoul", 37.5665, 126.9780),
        Region::new("gyeonggi", 37.2636, 127.0286), // Suwon
        Region::new("incheon", 37.4563, 126.7052),
        Region::new("gangwon", 37.8813, 127.7298), // Chuncheon
        Region::new("chungcheong", 36.3504, 127.3845), // Daejeon
        Region::new("gyeongsang", 35.8722, 128.6014), // Daegu
        Region::new("jeolla", 35.1595, 126.8526), // Gwangju
        Region::new("jeju", 33.4996, 126.5312),
    ]
}
