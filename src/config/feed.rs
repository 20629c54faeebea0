// src/config/feed.rs
use serde::{Deserialize, Serialize};

pub const DEFAULT_PERIODIC_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/2.5_hour.geojson";
pub const DEFAULT_ON_DEMAND_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/2.5_day.geojson";
pub const DEFAULT_TIME_ZONE: &str = "America/New_York";
pub const DEFAULT_RECENCY_WINDOW_MS: i64 = 60_000;

fn default_periodic_url() -> String {
    DEFAULT_PERIODIC_FEED_URL.to_string()
}
fn default_on_demand_url() -> String {
    DEFAULT_ON_DEMAND_FEED_URL.to_string()
}
fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}
fn default_recency_window_ms() -> i64 {
    DEFAULT_RECENCY_WINDOW_MS
}
fn default_http_timeout_secs() -> u64 {
    10
}

/// Inclusive longitude/latitude rectangle used by the geographic filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
}

impl BoundingBox {
    /// Rough outline of the contiguous United States.
    pub const CONTIGUOUS_US: BoundingBox = BoundingBox {
        min_longitude: -125.0,
        max_longitude: -65.0,
        min_latitude: 24.6,
        max_latitude: 50.0,
    };

    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.min_longitude <= longitude
            && longitude <= self.max_longitude
            && self.min_latitude <= latitude
            && latitude <= self.max_latitude
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::CONTIGUOUS_US
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Short look-back feed polled by the scheduler.
    #[serde(default = "default_periodic_url")]
    pub periodic_url: String,
    /// Long look-back feed used by the preview page.
    #[serde(default = "default_on_demand_url")]
    pub on_demand_url: String,
    #[serde(default)]
    pub bbox: BoundingBox,
    /// Periodic polls keep only events newer than `now - recency_window_ms`.
    #[serde(default = "default_recency_window_ms")]
    pub recency_window_ms: i64,
    /// IANA zone used when rendering event times.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            periodic_url: default_periodic_url(),
            on_demand_url: default_on_demand_url(),
            bbox: BoundingBox::default(),
            recency_window_ms: default_recency_window_ms(),
            time_zone: default_time_zone(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl FeedConfig {
    pub(crate) fn sanitize(&mut self) {
        if self.recency_window_ms < 0 {
            self.recency_window_ms = default_recency_window_ms();
        }
        let b = &mut self.bbox;
        if b.min_longitude > b.max_longitude {
            std::mem::swap(&mut b.min_longitude, &mut b.max_longitude);
        }
        if b.min_latitude > b.max_latitude {
            std::mem::swap(&mut b.min_latitude, &mut b.max_latitude);
        }
        if self.time_zone.trim().is_empty() {
            self.time_zone = default_time_zone();
        }
    }
}
