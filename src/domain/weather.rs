use chrono::{DateTime, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// One weather observation at a farm site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherObservation {
    pub farm_name: String,
    pub timestamp_utc: DateTime<Utc>,
    /// Wind speed at hub height (100m)
    pub wind_speed_100m: f64,
    /// Wind direction at 10m (degrees)
    pub wind_direction_10m: f64,
    /// Gust speed at 10m
    pub wind_gusts_10m: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
}

/// Dispatch level of a single BM unit.
///
/// Readings may be sub-hourly (one per settlement period); the feature
/// builder averages them within each hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationReading {
    pub unit_id: String,
    pub timestamp: DateTime<Utc>,
    pub generation_mw: f64,
}

/// Truncate a timestamp to the start of its UTC hour.
pub fn hour_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(chrono::Duration::hours(1)).unwrap_or(ts)
}
