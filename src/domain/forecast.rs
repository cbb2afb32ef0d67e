use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directional trading signal derived from our forecast vs the grid operator's
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradingSignal {
    /// Forecasts agree within tolerance
    Hold,
    /// We expect materially more wind than the market: downward price pressure
    Short,
    /// We expect materially less wind than the market: upward price pressure
    Long,
}

impl std::fmt::Display for TradingSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hold => write!(f, "HOLD"),
            Self::Short => write!(f, "SHORT"),
            Self::Long => write!(f, "LONG"),
        }
    }
}

/// Ramp alert severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum RampSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for RampSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RampDirection {
    Rising,
    Falling,
}

/// What an alert was raised for. Serialized inline with a `kind` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RampEvent {
    /// Large period-over-period wind-speed swing
    WindRamp {
        /// Absolute change between the two observations
        wind_speed_delta: f64,
        /// Change relative to the earlier observation (%), absent when it was zero
        wind_speed_delta_pct: Option<f64>,
        direction: RampDirection,
    },
    /// Wind direction swung past the threshold within the direction window
    DirectionShift {
        /// Smallest angle between the two bearings, in `[0, 180]`
        direction_change_deg: f64,
    },
    /// Gusts far above the mean hub-height speed
    Turbulence { gust_factor: f64 },
}

impl RampEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WindRamp { .. } => "WIND_RAMP",
            Self::DirectionShift { .. } => "DIRECTION_SHIFT",
            Self::Turbulence { .. } => "TURBULENCE",
        }
    }
}

/// Weather event at one farm worth flagging to traders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RampAlert {
    pub farm_name: String,
    /// Timestamp of the observation that triggered the alert
    pub timestamp: DateTime<Utc>,
    pub severity: RampSeverity,
    #[serde(flatten)]
    pub event: RampEvent,
}

/// Scored output for a single farm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmPrediction {
    pub farm_name: String,
    /// Model output clipped to `[0, capacity_mw]`
    pub predicted_mw: f64,
    pub capacity_mw: f64,
    pub capacity_factor: f64,
}

/// GB-wide wind forecast aggregated over every farm that could be scored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateForecast {
    pub generated_at: DateTime<Utc>,
    /// Start of the hour the forecast applies to
    pub target_hour: DateTime<Utc>,
    pub total_mw: f64,
    /// Sum of capacities of scored farms only
    pub total_capacity_mw: f64,
    pub capacity_factor: f64,
    pub farms: Vec<FarmPrediction>,
}

impl AggregateForecast {
    pub fn farms_scored(&self) -> usize {
        self.farms.len()
    }
}

/// One published point of the grid operator's wind generation forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalForecastPoint {
    pub publish_time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub generation_mw: f64,
}

/// Our forecast vs the external forecast for one hour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastComparison {
    pub timestamp: DateTime<Utc>,
    pub our_forecast_mw: f64,
    pub external_forecast_mw: f64,
    /// When the matched external value was published
    pub external_published_at: DateTime<Utc>,
    pub delta_mw: f64,
    /// `delta_mw / external_forecast_mw` in percent, absent when external is zero
    pub delta_pct: Option<f64>,
    pub signal: Option<TradingSignal>,
}
