use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub training: TrainingConfig,
    #[validate(nested)]
    pub realtime: RealtimeConfig,
    #[validate(nested)]
    pub comparator: ComparatorConfig,
    #[validate(nested)]
    pub signal: SignalConfig,
    #[validate(nested)]
    pub ramp: RampConfig,
    pub registry: RegistryConfig,
    pub data: DataConfig,
    pub output: OutputConfig,
}

/// Offline training run: data window, time-based split and forest parameters
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Samples strictly before the cutoff train the model, the rest test it
    pub cutoff: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub min_samples: usize,
    #[validate(range(min = 1))]
    pub min_test_samples: usize,
    #[validate(range(min = 1, max = 1000))]
    pub n_trees: usize,
    #[validate(range(min = 1, max = 64))]
    pub max_depth: u16,
    #[validate(range(min = 2))]
    pub min_samples_split: usize,
    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            window_start: midnight_utc(2020, 1, 1),
            window_end: midnight_utc(2025, 11, 1),
            cutoff: midnight_utc(2025, 6, 1),
            min_samples: 100,
            min_test_samples: 10,
            n_trees: 50,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

fn midnight_utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Observations older than this are not used for scoring
    #[validate(range(min = 1, max = 168))]
    pub freshness_hours: i64,
    #[validate(range(min = 1))]
    pub cadence_minutes: u64,
    /// Size of the top/bottom capacity-factor diagnostic tables
    pub top_n: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            freshness_hours: 24,
            cadence_minutes: 15,
            top_n: 5,
        }
    }
}

impl RealtimeConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_hours)
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_minutes.max(1) * 60)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ComparatorConfig {
    #[validate(url)]
    pub base_url: String,
    #[validate(range(min = 1, max = 300))]
    pub http_timeout_seconds: u64,
    /// Retries after the first attempt; 0 means a single attempt
    #[validate(range(max = 10))]
    pub max_retries: u32,
    /// Largest allowed gap between the target hour and an external forecast point
    #[validate(range(min = 0, max = 720))]
    pub match_window_minutes: i64,
    /// Publish times from this many hours before the target hour up to
    /// `max(generated_at, target_hour)` are requested from the feed
    #[validate(range(min = 1, max = 72))]
    pub lookback_hours: i64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.elexon.co.uk/bmrs/api/v1".to_string(),
            http_timeout_seconds: 10,
            max_retries: 2,
            match_window_minutes: 60,
            lookback_hours: 6,
        }
    }
}

impl ComparatorConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn match_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.match_window_minutes)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SignalConfig {
    #[validate(range(min = 0.0))]
    pub tolerance_mw: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self { tolerance_mw: 500.0 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct RampConfig {
    #[validate(range(min = 0.0))]
    pub warning_delta: f64,
    #[validate(range(min = 0.0))]
    pub critical_delta: f64,
    /// Observation history read each cycle. Alerts are only raised for
    /// observations newer than one cadence, so a pair alerts once.
    #[validate(range(min = 1))]
    pub lookback_minutes: i64,
    /// Direction change (degrees, after wraparound) that must be exceeded
    #[validate(range(min = 0.0, max = 180.0))]
    pub direction_shift_deg: f64,
    #[validate(range(min = 1))]
    pub direction_window_minutes: i64,
    /// Gust-to-mean-speed ratio that must be exceeded
    #[validate(range(min = 1.0))]
    pub turbulence_gust_factor: f64,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            warning_delta: 50.0,
            critical_delta: 150.0,
            lookback_minutes: 120,
            direction_shift_deg: 45.0,
            direction_window_minutes: 120,
            turbulence_gust_factor: 1.4,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory for persisted farm models; in-memory registry when unset
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding the JSON store snapshot
    pub dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where cycle reports are written as JSON; logging only when unset
    pub dir: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("WINDFC__").split("__"));
        let cfg: Config = figment.extract().context("failed to read configuration")?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let cfg: Config = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .context("failed to parse configuration")?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Field ranges plus the cross-field rules the derive cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate().context("invalid configuration")?;

        let t = &self.training;
        if t.window_end <= t.window_start {
            anyhow::bail!("training.window_end must be after training.window_start");
        }
        if t.cutoff <= t.window_start || t.cutoff >= t.window_end {
            anyhow::bail!("training.cutoff must fall inside the training window");
        }
        if self.ramp.critical_delta < self.ramp.warning_delta {
            anyhow::bail!("ramp.critical_delta must not be below ramp.warning_delta");
        }
        if self.ramp.lookback_minutes < self.ramp.direction_window_minutes {
            anyhow::bail!("ramp.lookback_minutes must cover ramp.direction_window_minutes");
        }
        Ok(())
    }
}
