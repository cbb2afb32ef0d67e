//! Feature engineering for the per-farm wind power models
//!
//! Joins hourly-averaged weather with hourly dispatch per farm. The join is
//! a pure function; [`FeatureBuilder`] only loads its inputs from the stores.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{hour_start, BmUnitMap, GenerationReading, WeatherObservation, WindFarm};
use crate::error::{Exclusion, PipelineError, PipelineResult};
use crate::ml::FeatureVector;
use crate::repo::Stores;

/// Model input columns, in the order every regressor expects them
pub const FEATURE_NAMES: [&str; 6] = [
    "wind_speed_100m",
    "wind_direction_10m",
    "hour_of_day",
    "month",
    "day_of_week",
    "wind_gusts_10m",
];

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Build one model input row. Calendar features come from `at`; day of week is 0 = Monday.
pub fn wind_features(
    wind_speed_100m: f64,
    wind_direction_10m: f64,
    wind_gusts_10m: f64,
    at: DateTime<Utc>,
) -> Vec<f64> {
    vec![
        wind_speed_100m,
        wind_direction_10m,
        at.hour() as f64,
        at.month() as f64,
        at.weekday().num_days_from_monday() as f64,
        wind_gusts_10m,
    ]
}

pub fn wind_feature_vector(
    wind_speed_100m: f64,
    wind_direction_10m: f64,
    wind_gusts_10m: f64,
    at: DateTime<Utc>,
) -> FeatureVector {
    FeatureVector {
        features: wind_features(wind_speed_100m, wind_direction_10m, wind_gusts_10m, at),
        feature_names: feature_names(),
    }
}

/// One farm-hour of joined weather and generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingSample {
    pub farm_name: String,
    pub hour: DateTime<Utc>,
    pub wind_speed_100m: f64,
    pub wind_direction_10m: f64,
    pub wind_gusts_10m: f64,
    /// Summed across mapped units and clipped to farm capacity
    pub generation_mw: f64,
    pub observation_count: usize,
    /// Only samples with positive generation are fitted on
    pub usable: bool,
}

impl TrainingSample {
    pub fn features(&self) -> Vec<f64> {
        wind_features(
            self.wind_speed_100m,
            self.wind_direction_10m,
            self.wind_gusts_10m,
            self.hour,
        )
    }
}

/// Half-open range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

#[derive(Default)]
struct WeatherAcc {
    speed: f64,
    direction: f64,
    gusts: f64,
    count: usize,
}

#[derive(Default)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Join weather and generation into per-farm hourly samples.
///
/// Output is ordered by farm name, then hour. Farms missing from `mapping`
/// produce nothing. Only strictly positive dispatch readings are averaged.
pub fn build_training_samples(
    range: DateRange,
    farms: &[WindFarm],
    mapping: &BmUnitMap,
    weather: &[WeatherObservation],
    generation: &[GenerationReading],
) -> Vec<TrainingSample> {
    // (unit, hour) -> mean of positive readings
    let mut dispatch: HashMap<(&str, DateTime<Utc>), MeanAcc> = HashMap::new();
    for reading in generation {
        if !range.contains(reading.timestamp) || !(reading.generation_mw > 0.0) {
            continue;
        }
        let acc = dispatch
            .entry((reading.unit_id.as_str(), hour_start(reading.timestamp)))
            .or_default();
        acc.sum += reading.generation_mw;
        acc.count += 1;
    }

    let mut hourly_weather: BTreeMap<&str, BTreeMap<DateTime<Utc>, WeatherAcc>> = BTreeMap::new();
    for obs in weather {
        if !range.contains(obs.timestamp_utc) {
            continue;
        }
        let acc = hourly_weather
            .entry(obs.farm_name.as_str())
            .or_default()
            .entry(hour_start(obs.timestamp_utc))
            .or_default();
        acc.speed += obs.wind_speed_100m;
        acc.direction += obs.wind_direction_10m;
        acc.gusts += obs.wind_gusts_10m;
        acc.count += 1;
    }

    let mut ordered: Vec<&WindFarm> = farms.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));
    ordered.dedup_by(|a, b| a.name == b.name);

    let mut samples = Vec::new();
    for farm in ordered {
        let Some(units) = mapping.units_for(&farm.name) else {
            debug!(farm = %farm.name, "farm has no BM unit mapping, skipping");
            continue;
        };
        let Some(hours) = hourly_weather.get(farm.name.as_str()) else {
            continue;
        };

        for (hour, acc) in hours {
            let n = acc.count as f64;
            let raw: f64 = units
                .iter()
                .filter_map(|u| dispatch.get(&(u.unit_id.as_str(), *hour)))
                .map(MeanAcc::mean)
                .sum();
            let generation_mw = farm.clip(raw);

            samples.push(TrainingSample {
                farm_name: farm.name.clone(),
                hour: *hour,
                wind_speed_100m: acc.speed / n,
                wind_direction_10m: acc.direction / n,
                wind_gusts_10m: acc.gusts / n,
                generation_mw,
                observation_count: acc.count,
                usable: generation_mw > 0.0,
            });
        }
    }
    samples
}

/// Training samples plus the farms that could not contribute any
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub samples: Vec<TrainingSample>,
    pub exclusions: Vec<Exclusion>,
}

/// Loads builder inputs from the stores
pub struct FeatureBuilder {
    stores: Stores,
}

impl FeatureBuilder {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn load(&self, range: DateRange) -> PipelineResult<FeatureSet> {
        let farms = self.stores.farms.farms().await?;
        if farms.is_empty() {
            return Err(PipelineError::NoFarmsConfigured);
        }
        let mapping = self.stores.bm_units.mapping().await?;

        let mut weather = Vec::new();
        let mut exclusions = Vec::new();
        let mut unit_ids = Vec::new();

        for farm in &farms {
            let Some(units) = mapping.units_for(&farm.name) else {
                debug!(farm = %farm.name, "farm has no BM unit mapping, skipping");
                continue;
            };

            match self
                .stores
                .weather
                .observations(&farm.name, range.start, range.end)
                .await
            {
                Ok(rows) if rows.iter().any(|o| range.contains(o.timestamp_utc)) => {
                    weather.extend(rows);
                    unit_ids.extend(units.iter().map(|u| u.unit_id.clone()));
                }
                Ok(_) => {
                    let err = PipelineError::DataGap {
                        farm: farm.name.clone(),
                        detail: "no weather observations in training range".to_string(),
                    };
                    warn!(farm = %farm.name, error = %err, "excluding farm from training data");
                    exclusions.push(Exclusion::new(&farm.name, &err));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(farm = %farm.name, error = %e, "excluding farm from training data");
                    exclusions.push(Exclusion::new(&farm.name, &e));
                }
            }
        }

        unit_ids.sort();
        unit_ids.dedup();
        let generation = if unit_ids.is_empty() {
            Vec::new()
        } else {
            self.stores
                .generation
                .readings(&unit_ids, range.start, range.end)
                .await?
        };

        let samples = build_training_samples(range, &farms, &mapping, &weather, &generation);
        info!(
            samples = samples.len(),
            usable = samples.iter().filter(|s| s.usable).count(),
            excluded = exclusions.len(),
            "built training samples"
        );

        Ok(FeatureSet {
            samples,
            exclusions,
        })
    }
}
