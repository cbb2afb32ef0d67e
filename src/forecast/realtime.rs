//! Real-time feature fetching: latest fresh observation per farm.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::features::wind_feature_vector;
use crate::domain::{WeatherObservation, WindFarm};
use crate::error::{Exclusion, PipelineError, PipelineResult};
use crate::ml::{FarmModel, FeatureVector, ModelRegistry};
use crate::repo::WeatherStore;

/// A farm ready to be scored
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub farm: WindFarm,
    pub model: Arc<FarmModel>,
    pub features: FeatureVector,
    pub observed_at: DateTime<Utc>,
}

pub struct RealtimeFeatureFetcher {
    weather: Arc<dyn WeatherStore>,
    registry: Arc<dyn ModelRegistry>,
    freshness: Duration,
}

impl RealtimeFeatureFetcher {
    pub fn new(
        weather: Arc<dyn WeatherStore>,
        registry: Arc<dyn ModelRegistry>,
        freshness: Duration,
    ) -> Self {
        Self {
            weather,
            registry,
            freshness,
        }
    }

    /// Build scoring inputs for every farm that has a model and a fresh observation.
    ///
    /// Calendar features come from `now`, not from the observation time.
    pub async fn fetch(
        &self,
        farms: &[WindFarm],
        now: DateTime<Utc>,
    ) -> PipelineResult<(Vec<ScoringInput>, Vec<Exclusion>)> {
        let mut inputs = Vec::new();
        let mut exclusions = Vec::new();

        for farm in farms {
            match self.fetch_one(farm, now).await {
                Ok(input) => inputs.push(input),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(farm = %farm.name, error = %e, "farm not scored this cycle");
                    exclusions.push(Exclusion::new(&farm.name, &e));
                }
            }
        }

        Ok((inputs, exclusions))
    }

    async fn fetch_one(&self, farm: &WindFarm, now: DateTime<Utc>) -> PipelineResult<ScoringInput> {
        let model = self.registry.get(&farm.name).await?;

        let from = now - self.freshness;
        let observations = self.weather.observations(&farm.name, from, now).await?;
        let latest = latest_observation(&observations, from, now).ok_or_else(|| PipelineError::DataGap {
            farm: farm.name.clone(),
            detail: format!(
                "no weather observation in the last {} hours",
                self.freshness.num_hours()
            ),
        })?;

        Ok(ScoringInput {
            farm: farm.clone(),
            model,
            features: wind_feature_vector(
                latest.wind_speed_100m,
                latest.wind_direction_10m,
                latest.wind_gusts_10m,
                now,
            ),
            observed_at: latest.timestamp_utc,
        })
    }
}

/// Most recent observation inside `[from, to]`; the last one wins on equal timestamps.
fn latest_observation(
    observations: &[WeatherObservation],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Option<&WeatherObservation> {
    observations
        .iter()
        .filter(|o| o.timestamp_utc >= from && o.timestamp_utc <= to)
        .max_by_key(|o| o.timestamp_utc)
}
