//! In-memory store, loadable from a JSON snapshot directory.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::{BmUnitStore, FarmStore, GenerationStore, WeatherStore};
use crate::domain::{BmUnitMap, GenerationReading, WeatherObservation, WindFarm};
use crate::error::{PipelineError, PipelineResult};

pub const FARMS_FILE: &str = "farms.json";
pub const BM_UNITS_FILE: &str = "bm_units.json";
pub const WEATHER_FILE: &str = "weather.json";
pub const GENERATION_FILE: &str = "generation.json";

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    farms: Vec<WindFarm>,
    bm_units: BmUnitMap,
    weather: Vec<WeatherObservation>,
    generation: Vec<GenerationReading>,
}

impl InMemoryStore {
    pub fn new(
        farms: Vec<WindFarm>,
        bm_units: BmUnitMap,
        weather: Vec<WeatherObservation>,
        generation: Vec<GenerationReading>,
    ) -> Self {
        Self {
            farms,
            bm_units,
            weather,
            generation,
        }
    }

    /// Load a snapshot directory.
    ///
    /// `farms.json` must exist. The other files are optional and load as empty.
    pub async fn from_snapshot_dir(dir: impl AsRef<Path>) -> PipelineResult<Self> {
        let dir = dir.as_ref();
        let farms: Vec<WindFarm> = read_json(&dir.join(FARMS_FILE))
            .await?
            .ok_or_else(|| {
                PipelineError::Storage(format!("{} missing from {}", FARMS_FILE, dir.display()))
            })?;
        let bm_units: BmUnitMap = read_json(&dir.join(BM_UNITS_FILE)).await?.unwrap_or_default();
        let weather: Vec<WeatherObservation> =
            read_json(&dir.join(WEATHER_FILE)).await?.unwrap_or_default();
        let generation: Vec<GenerationReading> =
            read_json(&dir.join(GENERATION_FILE)).await?.unwrap_or_default();

        info!(
            dir = %dir.display(),
            farms = farms.len(),
            mapped_farms = bm_units.len(),
            observations = weather.len(),
            readings = generation.len(),
            "loaded store snapshot"
        );

        Ok(Self::new(farms, bm_units, weather, generation))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> PipelineResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "snapshot file not found, treating as empty");
            return Ok(None);
        }
        Err(e) => {
            return Err(PipelineError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| PipelineError::Storage(format!("failed to parse {}: {}", path.display(), e)))
}

#[async_trait]
impl FarmStore for InMemoryStore {
    async fn farms(&self) -> PipelineResult<Vec<WindFarm>> {
        Ok(self.farms.clone())
    }
}

#[async_trait]
impl WeatherStore for InMemoryStore {
    async fn observations(
        &self,
        farm_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PipelineResult<Vec<WeatherObservation>> {
        let mut rows: Vec<WeatherObservation> = self
            .weather
            .iter()
            .filter(|o| o.farm_name == farm_name && o.timestamp_utc >= from && o.timestamp_utc <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.timestamp_utc);
        Ok(rows)
    }
}

#[async_trait]
impl BmUnitStore for InMemoryStore {
    async fn mapping(&self) -> PipelineResult<BmUnitMap> {
        Ok(self.bm_units.clone())
    }
}

#[async_trait]
impl GenerationStore for InMemoryStore {
    async fn readings(
        &self,
        unit_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PipelineResult<Vec<GenerationReading>> {
        let wanted: HashSet<&str> = unit_ids.iter().map(String::as_str).collect();
        let mut rows: Vec<GenerationReading> = self
            .generation
            .iter()
            .filter(|r| {
                wanted.contains(r.unit_id.as_str()) && r.timestamp >= from && r.timestamp <= to
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.unit_id.cmp(&b.unit_id)));
        Ok(rows)
    }
}
