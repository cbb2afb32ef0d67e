//! Read-only access to the farm store.
//!
//! Every query range is inclusive on both ends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{BmUnitMap, GenerationReading, WeatherObservation, WindFarm};
use crate::error::PipelineResult;

pub mod memory;

pub use memory::InMemoryStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FarmStore: Send + Sync {
    /// Every farm with a known location and capacity
    async fn farms(&self) -> PipelineResult<Vec<WindFarm>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherStore: Send + Sync {
    async fn observations(
        &self,
        farm_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PipelineResult<Vec<WeatherObservation>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BmUnitStore: Send + Sync {
    /// Farm name to BM unit mapping
    async fn mapping(&self) -> PipelineResult<BmUnitMap>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Physical notification readings for the given units
    async fn readings(
        &self,
        unit_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PipelineResult<Vec<GenerationReading>>;
}

/// Handles to every store a pipeline stage reads from.
#[derive(Clone)]
pub struct Stores {
    pub farms: Arc<dyn FarmStore>,
    pub weather: Arc<dyn WeatherStore>,
    pub bm_units: Arc<dyn BmUnitStore>,
    pub generation: Arc<dyn GenerationStore>,
}

impl Stores {
    /// Serve every store from one in-memory snapshot.
    pub fn from_memory(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            farms: store.clone(),
            weather: store.clone(),
            bm_units: store.clone(),
            generation: store,
        }
    }
}
