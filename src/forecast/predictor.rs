//! Real-time predictor: score farms, clip, aggregate and rank.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::realtime::ScoringInput;
use crate::domain::{clip_to_capacity, AggregateForecast, FarmPrediction};
use crate::error::{Exclusion, PipelineError};

/// Score every input and aggregate the clipped outputs.
///
/// Capacity factor is taken over scored farms only.
pub fn predict(
    inputs: &[ScoringInput],
    generated_at: DateTime<Utc>,
    target_hour: DateTime<Utc>,
) -> (AggregateForecast, Vec<Exclusion>) {
    let mut farms = Vec::with_capacity(inputs.len());
    let mut exclusions = Vec::new();

    for input in inputs {
        let name = &input.farm.name;
        let capacity = input.farm.capacity_mw;
        if !(capacity > 0.0) {
            let err = PipelineError::DataGap {
                farm: name.clone(),
                detail: "capacity unknown".to_string(),
            };
            warn!(farm = %name, error = %err, "farm not scored");
            exclusions.push(Exclusion::new(name, &err));
            continue;
        }

        match input.model.predict(&input.features) {
            Ok(raw) => {
                let predicted_mw = clip_to_capacity(raw, capacity);
                farms.push(FarmPrediction {
                    farm_name: name.clone(),
                    predicted_mw,
                    capacity_mw: capacity,
                    capacity_factor: predicted_mw / capacity,
                });
            }
            Err(e) => {
                let err = PipelineError::Model {
                    farm: name.clone(),
                    detail: e.to_string(),
                };
                warn!(farm = %name, error = %err, "farm not scored");
                exclusions.push(Exclusion::new(name, &err));
            }
        }
    }

    // `sum` over no items yields -0.0
    let total_mw = farms.iter().fold(0.0, |acc, f| acc + f.predicted_mw);
    let total_capacity_mw = farms.iter().fold(0.0, |acc, f| acc + f.capacity_mw);
    let capacity_factor = if total_capacity_mw > 0.0 {
        total_mw / total_capacity_mw
    } else {
        0.0
    };

    let forecast = AggregateForecast {
        generated_at,
        target_hour,
        total_mw,
        total_capacity_mw,
        capacity_factor,
        farms,
    };
    (forecast, exclusions)
}

/// Diagnostic view of the strongest and weakest farms
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RankedFarms {
    /// Highest capacity factor first
    pub top: Vec<FarmPrediction>,
    /// Lowest capacity factor first
    pub bottom: Vec<FarmPrediction>,
}

/// Top-N and bottom-N farms by capacity factor, ties broken by name.
pub fn rank_by_capacity_factor(farms: &[FarmPrediction], n: usize) -> RankedFarms {
    let mut top = farms.to_vec();
    top.sort_by(|a, b| {
        b.capacity_factor
            .total_cmp(&a.capacity_factor)
            .then_with(|| a.farm_name.cmp(&b.farm_name))
    });
    let mut bottom = farms.to_vec();
    bottom.sort_by(|a, b| {
        a.capacity_factor
            .total_cmp(&b.capacity_factor)
            .then_with(|| a.farm_name.cmp(&b.farm_name))
    });
    top.truncate(n);
    bottom.truncate(n);
    RankedFarms { top, bottom }
}
