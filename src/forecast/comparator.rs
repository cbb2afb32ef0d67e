//! Compare our aggregate forecast with the grid operator's.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::external::ExternalForecastFeed;
use crate::config::ComparatorConfig;
use crate::domain::{AggregateForecast, ExternalForecastPoint, ForecastComparison};
use crate::error::{PipelineError, PipelineResult};

/// Keep only the latest publication of each start time, ordered by start time.
pub fn latest_publish_per_hour(points: &[ExternalForecastPoint]) -> Vec<ExternalForecastPoint> {
    let mut latest: BTreeMap<DateTime<Utc>, &ExternalForecastPoint> = BTreeMap::new();
    for point in points {
        match latest.get(&point.start_time) {
            Some(existing) if existing.publish_time >= point.publish_time => {}
            _ => {
                latest.insert(point.start_time, point);
            }
        }
    }
    latest.into_values().cloned().collect()
}

/// The point closest to `target` within `window`; earlier start wins a tie.
pub fn select_for_target(
    points: &[ExternalForecastPoint],
    target: DateTime<Utc>,
    window: Duration,
) -> Option<&ExternalForecastPoint> {
    points
        .iter()
        .map(|p| ((p.start_time - target).abs(), p))
        .filter(|(gap, _)| *gap <= window)
        .min_by(|(ga, a), (gb, b)| ga.cmp(gb).then_with(|| a.start_time.cmp(&b.start_time)))
        .map(|(_, p)| p)
}

/// `(delta_mw, delta_pct)`; the percentage is absent when external is zero.
pub fn compute_delta(ours_mw: f64, external_mw: f64) -> (f64, Option<f64>) {
    let delta = ours_mw - external_mw;
    let pct = if external_mw == 0.0 {
        None
    } else {
        Some(100.0 * delta / external_mw)
    };
    (delta, pct)
}

pub struct ForecastComparator {
    feed: Arc<dyn ExternalForecastFeed>,
    match_window: Duration,
    lookback: Duration,
}

impl ForecastComparator {
    pub fn new(feed: Arc<dyn ExternalForecastFeed>, cfg: &ComparatorConfig) -> Self {
        Self {
            feed,
            match_window: cfg.match_window(),
            lookback: Duration::hours(cfg.lookback_hours),
        }
    }

    /// Match the forecast's target hour against the feed.
    ///
    /// Every failure comes back as `ExternalFeedUnavailable`. The returned
    /// comparison has no signal yet.
    pub async fn compare(&self, forecast: &AggregateForecast) -> PipelineResult<ForecastComparison> {
        let target = forecast.target_hour;
        let points = self
            .feed
            .fetch(target - self.lookback, forecast.generated_at.max(target))
            .await
            .map_err(|e| match e {
                PipelineError::ExternalFeedUnavailable(_) => e,
                other => PipelineError::ExternalFeedUnavailable(other.to_string()),
            })?;

        if points.is_empty() {
            warn!(%target, "external feed returned no points");
            return Err(PipelineError::ExternalFeedUnavailable(
                "feed returned no forecast points".to_string(),
            ));
        }

        let deduped = latest_publish_per_hour(&points);
        let matched = select_for_target(&deduped, target, self.match_window).ok_or_else(|| {
            PipelineError::ExternalFeedUnavailable(format!(
                "no external point within {} minutes of {}",
                self.match_window.num_minutes(),
                target
            ))
        })?;

        let (delta_mw, delta_pct) = compute_delta(forecast.total_mw, matched.generation_mw);
        info!(
            %target,
            ours_mw = forecast.total_mw,
            external_mw = matched.generation_mw,
            delta_mw,
            "compared with external forecast"
        );

        Ok(ForecastComparison {
            timestamp: target,
            our_forecast_mw: forecast.total_mw,
            external_forecast_mw: matched.generation_mw,
            external_published_at: matched.publish_time,
            delta_mw,
            delta_pct,
            signal: None,
        })
    }
}
