use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{hour_start, AggregateForecast, ForecastComparison, RampAlert, WindFarm};
use crate::error::{Exclusion, PipelineError, PipelineResult};
use crate::forecast::{
    predict, rank_by_capacity_factor, DateRange, ExternalForecastFeed, FeatureBuilder,
    ForecastComparator, RampDetector, RankedFarms, RealtimeFeatureFetcher, SignalClassifier,
};
use crate::ml::{ModelRegistry, ModelTrainer, TrainingReport};
use crate::repo::Stores;

/// Whether the external comparison could be made this cycle
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedStatus {
    Matched,
    Unavailable { reason: String },
}

/// Everything one real-time cycle produced
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub generated_at: DateTime<Utc>,
    pub forecast: AggregateForecast,
    pub ranked: RankedFarms,
    pub comparison: Option<ForecastComparison>,
    pub external_feed: FeedStatus,
    pub ramp_alerts: Vec<RampAlert>,
    pub exclusions: Vec<Exclusion>,
}

pub struct ForecastController {
    cfg: Config,
    stores: Stores,
    registry: Arc<dyn ModelRegistry>,
    trainer: ModelTrainer,
    fetcher: RealtimeFeatureFetcher,
    comparator: ForecastComparator,
    signal: SignalClassifier,
    ramp: RampDetector,
}

impl ForecastController {
    pub fn new(
        cfg: Config,
        stores: Stores,
        registry: Arc<dyn ModelRegistry>,
        feed: Arc<dyn ExternalForecastFeed>,
    ) -> Self {
        let fetcher = RealtimeFeatureFetcher::new(
            stores.weather.clone(),
            registry.clone(),
            cfg.realtime.freshness(),
        );
        Self {
            trainer: ModelTrainer::new(cfg.training.clone()),
            comparator: ForecastComparator::new(feed, &cfg.comparator),
            signal: SignalClassifier::from_config(&cfg.signal),
            ramp: RampDetector::new(&cfg.ramp),
            fetcher,
            registry,
            stores,
            cfg,
        }
    }

    pub fn registry(&self) -> &Arc<dyn ModelRegistry> {
        &self.registry
    }

    /// Rebuild training data for the configured window and refit every farm.
    pub async fn train(&self) -> PipelineResult<TrainingReport> {
        let t = &self.cfg.training;
        let range = DateRange::new(t.window_start, t.window_end);
        info!(start = %range.start, end = %range.end, cutoff = %t.cutoff, "starting training run");

        let set = FeatureBuilder::new(self.stores.clone()).load(range).await?;
        let mut report = self
            .trainer
            .train_all(set.samples, self.registry.as_ref())
            .await?;

        let mut skipped = set.exclusions;
        skipped.append(&mut report.skipped);
        skipped.sort_by(|a, b| a.farm_name.cmp(&b.farm_name));
        report.skipped = skipped;
        Ok(report)
    }

    /// Score every farm for the hour containing `now`.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> PipelineResult<CycleReport> {
        let farms = self.stores.farms.farms().await?;
        if farms.is_empty() {
            return Err(PipelineError::NoFarmsConfigured);
        }
        let target_hour = hour_start(now);

        let (inputs, mut exclusions) = self.fetcher.fetch(&farms, now).await?;
        let (forecast, scoring_exclusions) = predict(&inputs, now, target_hour);
        exclusions.extend(scoring_exclusions);
        let ranked = rank_by_capacity_factor(&forecast.farms, self.cfg.realtime.top_n);

        let (comparison, external_feed) = self.compare(&forecast).await;
        let ramp_alerts = self.scan_ramps(&farms, now).await?;

        let report = CycleReport {
            generated_at: now,
            forecast,
            ranked,
            comparison,
            external_feed,
            ramp_alerts,
            exclusions,
        };
        log_report(&report);
        Ok(report)
    }

    /// Compare against the external feed, unless nothing was scored.
    async fn compare(
        &self,
        forecast: &AggregateForecast,
    ) -> (Option<ForecastComparison>, FeedStatus) {
        if forecast.farms.is_empty() {
            warn!("no farms scored, external comparison skipped");
            return (
                None,
                FeedStatus::Unavailable {
                    reason: "no farms scored".to_string(),
                },
            );
        }

        match self.comparator.compare(forecast).await {
            Ok(mut comparison) => {
                self.signal.apply(&mut comparison);
                (Some(comparison), FeedStatus::Matched)
            }
            Err(e) => {
                warn!(error = %e, "external comparison skipped, forecast-only output");
                (
                    None,
                    FeedStatus::Unavailable {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Scan the ramp lookback and keep alerts raised since the previous cycle.
    ///
    /// Earlier observations are read only to pair with newer ones.
    async fn scan_ramps(
        &self,
        farms: &[WindFarm],
        now: DateTime<Utc>,
    ) -> PipelineResult<Vec<RampAlert>> {
        let lookback = Duration::minutes(self.cfg.ramp.lookback_minutes);
        let mut recent = Vec::new();
        for farm in farms {
            match self
                .stores
                .weather
                .observations(&farm.name, now - lookback, now)
                .await
            {
                Ok(rows) => recent.extend(rows),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(farm = %farm.name, error = %e, "ramp scan skipped farm"),
            }
        }

        let since = now - Duration::minutes(self.cfg.realtime.cadence_minutes.max(1) as i64);
        let mut alerts = self.ramp.detect(&recent);
        alerts.retain(|a| a.timestamp > since);
        Ok(alerts)
    }

    /// Run cycles on the configured cadence until `shutdown` resolves.
    ///
    /// A failed cycle is logged and the loop carries on.
    pub async fn run<F>(&self, shutdown: F) -> PipelineResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.cfg.realtime.cadence());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("forecast loop stopping");
                    return Ok(());
                }
                _ = interval.tick() => {
                    match self.run_cycle(Utc::now()).await {
                        Ok(report) => {
                            if let Err(e) = self.persist_report(&report).await {
                                warn!(error = %e, "failed to write cycle report");
                            }
                        }
                        Err(e) => warn!(error = %e, kind = e.kind(), "cycle failed"),
                    }
                }
            }
        }
    }

    /// Write the report as JSON under `output.dir`, if configured.
    pub async fn persist_report(&self, report: &CycleReport) -> PipelineResult<Option<PathBuf>> {
        let Some(dir) = self.cfg.output.dir.as_ref() else {
            return Ok(None);
        };
        let dir = PathBuf::from(dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::Storage(format!("create {}: {}", dir.display(), e)))?;

        let path = dir.join(format!(
            "cycle-{}.json",
            report.generated_at.format("%Y%m%dT%H%M%SZ")
        ));
        let body = serde_json::to_vec_pretty(report)
            .map_err(|e| PipelineError::Storage(format!("encode cycle report: {}", e)))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| PipelineError::Storage(format!("write {}: {}", path.display(), e)))?;
        Ok(Some(path))
    }
}

fn log_report(report: &CycleReport) {
    let signal = report
        .comparison
        .as_ref()
        .and_then(|c| c.signal)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "NONE".to_string());
    info!(
        target_hour = %report.forecast.target_hour,
        total_mw = report.forecast.total_mw,
        capacity_factor = report.forecast.capacity_factor,
        farms_scored = report.forecast.farms_scored(),
        excluded = report.exclusions.len(),
        delta_mw = report.comparison.as_ref().map(|c| c.delta_mw),
        %signal,
        ramp_alerts = report.ramp_alerts.len(),
        "forecast cycle complete"
    );
}
