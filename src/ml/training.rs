//! ML Model Training Pipeline
//!
//! Fits one random forest per farm with a time-based split: samples strictly
//! before the cutoff train the model, the rest evaluate it.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::Regressor;
use super::registry::ModelRegistry;
use super::smartcore::SmartcoreRandomForest;
use super::{FarmModel, MLModel, TrainingWindow, ValidationMetrics};
use crate::config::TrainingConfig;
use crate::error::{Exclusion, PipelineError, PipelineResult};
use crate::forecast::features::{feature_names, TrainingSample};

/// Summary of one farm's fit
#[derive(Debug, Clone, Serialize)]
pub struct TrainedFarm {
    pub farm_name: String,
    pub model_id: String,
    pub window: TrainingWindow,
    pub metrics: ValidationMetrics,
}

/// Outcome of a training run across all farms
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingReport {
    pub trained: Vec<TrainedFarm>,
    pub skipped: Vec<Exclusion>,
}

/// Model Trainer
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit a single farm. Blocking; call from a worker thread.
    pub fn fit_farm(&self, farm_name: &str, samples: &[TrainingSample]) -> PipelineResult<FarmModel> {
        let mut usable: Vec<&TrainingSample> = samples
            .iter()
            .filter(|s| s.usable && s.farm_name == farm_name)
            .collect();
        usable.sort_by_key(|s| s.hour);

        let cutoff = self.config.cutoff;
        let (train, test): (Vec<&TrainingSample>, Vec<&TrainingSample>) =
            usable.iter().copied().partition(|s| s.hour < cutoff);

        if usable.len() < self.config.min_samples
            || test.len() < self.config.min_test_samples
            || train.is_empty()
        {
            return Err(PipelineError::InsufficientTrainingData {
                farm: farm_name.to_string(),
                usable: usable.len(),
                test: test.len(),
            });
        }

        let x_train: Vec<Vec<f64>> = train.iter().map(|s| s.features()).collect();
        let y_train: Vec<f64> = train.iter().map(|s| s.generation_mw).collect();
        let x_test: Vec<Vec<f64>> = test.iter().map(|s| s.features()).collect();
        let y_test: Vec<f64> = test.iter().map(|s| s.generation_mw).collect();

        let model_err = |e: anyhow::Error| PipelineError::Model {
            farm: farm_name.to_string(),
            detail: e.to_string(),
        };

        let forest = SmartcoreRandomForest::train(
            &x_train,
            &y_train,
            SmartcoreRandomForest::parameters(&self.config),
        )
        .map_err(model_err)?;
        let predictions = forest.predict_rows(&x_test).map_err(model_err)?;
        let metrics = ValidationMetrics::evaluate(&predictions, &y_test).map_err(model_err)?;

        let window = TrainingWindow {
            first_hour: train[0].hour,
            last_hour: train[train.len() - 1].hour,
            cutoff,
            train_rows: train.len(),
            test_rows: test.len(),
        };

        Ok(FarmModel {
            farm_name: farm_name.to_string(),
            model_id: Uuid::new_v4().to_string(),
            trained_at: Utc::now(),
            feature_names: feature_names(),
            window,
            metrics,
            regressor: Regressor::RandomForest(forest),
        })
    }

    /// Fit every farm with samples and store the results.
    ///
    /// Farms are fitted concurrently on blocking workers. Per-farm failures
    /// are reported as skipped; a registry write failure aborts the run.
    pub async fn train_all(
        &self,
        samples: Vec<TrainingSample>,
        registry: &dyn ModelRegistry,
    ) -> PipelineResult<TrainingReport> {
        let mut by_farm: BTreeMap<String, Vec<TrainingSample>> = BTreeMap::new();
        for sample in samples {
            by_farm.entry(sample.farm_name.clone()).or_default().push(sample);
        }

        let mut report = TrainingReport::default();

        let jobs = by_farm.into_iter().map(|(farm_name, rows)| {
            let trainer = self.clone();
            async move {
                let name = farm_name.clone();
                let joined =
                    tokio::task::spawn_blocking(move || trainer.fit_farm(&farm_name, &rows)).await;
                let result = joined.unwrap_or_else(|e| {
                    Err(PipelineError::Model {
                        farm: name.clone(),
                        detail: format!("training task failed: {}", e),
                    })
                });
                (name, result)
            }
        });

        for (farm_name, result) in join_all(jobs).await {
            match result {
                Ok(model) => {
                    info!(
                        farm = %farm_name,
                        mae = model.metrics.mae,
                        rmse = model.metrics.rmse,
                        train_rows = model.window.train_rows,
                        test_rows = model.window.test_rows,
                        "trained farm model"
                    );
                    report.trained.push(TrainedFarm {
                        farm_name: model.farm_name.clone(),
                        model_id: model.model_id.clone(),
                        window: model.window.clone(),
                        metrics: model.metrics,
                    });
                    registry.put(model).await?;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(farm = %farm_name, error = %e, "skipping farm");
                    report.skipped.push(Exclusion::new(&farm_name, &e));
                }
            }
        }

        info!(
            trained = report.trained.len(),
            skipped = report.skipped.len(),
            "training run complete"
        );
        Ok(report)
    }
}
