//! Machine Learning Module
//!
//! Per-farm wind power regression:
//! - Feature vectors shared by training and real-time scoring
//! - SmartCore random forest wrapper and a linear baseline
//! - Training pipeline with a time-based train/test split
//! - Model registry keyed by farm name

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod models;
pub mod registry;
pub mod smartcore;
pub mod training;

pub use models::{LinearRegressionModel, MLModel, Regressor};
pub use registry::{DirectoryRegistry, InMemoryRegistry, ModelRegistry, RegisteredModel};
pub use smartcore::SmartcoreRandomForest;
pub use training::{ModelTrainer, TrainedFarm, TrainingReport};

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelType {
    LinearRegression,
    RandomForest,
}

/// Held-out evaluation metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error (MW)
    pub rmse: f64, // Root Mean Square Error (MW)
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
    pub samples: usize,
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64, samples: usize) -> Self {
        Self {
            mae,
            rmse,
            mape,
            r2,
            samples,
        }
    }

    /// Compare predictions against targets.
    pub fn evaluate(predictions: &[f64], targets: &[f64]) -> Result<Self> {
        if predictions.len() != targets.len() {
            anyhow::bail!(
                "Prediction and target count mismatch: {} predictions, {} targets",
                predictions.len(),
                targets.len()
            );
        }

        if predictions.is_empty() {
            anyhow::bail!("No predictions to evaluate");
        }

        let n = predictions.len() as f64;

        let mae: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n;

        let mse: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / n;
        let rmse = mse.sqrt();

        // Zero-generation targets carry no percentage error
        let pct_errors: Vec<f64> = predictions
            .iter()
            .zip(targets.iter())
            .filter(|(_, t)| t.abs() > 1e-10)
            .map(|(p, t)| ((p - t) / t).abs() * 100.0)
            .collect();
        let mape = if pct_errors.is_empty() {
            0.0
        } else {
            pct_errors.iter().sum::<f64>() / pct_errors.len() as f64
        };

        let mean_target: f64 = targets.iter().sum::<f64>() / n;
        let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (t - p).powi(2))
            .sum();

        let r2 = if ss_tot.abs() < 1e-10 {
            0.0
        } else {
            1.0 - (ss_res / ss_tot)
        };

        Ok(Self::new(mae, rmse, mape, r2, predictions.len()))
    }
}

/// Feature Vector for ML models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub features: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, feature_names: Vec<String>) -> Result<Self> {
        if features.len() != feature_names.len() {
            anyhow::bail!(
                "Feature count mismatch: {} features, {} names",
                features.len(),
                feature_names.len()
            );
        }
        Ok(Self {
            features,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Rows the model was fitted on, bounded by the cutoff
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingWindow {
    pub first_hour: DateTime<Utc>,
    pub last_hour: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// The live model for one farm
#[derive(Debug, Serialize, Deserialize)]
pub struct FarmModel {
    pub farm_name: String,
    pub model_id: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub window: TrainingWindow,
    pub metrics: ValidationMetrics,
    pub regressor: Regressor,
}

impl FarmModel {
    /// Raw (unclipped) generation estimate in MW.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if features.feature_names != self.feature_names {
            anyhow::bail!(
                "Feature layout mismatch for {}: expected {:?}, got {:?}",
                self.farm_name,
                self.feature_names,
                features.feature_names
            );
        }
        self.regressor.predict(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_creation() {
        let features = vec![1.0, 2.0, 3.0];
        let names = vec!["f1".to_string(), "f2".to_string(), "f3".to_string()];

        let fv = FeatureVector::new(features, names).unwrap();
        assert_eq!(fv.len(), 3);
        assert!(!fv.is_empty());

        assert!(FeatureVector::new(vec![1.0], vec![]).is_err());
    }

    #[test]
    fn test_evaluate_metrics() {
        let predictions = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let targets = vec![1.1, 2.1, 2.9, 4.2, 4.8];

        let metrics = ValidationMetrics::evaluate(&predictions, &targets).unwrap();

        assert!(metrics.mae < 0.3);
        assert!(metrics.rmse < 0.4);
        assert!(metrics.r2 > 0.9);
        assert_eq!(metrics.samples, 5);
    }

    #[test]
    fn test_evaluate_exact_values() {
        let metrics = ValidationMetrics::evaluate(&[110.0, 90.0], &[100.0, 100.0]).unwrap();
        assert_eq!(metrics.mae, 10.0);
        assert_eq!(metrics.rmse, 10.0);
        assert!((metrics.mape - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_rejects_bad_input() {
        assert!(ValidationMetrics::evaluate(&[], &[]).is_err());
        assert!(ValidationMetrics::evaluate(&[1.0], &[1.0, 2.0]).is_err());
    }
}
