//! Regressor implementations behind a common trait.

use super::{FeatureVector, ModelType, SmartcoreRandomForest};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Trait for ML models
pub trait MLModel: Send + Sync {
    /// Predict generation (MW) from features
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Predict a batch of rows in one call
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    fn model_type(&self) -> ModelType;
}

/// Linear model with explicit coefficients.
///
/// Useful as a transparent baseline and for pinning model output in tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegressionModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressionModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    /// A model that ignores its inputs and always returns `value`.
    pub fn constant(n_features: usize, value: f64) -> Self {
        Self::new(vec![0.0; n_features], value)
    }

    fn predict_slice(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                self.coefficients.len(),
                row.len()
            );
        }

        Ok(row
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.intercept)
    }
}

impl MLModel for LinearRegressionModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        self.predict_slice(&features.features)
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_slice(row)).collect()
    }

    fn model_type(&self) -> ModelType {
        ModelType::LinearRegression
    }
}

/// The fitted regressor stored in a farm model
#[derive(Debug, Serialize, Deserialize)]
pub enum Regressor {
    RandomForest(SmartcoreRandomForest),
    Linear(LinearRegressionModel),
}

impl Regressor {
    fn inner(&self) -> &dyn MLModel {
        match self {
            Regressor::RandomForest(model) => model,
            Regressor::Linear(model) => model,
        }
    }
}

impl MLModel for Regressor {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        self.inner().predict(features)
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.inner().predict_rows(rows)
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }
}
