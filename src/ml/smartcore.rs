//! SmartCore Random Forest Wrapper
//!
//! Wraps SmartCore's RandomForestRegressor as a per-farm power curve model.
//! The forest is seeded, so fitting the same rows twice yields the same model.

use super::models::MLModel;
use super::{FeatureVector, ModelType};
use crate::config::TrainingConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Serialize, Deserialize)]
pub struct SmartcoreRandomForest {
    model: Forest,
    pub n_features: usize,
    /// Training parameters for reproducibility
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl std::fmt::Debug for SmartcoreRandomForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartcoreRandomForest")
            .field("n_features", &self.n_features)
            .field("n_trees", &self.n_trees)
            .field("max_depth", &self.max_depth)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl SmartcoreRandomForest {
    /// Forest parameters for the configured training run
    pub fn parameters(cfg: &TrainingConfig) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: Some(cfg.max_depth),
            min_samples_leaf: cfg.min_samples_leaf,
            min_samples_split: cfg.min_samples_split,
            n_trees: cfg.n_trees,
            m: None,
            keep_samples: false, // Don't store training samples (saves memory)
            seed: cfg.seed,
        }
    }

    /// Train a new forest on row-major feature rows
    pub fn train(x: &[Vec<f64>], y: &[f64], params: RandomForestRegressorParameters) -> Result<Self> {
        if x.is_empty() || y.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }

        if x.len() != y.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                x.len(),
                y.len()
            );
        }

        let n_trees = params.n_trees;
        let max_depth = params.max_depth;
        let min_samples_split = params.min_samples_split;
        let min_samples_leaf = params.min_samples_leaf;
        let seed = params.seed;

        let n_features = x[0].len();
        let x_matrix = to_matrix(x, n_features)?;
        let y_vec = y.to_vec();

        let model = RandomForestRegressor::fit(&x_matrix, &y_vec, params)
            .map_err(|e| anyhow::anyhow!("RandomForest training failed: {:?}", e))?;

        Ok(Self {
            model,
            n_features,
            n_trees,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            seed,
        })
    }
}

fn to_matrix(rows: &[Vec<f64>], n_features: usize) -> Result<DenseMatrix<f64>> {
    let mut flat_data = Vec::with_capacity(rows.len() * n_features);
    for row in rows {
        if row.len() != n_features {
            anyhow::bail!(
                "All feature vectors must have length {}, got {}",
                n_features,
                row.len()
            );
        }
        flat_data.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(rows.len(), n_features, flat_data, false))
}

impl MLModel for SmartcoreRandomForest {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let predictions = self.predict_rows(std::slice::from_ref(&features.features))?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Model returned empty predictions"))
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = to_matrix(rows, self.n_features)?;
        self.model
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            n_trees: 10,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..TrainingConfig::default()
        }
    }

    // y = 2x1 + 3x2
    fn synthetic() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 7) as f64, (i % 5) as f64])
            .collect();
        let y = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1]).collect();
        (x, y)
    }

    #[test]
    fn test_parameters_follow_config() {
        let params = SmartcoreRandomForest::parameters(&TrainingConfig::default());
        assert_eq!(params.n_trees, 50);
        assert_eq!(params.max_depth, Some(10));
        assert_eq!(params.min_samples_split, 5);
        assert_eq!(params.seed, 42);
        assert!(!params.keep_samples);
    }

    #[test]
    fn test_train_and_predict() {
        let (x, y) = synthetic();
        let model =
            SmartcoreRandomForest::train(&x, &y, SmartcoreRandomForest::parameters(&small_config()))
                .unwrap();
        assert_eq!(model.n_features, 2);
        assert_eq!(model.n_trees, 10);

        let fv = FeatureVector::new(vec![3.0, 2.0], vec!["x1".into(), "x2".into()]).unwrap();
        let value = model.predict(&fv).unwrap();
        // 2*3 + 3*2 = 12
        assert!(value > 6.0 && value < 18.0, "got {value}");
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = synthetic();
        let params = || SmartcoreRandomForest::parameters(&small_config());
        let a = SmartcoreRandomForest::train(&x, &y, params()).unwrap();
        let b = SmartcoreRandomForest::train(&x, &y, params()).unwrap();
        assert_eq!(a.predict_rows(&x).unwrap(), b.predict_rows(&x).unwrap());
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let x = vec![vec![1.0, 2.0], vec![1.0]];
        let y = vec![1.0, 2.0];
        let result =
            SmartcoreRandomForest::train(&x, &y, SmartcoreRandomForest::parameters(&small_config()));
        assert!(result.is_err());
    }

    #[test]
    fn test_bincode_round_trip_predicts_identically() {
        let (x, y) = synthetic();
        let model =
            SmartcoreRandomForest::train(&x, &y, SmartcoreRandomForest::parameters(&small_config()))
                .unwrap();
        let bytes = bincode::serialize(&model).unwrap();
        let restored: SmartcoreRandomForest = bincode::deserialize(&bytes).unwrap();
        assert_eq!(model.predict_rows(&x).unwrap(), restored.predict_rows(&x).unwrap());
    }
}
