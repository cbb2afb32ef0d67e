//! Model registry: the live model per farm
//!
//! `put` overwrites any existing model for the farm.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{FarmModel, TrainingWindow, ValidationMetrics};
use crate::error::{PipelineError, PipelineResult};

const MODEL_EXTENSION: &str = "model";

/// Registry listing entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegisteredModel {
    pub farm_name: String,
    pub model_id: String,
    pub trained_at: DateTime<Utc>,
    pub window: TrainingWindow,
    pub metrics: ValidationMetrics,
}

impl From<&FarmModel> for RegisteredModel {
    fn from(model: &FarmModel) -> Self {
        Self {
            farm_name: model.farm_name.clone(),
            model_id: model.model_id.clone(),
            trained_at: model.trained_at,
            window: model.window.clone(),
            metrics: model.metrics,
        }
    }
}

#[async_trait]
pub trait ModelRegistry: Send + Sync {
    async fn put(&self, model: FarmModel) -> PipelineResult<()>;

    /// The live model for a farm, or `ModelNotFound`
    async fn get(&self, farm_name: &str) -> PipelineResult<Arc<FarmModel>>;

    /// Every registered farm, sorted by name
    async fn list(&self) -> PipelineResult<Vec<RegisteredModel>>;
}

/// Process-local registry
#[derive(Default)]
pub struct InMemoryRegistry {
    models: RwLock<HashMap<String, Arc<FarmModel>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryRegistry {
    async fn put(&self, model: FarmModel) -> PipelineResult<()> {
        let mut models = self.models.write().await;
        models.insert(model.farm_name.clone(), Arc::new(model));
        Ok(())
    }

    async fn get(&self, farm_name: &str) -> PipelineResult<Arc<FarmModel>> {
        let models = self.models.read().await;
        models
            .get(farm_name)
            .cloned()
            .ok_or_else(|| PipelineError::ModelNotFound(farm_name.to_string()))
    }

    async fn list(&self) -> PipelineResult<Vec<RegisteredModel>> {
        let models = self.models.read().await;
        let mut entries: Vec<RegisteredModel> =
            models.values().map(|m| RegisteredModel::from(m.as_ref())).collect();
        entries.sort_by(|a, b| a.farm_name.cmp(&b.farm_name));
        Ok(entries)
    }
}

/// One bincode file per farm, with a read-through cache
pub struct DirectoryRegistry {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<FarmModel>>>,
}

impl DirectoryRegistry {
    pub async fn open(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            PipelineError::Storage(format!("cannot create registry dir {}: {}", dir.display(), e))
        })?;
        info!(dir = %dir.display(), "opened model registry");
        Ok(Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, farm_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize(farm_name), MODEL_EXTENSION))
    }

    async fn read_model(path: &Path) -> PipelineResult<FarmModel> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Storage(format!("read {}: {}", path.display(), e)))?;
        bincode::deserialize(&bytes)
            .map_err(|e| PipelineError::Storage(format!("decode {}: {}", path.display(), e)))
    }
}

/// File-system safe stem for a farm name
fn sanitize(farm_name: &str) -> String {
    farm_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl ModelRegistry for DirectoryRegistry {
    async fn put(&self, model: FarmModel) -> PipelineResult<()> {
        let path = self.path_for(&model.farm_name);
        let bytes = bincode::serialize(&model)
            .map_err(|e| PipelineError::Storage(format!("encode {}: {}", model.farm_name, e)))?;

        // Write then rename so readers never see a partial file
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| PipelineError::Storage(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PipelineError::Storage(format!("rename {}: {}", path.display(), e)))?;

        debug!(farm = %model.farm_name, path = %path.display(), "persisted model");
        self.cache
            .write()
            .await
            .insert(model.farm_name.clone(), Arc::new(model));
        Ok(())
    }

    async fn get(&self, farm_name: &str) -> PipelineResult<Arc<FarmModel>> {
        if let Some(model) = self.cache.read().await.get(farm_name) {
            return Ok(model.clone());
        }

        let path = self.path_for(farm_name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PipelineError::ModelNotFound(farm_name.to_string()));
        }

        // A bad file only costs this farm its model
        let model = Self::read_model(&path).await.map_err(|e| PipelineError::Model {
            farm: farm_name.to_string(),
            detail: e.to_string(),
        })?;
        let model = Arc::new(model);
        self.cache
            .write()
            .await
            .insert(farm_name.to_string(), model.clone());
        Ok(model)
    }

    async fn list(&self) -> PipelineResult<Vec<RegisteredModel>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| PipelineError::Storage(format!("list {}: {}", self.dir.display(), e)))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| PipelineError::Storage(format!("list {}: {}", self.dir.display(), e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MODEL_EXTENSION) {
                continue;
            }
            match Self::read_model(&path).await {
                Ok(model) => entries.push(RegisteredModel::from(&model)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable model file"),
            }
        }

        entries.sort_by(|a, b| a.farm_name.cmp(&b.farm_name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::features::{feature_names, wind_feature_vector};
    use crate::ml::{LinearRegressionModel, Regressor};
    use chrono::TimeZone;

    fn model(farm: &str, value: f64) -> FarmModel {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        FarmModel {
            farm_name: farm.into(),
            model_id: format!("{}-{}", farm, value),
            trained_at: at,
            feature_names: feature_names(),
            window: TrainingWindow {
                first_hour: at,
                last_hour: at,
                cutoff: at,
                train_rows: 100,
                test_rows: 10,
            },
            metrics: ValidationMetrics::new(1.0, 2.0, 3.0, 0.9, 10),
            regressor: Regressor::Linear(LinearRegressionModel::constant(6, value)),
        }
    }

    #[tokio::test]
    async fn test_in_memory_put_overwrites() {
        let registry = InMemoryRegistry::new();
        registry.put(model("Walney", 100.0)).await.unwrap();
        registry.put(model("Walney", 200.0)).await.unwrap();
        registry.put(model("Beatrice", 50.0)).await.unwrap();

        let live = registry.get("Walney").await.unwrap();
        assert_eq!(live.model_id, "Walney-200");

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.farm_name)
            .collect();
        assert_eq!(names, vec!["Beatrice", "Walney"]);
    }

    #[tokio::test]
    async fn test_missing_model() {
        let registry = InMemoryRegistry::new();
        assert_eq!(
            registry.get("Rampion").await.unwrap_err(),
            PipelineError::ModelNotFound("Rampion".into())
        );
    }

    #[tokio::test]
    async fn test_directory_registry_reload_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        let features = wind_feature_vector(11.0, 240.0, 15.0, at);

        {
            let registry = DirectoryRegistry::open(dir.path()).await.unwrap();
            registry.put(model("Hornsea Two", 777.0)).await.unwrap();
        }

        let reopened = DirectoryRegistry::open(dir.path()).await.unwrap();
        let loaded = reopened.get("Hornsea Two").await.unwrap();
        assert_eq!(loaded.predict(&features).unwrap(), 777.0);
        assert!(dir.path().join("Hornsea_Two.model").exists());

        let listed = reopened.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].farm_name, "Hornsea Two");
        assert!(matches!(
            reopened.get("Walney").await,
            Err(PipelineError::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_model_file_only_affects_its_farm() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DirectoryRegistry::open(dir.path()).await.unwrap();
        registry.put(model("Walney", 300.0)).await.unwrap();
        tokio::fs::write(dir.path().join("Rampion.model"), b"garbage")
            .await
            .unwrap();

        let err = registry.get("Rampion").await.unwrap_err();
        assert!(matches!(&err, PipelineError::Model { farm, .. } if farm == "Rampion"));
        assert!(!err.is_fatal());

        let reopened = DirectoryRegistry::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("Walney").await.unwrap().model_id, "Walney-300");
        let listed = reopened.list().await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Dudgeon/East"), "Dudgeon_East");
        assert_eq!(sanitize("Moray-East_1"), "Moray-East_1");
    }
}
