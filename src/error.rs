use serde::Serialize;
use thiserror::Error;

/// Error kinds raised by pipeline stages.
///
/// Per-farm kinds (`DataGap`, `InsufficientTrainingData`, `ModelNotFound`)
/// are collected as [`Exclusion`]s and never abort a run. `NoFarmsConfigured`,
/// `Storage` and `Config` are fatal and surface to the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("data gap for farm {farm}: {detail}")]
    DataGap { farm: String, detail: String },

    #[error(
        "insufficient training data for farm {farm}: {usable} usable samples, {test} in test window"
    )]
    InsufficientTrainingData {
        farm: String,
        usable: usize,
        test: usize,
    },

    #[error("no registered model for farm {0}")]
    ModelNotFound(String),

    #[error("external forecast feed unavailable: {0}")]
    ExternalFeedUnavailable(String),

    #[error("transient fetch error: {0}")]
    TransientFetch(String),

    #[error("no wind farms configured")]
    NoFarmsConfigured,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("model error for farm {farm}: {detail}")]
    Model { farm: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Short machine-readable kind, used in logs and cycle summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::DataGap { .. } => "DataGap",
            PipelineError::InsufficientTrainingData { .. } => "InsufficientTrainingData",
            PipelineError::ModelNotFound(_) => "ModelNotFound",
            PipelineError::ExternalFeedUnavailable(_) => "ExternalFeedUnavailable",
            PipelineError::TransientFetch(_) => "TransientFetch",
            PipelineError::NoFarmsConfigured => "NoFarmsConfigured",
            PipelineError::Storage(_) => "Storage",
            PipelineError::Model { .. } => "Model",
            PipelineError::Config(_) => "Config",
        }
    }

    /// Fatal errors abort the whole run instead of excluding a single farm.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::NoFarmsConfigured | PipelineError::Storage(_) | PipelineError::Config(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// A farm left out of a training run or real-time cycle, with the reason.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Exclusion {
    pub farm_name: String,
    pub kind: &'static str,
    pub reason: String,
}

impl Exclusion {
    pub fn new(farm_name: impl Into<String>, error: &PipelineError) -> Self {
        Self {
            farm_name: farm_name.into(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}
