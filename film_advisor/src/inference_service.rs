use crate::{
    mock_heuristic,
    model_service::{ModelService, ModelServiceError},
};
use bytes::Bytes;
use std::{path::Path, sync::Arc, time::Duration};
use surface_model::{
    preprocess::{decode_image, PreprocessError},
    Prediction,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("uploaded file is not a readable image: {0}")]
    InvalidImage(#[from] PreprocessError),
}

/// How predictions are produced for the lifetime of the process.
pub enum ClassifierMode<M> {
    RealModel(Arc<M>),
    MockHeuristic,
}

impl<M> ClassifierMode<M> {
    /// Picks the mode once at startup from the weights file.
    ///
    /// Missing weights select the mock heuristic. Weights that fail to load
    /// are fatal when `strict_load` is set and select the mock otherwise.
    pub fn select<F>(
        weights_path: &Path,
        strict_load: bool,
        load: F,
    ) -> Result<Self, ModelServiceError>
    where
        F: FnOnce(&Path) -> Result<M, ModelServiceError>,
    {
        if !weights_path.exists() {
            tracing::warn!(
                "No weights found at {}, running with the mock heuristic",
                weights_path.display()
            );
            return Ok(Self::MockHeuristic);
        }

        match load(weights_path) {
            Ok(model) => Ok(Self::RealModel(Arc::new(model))),
            Err(e) if strict_load => {
                tracing::error!("Failed to load weights from {}: {}", weights_path.display(), e);
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load weights from {}, running with the mock heuristic: {}",
                    weights_path.display(),
                    e
                );
                Ok(Self::MockHeuristic)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RealModel(_) => "real",
            Self::MockHeuristic => "mock",
        }
    }
}

pub struct InferenceService<M: ModelService> {
    mode: ClassifierMode<M>,
    mock_latency: Duration,
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(mode: ClassifierMode<M>, mock_latency: Duration) -> Self {
        tracing::info!("Inference service running in {} mode", mode.name());
        Self { mode, mock_latency }
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.name()
    }

    /// Classifies an uploaded image. Only an undecodable upload is an error;
    /// a failing classifier is answered with the mock heuristic.
    pub async fn predict(
        &self,
        image_data: Bytes,
        filename: &str,
    ) -> Result<Prediction, InferenceError> {
        let image = decode_image(&image_data)?;

        let model = match &self.mode {
            ClassifierMode::RealModel(model) => Arc::clone(model),
            ClassifierMode::MockHeuristic => {
                if !self.mock_latency.is_zero() {
                    tokio::time::sleep(self.mock_latency).await;
                }
                return Ok(mock_heuristic::predict(filename));
            }
        };

        let result = tokio::task::spawn_blocking(move || model.classify(&image))
            .await
            .unwrap_or_else(|e| Err(ModelServiceError::Task(e.to_string())));

        match result {
            Ok(prediction) => Ok(prediction),
            Err(e) => {
                tracing::warn!(
                    "Classifier failed for {}, using the mock heuristic: {}",
                    filename,
                    e
                );
                Ok(mock_heuristic::predict(filename))
            }
        }
    }
}
