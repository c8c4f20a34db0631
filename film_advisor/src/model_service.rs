use image::DynamicImage;
use surface_model::{checkpoint::CheckpointError, prediction::PredictionError, Prediction};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelServiceError {
    #[error("failed to load classifier weights: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("classification failed: {0}")]
    Prediction(#[from] PredictionError),
    #[error("classifier task failed: {0}")]
    Task(String),
}

/// A classifier that turns a decoded image into a material/finish prediction.
///
/// Implementations are called from a blocking thread.
pub trait ModelService: Send + Sync + 'static {
    fn classify(&self, image: &DynamicImage) -> Result<Prediction, ModelServiceError>;
}
