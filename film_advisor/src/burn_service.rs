use crate::model_service::{ModelService, ModelServiceError};
use burn::backend::{ndarray::NdArrayDevice, NdArray};
use image::DynamicImage;
use parking_lot::Mutex;
use std::path::Path;
use surface_model::{
    checkpoint,
    preprocess::{normalize_image, to_tensor, IMAGE_SIZE},
    ClassifierConfig, Prediction, SurfaceClassifier,
};

pub type InferenceBackend = NdArray;

pub struct BurnModelService {
    model: Mutex<SurfaceClassifier<InferenceBackend>>,
    device: NdArrayDevice,
}

impl BurnModelService {
    pub fn new(model: SurfaceClassifier<InferenceBackend>) -> Self {
        Self {
            model: Mutex::new(model),
            device: NdArrayDevice::Cpu,
        }
    }

    pub fn load(config: &ClassifierConfig, weights_path: &Path) -> Result<Self, ModelServiceError> {
        let device = NdArrayDevice::Cpu;
        let model = checkpoint::load::<InferenceBackend>(config, weights_path, &device)?;
        tracing::info!(
            "Classifier ready with {} parameters",
            burn::module::Module::num_params(&model)
        );

        Ok(Self::new(model))
    }
}

impl ModelService for BurnModelService {
    fn classify(&self, image: &DynamicImage) -> Result<Prediction, ModelServiceError> {
        let input = normalize_image(image, IMAGE_SIZE);
        let tensor = to_tensor::<InferenceBackend>(&input, &self.device);

        let logits = self.model.lock().forward(tensor);
        let prediction = Prediction::from_logits(logits)?;

        tracing::debug!(
            "Classified as {}/{} ({:.3}/{:.3})",
            prediction.material,
            prediction.finish,
            prediction.material_confidence,
            prediction.finish_confidence
        );
        Ok(prediction)
    }
}
