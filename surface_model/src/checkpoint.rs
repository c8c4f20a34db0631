use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder, RecorderError},
    tensor::backend::Backend,
};
use std::path::Path;
use thiserror::Error;

use crate::classifier::{ClassifierConfig, SurfaceClassifier, SurfaceClassifierRecord};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("failed to create checkpoint directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read or write weights: {0}")]
    Recorder(#[from] RecorderError),
    #[error(
        "stored heads have {stored_materials} material / {stored_finishes} finish classes, \
         expected {expected_materials} / {expected_finishes}"
    )]
    HeadMismatch {
        stored_materials: usize,
        stored_finishes: usize,
        expected_materials: usize,
        expected_finishes: usize,
    },
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

pub fn save<B: Backend>(model: SurfaceClassifier<B>, path: &Path) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    model.save_file(path.to_path_buf(), &recorder())?;
    tracing::info!("Saved classifier weights to {}", path.display());

    Ok(())
}

/// Loads the full parameter state from `path` into a model built from
/// `config`. The head sizes stored in the file must match the config.
pub fn load<B: Backend>(
    config: &ClassifierConfig,
    path: &Path,
    device: &B::Device,
) -> Result<SurfaceClassifier<B>, CheckpointError> {
    let record: SurfaceClassifierRecord<B> = recorder().load(path.to_path_buf(), device)?;

    let stored_materials = record.material_head.output.weight.val().dims()[1];
    let stored_finishes = record.finish_head.output.weight.val().dims()[1];
    if stored_materials != config.num_materials || stored_finishes != config.num_finishes {
        return Err(CheckpointError::HeadMismatch {
            stored_materials,
            stored_finishes,
            expected_materials: config.num_materials,
            expected_finishes: config.num_finishes,
        });
    }

    let model = config.init::<B>(device).load_record(record);
    tracing::info!("Loaded classifier weights from {}", path.display());

    Ok(model)
}
