use burn::{
    config::Config,
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::path::Path;
use thiserror::Error;

use crate::checkpoint::{self, CheckpointError};
use crate::classifier::{ClassifierConfig, SurfaceClassifier};
use crate::dataset::{LabeledDataset, SurfaceBatcher};

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("no labeled images found")]
    EmptyDataset,
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub model: ClassifierConfig,
    pub optimizer: AdamConfig,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 4)]
    pub batch_size: usize,
    #[config(default = 1e-4)]
    pub learning_rate: f64,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1)]
    pub num_workers: usize,
    #[config(default = 224)]
    pub image_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(ClassifierConfig::default(), AdamConfig::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub num_samples: usize,
    /// Images the dataset scan left out because they could not be decoded.
    pub skipped_samples: usize,
    /// Mean loss of every epoch, in order.
    pub epoch_losses: Vec<f64>,
}

/// Fits the classifier on `dataset` and writes the weights to
/// `checkpoint_path`. Both heads are optimized jointly on the summed loss.
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    dataset: LabeledDataset,
    checkpoint_path: &Path,
    device: B::Device,
) -> Result<TrainingReport, TrainingError> {
    let num_samples = dataset.len();
    let skipped_samples = dataset.skipped();
    if skipped_samples > 0 {
        tracing::warn!("{} unreadable images were left out", skipped_samples);
    }
    if num_samples == 0 {
        return Err(TrainingError::EmptyDataset);
    }

    let batcher = SurfaceBatcher::<B>::new(device.clone(), config.image_size);
    let dataloader = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset);

    let mut model: SurfaceClassifier<B> = config.model.init(&device);
    let mut optimizer = config.optimizer.init::<B, SurfaceClassifier<B>>();

    tracing::info!(
        "Training {} parameters on {} images, {} epochs, batch size {}, learning rate {}",
        model.num_params(),
        num_samples,
        config.num_epochs,
        config.batch_size,
        config.learning_rate
    );

    let mut epoch_losses = Vec::with_capacity(config.num_epochs);
    for epoch in 1..=config.num_epochs {
        let mut running_loss = 0.0;
        let mut num_batches = 0;

        for batch in dataloader.iter() {
            if batch.materials.dims()[0] == 0 {
                continue;
            }
            let loss = model.forward_loss(batch.images, batch.materials, batch.finishes);
            running_loss += loss.clone().into_scalar().elem::<f64>();
            num_batches += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let mean_loss = running_loss / num_batches.max(1) as f64;
        tracing::info!(
            "Epoch [{}/{}], Loss: {:.4}",
            epoch,
            config.num_epochs,
            mean_loss
        );
        epoch_losses.push(mean_loss);
    }

    checkpoint::save(model.valid(), checkpoint_path)?;

    Ok(TrainingReport {
        num_samples,
        skipped_samples,
        epoch_losses,
    })
}
