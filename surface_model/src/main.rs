use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    optim::AdamConfig,
};
use surface_model::{
    config,
    dataset::{DatasetLayout, LabeledDataset},
    training::{train, TrainingConfig},
    ClassifierConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::get_configuration()?;
    let log_level = &format!("{},burn=warn", settings.log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_level(true))
        .init();

    let layout = DatasetLayout::new(&settings.dataset_root);
    let dataset = LabeledDataset::from_layout(&layout)?;

    let training = &settings.training;
    let config = TrainingConfig::new(ClassifierConfig::default(), AdamConfig::new())
        .with_num_epochs(training.num_epochs)
        .with_batch_size(training.batch_size)
        .with_learning_rate(training.learning_rate)
        .with_seed(training.seed)
        .with_num_workers(training.num_workers);

    let report = train::<Autodiff<NdArray>>(
        &config,
        dataset,
        &settings.checkpoint_path,
        NdArrayDevice::Cpu,
    )?;

    tracing::info!(
        "Finished training on {} images, final loss {:.4}",
        report.num_samples,
        report.epoch_losses.last().copied().unwrap_or_default()
    );

    Ok(())
}
