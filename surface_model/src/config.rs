use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct TrainSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub dataset_root: PathBuf,
    pub checkpoint_path: PathBuf,
    pub training: TrainingSettings,
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingSettings {
    #[serde(default = "default_num_epochs")]
    pub num_epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

fn default_num_epochs() -> usize {
    5
}

fn default_batch_size() -> usize {
    4
}

fn default_learning_rate() -> f64 {
    1e-4
}

fn default_seed() -> u64 {
    42
}

fn default_num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl TrainingSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.num_epochs == 0 {
            return Err("training.num_epochs must be at least 1".into());
        }
        if self.batch_size == 0 {
            return Err("training.batch_size must be at least 1".into());
        }
        if !(self.learning_rate > 0.0) {
            return Err(format!(
                "training.learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }
}

/// Reads `configuration/training.yaml` from the working directory, then
/// `TRAIN_`-prefixed environment overrides (e.g. `TRAIN_TRAINING__NUM_EPOCHS=1`).
pub fn get_configuration() -> Result<TrainSettings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no working directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("training.yaml"),
        ))
        .add_source(
            config::Environment::with_prefix("TRAIN")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<TrainSettings>()?;
    if let Err(e) = settings.training.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(settings)
}
