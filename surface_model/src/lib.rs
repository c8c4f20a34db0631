mod backbone;

pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod labels;
pub mod prediction;
pub mod preprocess;
pub mod training;

pub use backbone::BackboneConfig;
pub use classifier::{ClassifierConfig, DualLogits, SurfaceClassifier};
pub use labels::{Finish, Material};
pub use prediction::Prediction;
