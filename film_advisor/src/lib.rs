mod burn_service;
mod inference_service;
mod mock_heuristic;
mod model_service;
mod routes;
mod telemetry;
mod web;

pub mod app;
pub mod catalog;
pub mod config;
pub mod recommendation;
pub mod server;

pub use app::start_app;
pub use burn_service::BurnModelService;
pub use inference_service::{ClassifierMode, InferenceError, InferenceService};
pub use model_service::{ModelService, ModelServiceError};
