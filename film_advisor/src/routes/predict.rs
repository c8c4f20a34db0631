use crate::{
    catalog::{CatalogError, Product},
    inference_service::InferenceError,
    recommendation::{is_exact_match, query_recommendation},
    routes::{
        catalog::load_catalog,
        form::{FormData, FormError, Upload},
    },
    server::SharedState,
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::{collections::BTreeMap, time::Instant};
use surface_model::{Finish, Material, Prediction};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::Form(_) | PredictError::Inference(_) => StatusCode::BAD_REQUEST,
            PredictError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status(), format!("Something went wrong: {}", self)).into_response()
    }
}

/// Classification of one upload together with the products it selects.
pub struct Analysis {
    pub prediction: Prediction,
    pub recommendations: Vec<Product>,
    pub exact_match: bool,
}

pub async fn analyze(state: &SharedState, upload: &Upload) -> Result<Analysis, PredictError> {
    let start = Instant::now();
    let prediction = state
        .inference
        .predict(upload.data.clone(), &upload.filename)
        .await?;
    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64, "predict");
    state.metrics.record_prediction(state.inference.mode_name());

    let material = prediction.material.as_str();
    let finish = prediction.finish.as_str();
    let catalog = load_catalog(state).await?;
    let recommendations: Vec<Product> = query_recommendation(material, finish, &catalog)
        .into_iter()
        .cloned()
        .collect();
    let exact_match = recommendations
        .first()
        .is_some_and(|product| is_exact_match(product, material, finish));

    tracing::info!(
        "{} classified as {}/{}, {} recommendation(s), exact match: {}",
        upload.filename,
        material,
        finish,
        recommendations.len(),
        exact_match
    );

    Ok(Analysis {
        prediction,
        recommendations,
        exact_match,
    })
}

#[derive(Serialize)]
pub struct PredictionBody {
    pub material: Material,
    pub finish: Finish,
    pub material_confidence: f32,
    pub finish_confidence: f32,
    pub scores: BTreeMap<&'static str, f32>,
}

impl From<&Prediction> for PredictionBody {
    fn from(prediction: &Prediction) -> Self {
        Self {
            material: prediction.material,
            finish: prediction.finish,
            material_confidence: prediction.material_confidence,
            finish_confidence: prediction.finish_confidence,
            scores: prediction.scores(),
        }
    }
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub prediction: PredictionBody,
    pub recommendations: Vec<Product>,
    pub exact_match: bool,
    pub mode: &'static str,
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, PredictError> {
    state.metrics.record_request("/api/predict");

    let mut form = FormData::read(multipart).await?;
    let upload = form.take_file("image")?;
    let analysis = analyze(&state, &upload).await?;

    Ok(Json(PredictResponse {
        prediction: PredictionBody::from(&analysis.prediction),
        recommendations: analysis.recommendations,
        exact_match: analysis.exact_match,
        mode: state.inference.mode_name(),
    }))
}
