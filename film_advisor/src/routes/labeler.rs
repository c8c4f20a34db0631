use crate::{
    routes::form::{FormData, FormError},
    server::SharedState,
    web::{self, Notice},
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use std::collections::BTreeMap;
use surface_model::{
    dataset::{check_image, class_dir_name, DatasetError},
    labels::UnknownLabel,
    Finish, Material,
};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum LabelerError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Label(#[from] UnknownLabel),
    #[error("no images were uploaded")]
    NoImages,
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

impl LabelerError {
    fn status(&self) -> StatusCode {
        match self {
            LabelerError::Form(_) | LabelerError::Label(_) | LabelerError::NoImages => {
                StatusCode::BAD_REQUEST
            }
            LabelerError::Dataset(
                DatasetError::InvalidFileName(_) | DatasetError::NotAnImage(_),
            ) => StatusCode::BAD_REQUEST,
            LabelerError::Dataset(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LabelerError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

async fn class_counts(state: &SharedState) -> Result<BTreeMap<String, usize>, DatasetError> {
    let dataset = state.dataset.clone();
    tokio::task::spawn_blocking(move || dataset.class_counts())
        .await
        .map_err(|e| DatasetError::Io(std::io::Error::other(e)))?
}

async fn render(state: &SharedState, notice: Option<&Notice>) -> Html<String> {
    match class_counts(state).await {
        Ok(counts) => web::labeler_page(Ok(&counts), notice),
        Err(e) => {
            tracing::error!("Failed to count labeled images: {}", e);
            web::labeler_page(Err(e.to_string()), notice)
        }
    }
}

#[instrument(skip(state))]
pub async fn stats(
    State(state): State<SharedState>,
) -> Result<Json<BTreeMap<String, usize>>, LabelerError> {
    state.metrics.record_request("/api/labeler/stats");
    Ok(Json(class_counts(&state).await?))
}

#[instrument(skip(state))]
pub async fn page(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request("/labeler");
    render(&state, None).await
}

/// Files every uploaded image into the `<Material>_<Finish>` folder.
///
/// Nothing is written unless every upload is a png or jpeg image.
async fn save_uploads(
    state: &SharedState,
    multipart: Multipart,
) -> Result<(usize, String), LabelerError> {
    let mut form = FormData::read(multipart).await?;
    let material: Material = form.text("material").parse()?;
    let finish: Finish = form.text("finish").parse()?;
    let uploads = form.take_files("images");
    if uploads.is_empty() {
        return Err(LabelerError::NoImages);
    }
    for upload in &uploads {
        check_image(&upload.filename, &upload.data)?;
    }

    let dataset = state.dataset.clone();
    let saved = tokio::task::spawn_blocking(move || {
        let timestamp = chrono::Local::now();
        uploads
            .iter()
            .map(|upload| {
                dataset.save_image(material, finish, &upload.filename, &upload.data, timestamp)
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| DatasetError::Io(std::io::Error::other(e)))??;

    let class = class_dir_name(material, finish);
    tracing::info!("Saved {} labeled image(s) to {}", saved.len(), class);
    Ok((saved.len(), class))
}

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> (StatusCode, Html<String>) {
    state.metrics.record_request("/labeler");

    let (status, notice) = match save_uploads(&state, multipart).await {
        Ok((count, class)) => (
            StatusCode::OK,
            Notice::Success(format!("Saved {} photo(s) to the '{}' folder!", count, class)),
        ),
        Err(e) => {
            tracing::warn!("Labeling failed: {}", e);
            (e.status(), Notice::Error(e.to_string()))
        }
    };

    (status, render(&state, Some(&notice)).await)
}
