use crate::{
    catalog::{CatalogError, CatalogStore, Product},
    recommendation::query_recommendation,
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum CatalogRouteError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid product body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error("no product with id {0}")]
    ProductNotFound(String),
    #[error("product {0} has no servable image")]
    ImageNotFound(String),
}

impl IntoResponse for CatalogRouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            CatalogRouteError::Catalog(CatalogError::InvalidProduct(_))
            | CatalogRouteError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            CatalogRouteError::Catalog(CatalogError::DuplicateId(_)) => StatusCode::CONFLICT,
            CatalogRouteError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CatalogRouteError::ProductNotFound(_) | CatalogRouteError::ImageNotFound(_) => {
                StatusCode::NOT_FOUND
            }
        };
        if status.is_server_error() {
            tracing::error!("Catalog request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<SharedState>,
) -> Result<Json<Vec<Product>>, CatalogRouteError> {
    state.metrics.record_request("/api/catalog");
    Ok(Json(load_catalog(&state).await?))
}

#[instrument(skip_all)]
pub async fn add_product(
    State(state): State<SharedState>,
    body: Result<Json<Product>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), CatalogRouteError> {
    state.metrics.record_request("/api/catalog");
    let Json(product) = body?;

    append_product(&state, product.clone()).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Runs a catalog store operation on a blocking thread.
async fn with_store<T, F>(state: &SharedState, operation: F) -> Result<T, CatalogError>
where
    T: Send + 'static,
    F: FnOnce(&CatalogStore) -> Result<T, CatalogError> + Send + 'static,
{
    let catalog = state.catalog.clone();
    tokio::task::spawn_blocking(move || operation(&catalog))
        .await
        .map_err(|e| CatalogError::Io(std::io::Error::other(e)))?
}

pub async fn load_catalog(state: &SharedState) -> Result<Vec<Product>, CatalogError> {
    with_store(state, CatalogStore::load).await
}

/// Whether `image_url` resolves to an image the image route will serve.
pub async fn has_servable_image(state: &SharedState, image_url: String) -> bool {
    with_store(state, move |catalog| Ok(catalog.resolve_image(&image_url).is_some()))
        .await
        .unwrap_or(false)
}

/// Appends on a blocking thread; the store reads and rewrites the whole file.
pub async fn append_product(state: &SharedState, product: Product) -> Result<(), CatalogError> {
    with_store(state, move |catalog| catalog.append(product)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub material: String,
    pub finish: String,
}

#[instrument(skip(state))]
pub async fn recommendations(
    State(state): State<SharedState>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<Vec<Product>>, CatalogRouteError> {
    state.metrics.record_request("/api/recommendations");

    let catalog = load_catalog(&state).await?;
    let products = query_recommendation(&query.material, &query.finish, &catalog)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(products))
}

#[instrument(skip(state))]
pub async fn product_image(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, CatalogRouteError> {
    let product_id = id.clone();
    let image_path = with_store(&state, move |catalog| {
        Ok(catalog.find(&product_id)?.map(|product| {
            product
                .image_url
                .and_then(|image_url| catalog.resolve_image(&image_url))
        }))
    })
    .await?
    .ok_or_else(|| CatalogRouteError::ProductNotFound(id.clone()))?
    .ok_or_else(|| CatalogRouteError::ImageNotFound(id.clone()))?;

    let data = match tokio::fs::read(&image_path).await {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!("Image {} unavailable: {}", image_path.display(), e);
            return Err(CatalogRouteError::ImageNotFound(id));
        }
    };
    let content_type = image::ImageFormat::from_path(&image_path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}
