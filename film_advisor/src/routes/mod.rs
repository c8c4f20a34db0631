pub mod catalog;
pub mod form;
pub mod health;
pub mod labeler;
pub mod metrics;
pub mod pages;
pub mod predict;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/demo", post(pages::demo))
        .route("/admin", get(pages::admin).post(pages::add_product))
        .route("/labeler", get(labeler::page).post(labeler::upload))
        .route("/products/{id}/image", get(catalog::product_image))
        .route("/api/predict", post(predict::predict))
        .route("/api/recommendations", get(catalog::recommendations))
        .route(
            "/api/catalog",
            get(catalog::list_products).post(catalog::add_product),
        )
        .route("/api/labeler/stats", get(labeler::stats))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}
