use crate::{
    catalog::{CatalogError, Product, TargetCondition},
    routes::{
        catalog::{append_product, has_servable_image, load_catalog},
        form::FormData,
        predict::{analyze, Analysis, PredictError},
    },
    server::SharedState,
    web::{self, DebugInfo, DemoResult, Notice},
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
};
use std::collections::BTreeMap;
use tracing::instrument;

const NEW_PRODUCT_RISK_RESIDUE: &str = "Medium";
const NEW_PRODUCT_IMAGE_URL: &str = "images/placeholder.png";

async fn render_demo(
    state: &SharedState,
    upload: Option<(&[u8], &Analysis)>,
    notice: Option<&Notice>,
) -> Html<String> {
    let weights_path = state.weights_path.display().to_string();
    let catalog_path = state.catalog.path().display().to_string();
    let catalog_size = load_catalog(state).await.ok().map(|products| products.len());
    let info = DebugInfo {
        mode: state.inference.mode_name(),
        weights_path: &weights_path,
        catalog_path: &catalog_path,
        catalog_size,
    };

    let result = match upload {
        Some((image_data, analysis)) => {
            let best_image = analysis
                .recommendations
                .first()
                .and_then(|product| product.image_url.clone());
            let best_has_image = match best_image {
                Some(image_url) => has_servable_image(state, image_url).await,
                None => false,
            };
            Some(DemoResult {
                image_data,
                analysis,
                best_has_image,
            })
        }
        None => None,
    };

    web::demo_page(&info, result.as_ref(), notice)
}

#[instrument(skip(state))]
pub async fn index(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request("/");
    render_demo(&state, None, None).await
}

#[instrument(skip(state, multipart))]
pub async fn demo(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> (StatusCode, Html<String>) {
    state.metrics.record_request("/demo");

    let result = async {
        let mut form = FormData::read(multipart).await?;
        let upload = form.take_file("image")?;
        let analysis = analyze(&state, &upload).await?;
        Ok::<_, PredictError>((upload, analysis))
    }
    .await;

    match result {
        Ok((upload, analysis)) => (
            StatusCode::OK,
            render_demo(&state, Some((upload.data.as_ref(), &analysis)), None).await,
        ),
        Err(e) => {
            tracing::warn!("Demo analysis failed: {}", e);
            let notice = Notice::Error(e.to_string());
            (e.status(), render_demo(&state, None, Some(&notice)).await)
        }
    }
}

async fn render_admin(state: &SharedState, notice: Option<&Notice>) -> Html<String> {
    match load_catalog(state).await {
        Ok(products) => web::admin_page(Ok(products.as_slice()), notice),
        Err(e) => {
            tracing::error!("Failed to load catalog: {}", e);
            web::admin_page(Err(e.to_string()), notice)
        }
    }
}

#[instrument(skip(state))]
pub async fn admin(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request("/admin");
    render_admin(&state, None).await
}

/// Builds a catalog entry from the admin form fields.
pub fn product_from_form(form: &FormData) -> Product {
    let specs = ["base_material", "adhesive", "tack_force"]
        .into_iter()
        .map(|key| (key.to_string(), form.text(key).to_string()))
        .collect::<BTreeMap<_, _>>();

    Product {
        id: form.text("id").to_string(),
        name: form.text("name").to_string(),
        description: form.text("description").to_string(),
        specs,
        target_condition: TargetCondition {
            material_category: form.texts("material_category"),
            finish_type: form.texts("finish_type"),
            risk_residue: NEW_PRODUCT_RISK_RESIDUE.to_string(),
        },
        image_url: Some(NEW_PRODUCT_IMAGE_URL.to_string()),
        extra: serde_json::Map::new(),
    }
}

#[instrument(skip(state, multipart))]
pub async fn add_product(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> (StatusCode, Html<String>) {
    state.metrics.record_request("/admin");

    let form = match FormData::read(multipart).await {
        Ok(form) => form,
        Err(e) => {
            let notice = Notice::Error(e.to_string());
            return (
                StatusCode::BAD_REQUEST,
                render_admin(&state, Some(&notice)).await,
            );
        }
    };
    let product = product_from_form(&form);
    let id = product.id.clone();

    let (status, notice) = match append_product(&state, product).await {
        Ok(()) => (
            StatusCode::OK,
            Notice::Success(format!("Product {} saved successfully to database!", id)),
        ),
        Err(CatalogError::InvalidProduct(_)) => (
            StatusCode::BAD_REQUEST,
            Notice::Error("ID and Name are required!".to_string()),
        ),
        Err(e @ CatalogError::DuplicateId(_)) => {
            (StatusCode::CONFLICT, Notice::Error(e.to_string()))
        }
        Err(e) => {
            tracing::error!("Failed to save product {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Notice::Error(format!("Failed to save product: {}", e)),
            )
        }
    };

    (status, render_admin(&state, Some(&notice)).await)
}
