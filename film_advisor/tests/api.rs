//! End-to-end tests against a server bound to an ephemeral port.

use burn::backend::{ndarray::NdArrayDevice, NdArray};
use film_advisor::{
    config::{CatalogConfig, Config, DatasetConfig, LogLevel, ModelConfig, ServerConfig},
    server::HttpServer,
    BurnModelService, ClassifierMode, InferenceService,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::{io::Cursor, net::SocketAddr, path::Path, sync::Arc, time::Duration};
use surface_model::{checkpoint, BackboneConfig, ClassifierConfig};
use tempfile::TempDir;
use tokio::sync::broadcast;

const CATALOG: &str = r#"[
  {
    "id": "PF-101",
    "name": "Ultra Clear Mirror Guard",
    "description": "Low tack film for mirror finished stainless.",
    "specs": {"base_material": "PET", "adhesive": "Silicone", "tack_force": "3 gf/25mm"},
    "target_condition": {"material_category": ["Metal"], "finish_type": ["Mirror"], "risk_residue": "Low"},
    "image_url": "images/does-not-exist.png"
  },
  {
    "id": "PF-305",
    "name": "Rough Surface Film",
    "description": "High tack film for sandblasted metal.",
    "specs": {"base_material": "PE", "adhesive": "Rubber", "tack_force": "150 gf/25mm"},
    "target_condition": {"material_category": ["metal"], "finish_type": ["ROUGH"], "risk_residue": "Medium"}
  },
  {
    "id": "PF-102",
    "name": "Mirror Guard Plus",
    "description": "Thicker mirror guard.",
    "specs": {},
    "target_condition": {"material_category": ["Metal"], "finish_type": ["Hairline", "Mirror"], "risk_residue": "Low"}
  }
]"#;

struct TestApp {
    addr: SocketAddr,
    dir: TempDir,
    client: reqwest::Client,
    _shutdown: broadcast::Sender<()>,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn catalog_path(&self) -> std::path::PathBuf {
        self.dir.path().join("database.json")
    }

    async fn get_json(&self, path: &str) -> Value {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn post_form(&self, path: &str, form: Form) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }
}

fn test_config(dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        log_level: LogLevel::Info,
        model: ModelConfig {
            weights_path: dir.join("checkpoints").join("surface_classifier.mpk"),
            strict_load: false,
            mock_latency_ms: 0,
        },
        catalog: CatalogConfig {
            path: dir.join("database.json"),
            images_root: dir.join("images"),
        },
        dataset: DatasetConfig {
            root: dir.join("dataset"),
        },
    }
}

fn narrow_classifier() -> ClassifierConfig {
    ClassifierConfig {
        backbone: BackboneConfig {
            base_width: 4,
            blocks_per_stage: 1,
        },
        hidden_size: 8,
        ..ClassifierConfig::default()
    }
}

async fn spawn_app_with(dir: TempDir, catalog: Option<&str>) -> TestApp {
    if let Some(catalog) = catalog {
        std::fs::write(dir.path().join("database.json"), catalog).unwrap();
    }
    let config = test_config(dir.path());

    let mode = ClassifierMode::select(&config.model.weights_path, true, |path| {
        BurnModelService::load(&narrow_classifier(), path)
    })
    .unwrap();
    let inference = Arc::new(InferenceService::new(mode, Duration::ZERO));

    let server = HttpServer::new(inference, &config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    server.run(shutdown_rx).await.unwrap();

    TestApp {
        addr,
        dir,
        client: reqwest::Client::new(),
        _shutdown: shutdown_tx,
    }
}

async fn spawn_app(catalog: Option<&str>) -> TestApp {
    spawn_app_with(tempfile::tempdir().unwrap(), catalog).await
}

fn png_bytes() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([190, 190, 200])));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn image_part(filename: &str, data: Vec<u8>) -> Part {
    Part::bytes(data)
        .file_name(filename.to_string())
        .mime_str("image/png")
        .unwrap()
}

fn admin_form(id: &str, name: &str) -> Form {
    Form::new()
        .text("id", id.to_string())
        .text("name", name.to_string())
        .text("description", "Film for brushed steel")
        .text("base_material", "PET")
        .text("adhesive", "Acrylic")
        .text("tack_force", "50 gf/25mm")
        .text("material_category", "Metal")
        .text("material_category", "Wood")
        .text("finish_type", "Hairline")
}

fn ids(products: &Value) -> Vec<&str> {
    products
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect()
}

fn assert_close(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap();
    assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
}

#[tokio::test]
async fn health_reports_mock_mode_without_weights() {
    let app = spawn_app(None).await;

    let body = app.get_json("/health").await;

    assert_eq!(body, json!({"status": "Available", "mode": "mock"}));
}

#[tokio::test]
async fn predict_mirror_upload_recommends_mirror_films() {
    let app = spawn_app(Some(CATALOG)).await;
    let form = Form::new().part("image", image_part("Shop_MIRROR_door.png", png_bytes()));

    let response = app.post_form("/api/predict", form).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["mode"], "mock");
    assert_eq!(body["prediction"]["material"], "Metal");
    assert_eq!(body["prediction"]["finish"], "Mirror");
    assert_close(&body["prediction"]["scores"]["Metal"], 0.92);
    assert_close(&body["prediction"]["scores"]["Mirror"], 0.95);
    assert_eq!(ids(&body["recommendations"]), vec!["PF-101", "PF-102"]);
    assert_eq!(body["exact_match"], true);
}

#[tokio::test]
async fn predict_unrecognized_name_uses_low_confidence_default() {
    let app = spawn_app(Some(CATALOG)).await;
    let form = Form::new().part("image", image_part("IMG_0042.png", png_bytes()));

    let body: Value = app.post_form("/api/predict", form).await.json().await.unwrap();

    assert_close(&body["prediction"]["scores"]["Metal"], 0.60);
    assert_close(&body["prediction"]["scores"]["Mirror"], 0.55);
}

#[tokio::test]
async fn predict_falls_back_to_first_product() {
    let app = spawn_app(Some(CATALOG)).await;
    let form = Form::new().part("image", image_part("glossy_paint.png", png_bytes()));

    let body: Value = app.post_form("/api/predict", form).await.json().await.unwrap();

    assert_eq!(body["prediction"]["material"], "Painted");
    assert_eq!(ids(&body["recommendations"]), vec!["PF-101"]);
    assert_eq!(body["exact_match"], false);
}

#[tokio::test]
async fn predict_with_empty_catalog_has_no_recommendations() {
    let app = spawn_app(None).await;
    let form = Form::new().part("image", image_part("mirror.png", png_bytes()));

    let body: Value = app.post_form("/api/predict", form).await.json().await.unwrap();

    assert_eq!(body["recommendations"], json!([]));
    assert_eq!(body["exact_match"], false);
}

#[tokio::test]
async fn predict_rejects_bad_uploads() {
    let app = spawn_app(Some(CATALOG)).await;

    let garbage = Form::new().part("image", image_part("mirror.png", b"not an image".to_vec()));
    let response = app.post_form("/api/predict", garbage).await;
    assert_eq!(response.status(), 400);

    let missing = Form::new().text("note", "no file here");
    let response = app.post_form("/api/predict", missing).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn recommendations_query_is_case_insensitive() {
    let app = spawn_app(Some(CATALOG)).await;

    let rough = app
        .get_json("/api/recommendations?material=METAL&finish=rough")
        .await;
    let generic = app
        .get_json("/api/recommendations?material=Wood&finish=Pattern")
        .await;

    assert_eq!(ids(&rough), vec!["PF-305"]);
    assert_eq!(ids(&generic), vec!["PF-101"]);
}

#[tokio::test]
async fn catalog_api_appends_and_rejects_invalid_products() {
    let app = spawn_app(Some(CATALOG)).await;
    let product = json!({
        "id": "PF-900",
        "name": "Glass Shield",
        "description": "Clear film for glass",
        "specs": {"base_material": "PET"},
        "target_condition": {"material_category": ["Glass"], "finish_type": ["Glossy"], "risk_residue": "Low"}
    });

    let created = app
        .client
        .post(app.url("/api/catalog"))
        .json(&product)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);

    let duplicate = app
        .client
        .post(app.url("/api/catalog"))
        .json(&product)
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 409);

    let nameless = app
        .client
        .post(app.url("/api/catalog"))
        .json(&json!({"id": "PF-901", "name": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(nameless.status(), 400);

    let catalog = app.get_json("/api/catalog").await;
    assert_eq!(ids(&catalog), vec!["PF-101", "PF-305", "PF-102", "PF-900"]);
    assert_eq!(catalog[3]["name"], "Glass Shield");
}

#[tokio::test]
async fn admin_form_appends_product_verbatim() {
    let app = spawn_app(Some(CATALOG)).await;

    let response = app.post_form("/admin", admin_form("PF-777", "Brushed Steel Guard")).await;

    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("saved successfully"));

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(app.catalog_path()).unwrap()).unwrap();
    let last = &saved[3];
    assert_eq!(
        *last,
        json!({
            "id": "PF-777",
            "name": "Brushed Steel Guard",
            "description": "Film for brushed steel",
            "specs": {"base_material": "PET", "adhesive": "Acrylic", "tack_force": "50 gf/25mm"},
            "target_condition": {
                "material_category": ["Metal", "Wood"],
                "finish_type": ["Hairline"],
                "risk_residue": "Medium"
            },
            "image_url": "images/placeholder.png"
        })
    );
    assert_eq!(saved[1]["target_condition"]["finish_type"], json!(["ROUGH"]));
}

#[tokio::test]
async fn admin_form_requires_id_and_name() {
    let app = spawn_app(Some(CATALOG)).await;

    let response = app.post_form("/admin", admin_form("PF-778", "")).await;

    assert_eq!(response.status(), 400);
    assert!(response.text().await.unwrap().contains("ID and Name are required!"));
    assert_eq!(ids(&app.get_json("/api/catalog").await).len(), 3);
}

#[tokio::test]
async fn labeler_files_images_by_class() {
    let app = spawn_app(None).await;
    let form = Form::new()
        .part("images", image_part("a.png", png_bytes()))
        .part("images", image_part("b.png", png_bytes()))
        .text("material", "Metal")
        .text("finish", "Mirror");

    let response = app.post_form("/labeler", form).await;

    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("Metal_Mirror"));
    assert_eq!(app.get_json("/api/labeler/stats").await, json!({"Metal_Mirror": 2}));

    let bad_label = Form::new()
        .part("images", image_part("c.png", png_bytes()))
        .text("material", "Granite")
        .text("finish", "Mirror");
    assert_eq!(app.post_form("/labeler", bad_label).await.status(), 400);
}

#[tokio::test]
async fn labeler_rejects_non_images() {
    let app = spawn_app(None).await;
    let form = Form::new()
        .part("images", image_part("good.png", png_bytes()))
        .part("images", image_part("payload.html", b"<script></script>".to_vec()))
        .part("images", image_part("fake.png", b"garbage".to_vec()))
        .text("material", "Metal")
        .text("finish", "Mirror");

    let response = app.post_form("/labeler", form).await;

    assert_eq!(response.status(), 400);
    assert!(response.text().await.unwrap().contains("not a readable png or jpeg image"));
    assert_eq!(app.get_json("/api/labeler/stats").await, json!({}));
    assert!(!app.dir.path().join("dataset").join("train").join("Metal_Mirror").exists());
}

#[tokio::test]
async fn html_pages_render() {
    let app = spawn_app(Some(CATALOG)).await;

    let index = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(index.status(), 200);
    assert!(index.text().await.unwrap().contains("Classifier mode: mock"));

    let admin = app.client.get(app.url("/admin")).send().await.unwrap();
    assert!(admin.text().await.unwrap().contains("Ultra Clear Mirror Guard"));

    let form = Form::new().part("image", image_part("sus101.png", png_bytes()));
    let demo = app.post_form("/demo", form).await;
    assert_eq!(demo.status(), 200);
    let page = demo.text().await.unwrap();
    assert!(page.contains("Best Match: Ultra Clear Mirror Guard"));
    assert!(page.contains("Easy-to-peel Protection"));
    assert!(page.contains("data:image/png;base64,"));
}

#[tokio::test]
async fn product_image_is_served_from_images_root() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(images.join("pf.png"), png_bytes()).unwrap();
    let catalog = json!([
        {"id": "PF-1", "name": "With image", "image_url": "pf.png"},
        {"id": "PF-2", "name": "Missing image", "image_url": "nope.png"}
    ])
    .to_string();
    let app = spawn_app_with(dir, Some(&catalog)).await;

    let found = app.client.get(app.url("/products/PF-1/image")).send().await.unwrap();
    assert_eq!(found.status(), 200);
    assert_eq!(found.headers()["content-type"], "image/png");
    assert_eq!(found.bytes().await.unwrap().as_ref(), png_bytes().as_slice());

    let missing = app.client.get(app.url("/products/PF-2/image")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    let unknown = app.client.get(app.url("/products/PF-3/image")).send().await.unwrap();
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn product_image_never_leaves_images_root() {
    let app = spawn_app(None).await;
    std::fs::create_dir_all(app.dir.path().join("images")).unwrap();
    let secret = app.dir.path().join("secret.png");
    std::fs::write(&secret, "TOP-SECRET-CONTENT").unwrap();
    let text_file = app.dir.path().join("images").join("notes.txt");
    std::fs::write(&text_file, "plain text").unwrap();

    for (id, image_url) in [
        ("ABS", secret.to_str().unwrap()),
        ("DOTDOT", "../secret.png"),
        ("TXT", "notes.txt"),
    ] {
        let created = app
            .client
            .post(app.url("/api/catalog"))
            .json(&json!({"id": id, "name": "Sneaky", "image_url": image_url}))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), 201);

        let response = app
            .client
            .get(app.url(&format!("/products/{}/image", id)))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404, "{} was served", image_url);
        assert!(!response.text().await.unwrap().contains("TOP-SECRET-CONTENT"));
    }
}

#[tokio::test]
async fn trained_weights_select_real_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let model = narrow_classifier().init::<NdArray>(&NdArrayDevice::Cpu);
    checkpoint::save(model, &config.model.weights_path).unwrap();
    let app = spawn_app_with(dir, Some(CATALOG)).await;

    assert_eq!(app.get_json("/health").await["mode"], "real");

    let form = Form::new().part("image", image_part("anything.png", png_bytes()));
    let body: Value = app.post_form("/api/predict", form).await.json().await.unwrap();
    assert_eq!(body["mode"], "real");
    let confidence = body["prediction"]["material_confidence"].as_f64().unwrap();
    assert!(confidence > 0.0 && confidence <= 1.0);
}

#[tokio::test]
async fn metrics_are_exposed() {
    let app = spawn_app(None).await;
    app.get_json("/health").await;
    app.get_json("/api/catalog").await;

    let body = app
        .client
        .get(app.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("requests_total"));
}
