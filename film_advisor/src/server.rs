use crate::{
    burn_service::BurnModelService, catalog::CatalogStore, config::Config,
    inference_service::InferenceService, routes::api_routes, telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use surface_model::dataset::DatasetLayout;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub type Inference = InferenceService<BurnModelService>;

#[derive(Clone)]
pub struct SharedState {
    pub inference: Arc<Inference>,
    pub catalog: Arc<CatalogStore>,
    pub dataset: Arc<DatasetLayout>,
    pub metrics: Arc<Metrics>,
    pub weights_path: PathBuf,
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(inference: Arc<Inference>, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let metrics = Arc::new(Metrics::new()?);
        let metrics_layer = HttpMetricsLayerBuilder::new().build();

        let app_state = SharedState {
            inference,
            catalog: Arc::new(
                CatalogStore::new(&config.catalog.path)
                    .with_images_root(&config.catalog.images_root),
            ),
            dataset: Arc::new(DatasetLayout::new(&config.dataset.root)),
            metrics,
            weights_path: config.model.weights_path.clone(),
        };

        let router = Router::new()
            .merge(api_routes())
            .with_state(app_state)
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(metrics_layer);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                tracing::info!("Server stopped");
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
