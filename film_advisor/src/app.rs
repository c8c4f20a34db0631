use crate::burn_service::BurnModelService;
use crate::config::Config;
use crate::inference_service::{ClassifierMode, InferenceService};
use crate::server::HttpServer;

use std::{error::Error, sync::Arc};
use surface_model::ClassifierConfig;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let mode = match ClassifierMode::select(
        &config.model.weights_path,
        config.model.strict_load,
        |path| BurnModelService::load(&ClassifierConfig::default(), path),
    ) {
        Ok(mode) => mode,
        Err(e) => {
            tracing::error!("Failed to initialize classifier: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let inference = Arc::new(InferenceService::new(
        mode,
        config.model.get_mock_latency(),
    ));

    let server = HttpServer::new(inference, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
