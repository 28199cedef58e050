use anyhow::Result;
use plate_service::{
    api,
    config::PlateServiceConfig,
    inference::{OnnxPlateDetector, OnnxPlateRecognizer},
    PlateDetector, PlatePipeline, PlateRecognizer, PlateServiceState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = telemetry::init_with_service("plate-service");

    info!("Starting Plate Service...");

    // Load configuration from environment
    let config = PlateServiceConfig::from_env()?;
    info!(
        "Plate Service configuration: bind={}, detector={}, provider={}",
        config.bind_addr, config.detector.model_path, config.execution.execution_provider
    );

    // The service cannot run without a detector
    let detector = OnnxPlateDetector::load(config.detector.clone(), &config.execution)?;
    info!(
        "Plate detector ready on {} execution provider",
        detector.execution_provider()
    );
    let detector: Arc<dyn PlateDetector> = Arc::new(detector);

    let recognizer: Option<Arc<dyn PlateRecognizer>> = match &config.recognizer {
        Some(recognizer_config) => {
            match OnnxPlateRecognizer::load(recognizer_config.clone(), &config.execution) {
                Ok(recognizer) => Some(Arc::new(recognizer)),
                Err(e) => {
                    error!(
                        "Failed to load plate recognizer from {}: {:#}",
                        recognizer_config.model_path, e
                    );
                    None
                }
            }
        }
        None => None,
    };
    if recognizer.is_none() {
        warn!("Running without a plate recognizer - every plate will read as unreadable");
    }

    let state = PlateServiceState::new(PlatePipeline::new(detector, recognizer));

    // Build HTTP router
    let app = api::router_with_upload_limit(state, config.max_upload_bytes)
        .layer(api::cors_layer(&config.allowed_origins)?);

    // Bind and serve
    info!("Binding to {}", config.bind_addr);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Plate Service listening on {}", config.bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Plate Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
