//! Drowsiness Monitor - Main Entry Point

use affect::{AffectClassifier, AffectCoordinator, OnnxEmotionClassifier};
use alerting::{
    AlertPublisher, AlertSink, DetectionStats, SinkWorker, StatusBoard, DEFAULT_LIVE_CAPACITY,
    DEFAULT_SINK_CAPACITY,
};
use anyhow::Context;
use api::{create_router, init_logging, install_metrics, AppConfig, AppState};
use camera_capture::ImageSequenceSource;
use cloud_sync::{CloudConfig, MqttSink};
use dms::FaceMeshDetector;
use monitor::{DetectionSettings, Monitor, MonitorContext};
use std::sync::Arc;
use std::time::Duration;
use storage::Repository;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging);

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = match install_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    };

    let settings = config
        .settings()
        .context("Invalid detection settings in configuration")?;

    let affect = load_affect_classifier(&config);
    let coordinator = if affect.is_some() {
        AffectCoordinator::new(config.affect_interval())
    } else {
        AffectCoordinator::disabled()
    };

    // --- Fan-out and sinks ---
    let (publisher, sink_rx) = AlertPublisher::new(DEFAULT_LIVE_CAPACITY, DEFAULT_SINK_CAPACITY);
    let mut sinks: Vec<Arc<dyn AlertSink>> = Vec::new();

    let repository = match &config.storage.database_url {
        Some(url) => match Repository::connect(url).await {
            Ok(repository) => {
                sinks.push(Arc::new(repository.clone()));
                Some(repository)
            }
            Err(e) => {
                error!(error = %e, "Alert storage unavailable, continuing without persistence");
                None
            }
        },
        None => None,
    };

    if let Some(mqtt) = &config.mqtt {
        let mut sink = MqttSink::new(CloudConfig::from(mqtt));
        match sink.connect() {
            Ok(()) => sinks.push(Arc::new(sink)),
            Err(e) => error!(error = %e, "MQTT telemetry disabled"),
        }
    }

    let sink_worker = tokio::spawn(SinkWorker::run(sink_rx, sinks));

    let ctx = MonitorContext {
        board: Arc::new(StatusBoard::new()),
        publisher,
        stats: Arc::new(DetectionStats::new()),
        settings: Arc::new(DetectionSettings::new(settings)),
        coordinator: Arc::new(coordinator),
    };

    // --- Sampling loop ---
    let dms_config = config.dms_config();
    let mut monitor = match FaceMeshDetector::new(&dms_config) {
        Ok(detector) => {
            let source = ImageSequenceSource::new(config.camera_config());
            match Monitor::start(source, detector, affect, ctx.clone(), config.monitor_config()) {
                Ok(monitor) => Some(monitor),
                Err(e) => {
                    error!(error = %e, "Monitor not started, serving status only");
                    None
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Face-mesh model unavailable, monitor not started");
            ctx.board.update(|r| {
                r.source = alerting::SourceStatus::Unavailable;
                r.source_error = Some(e.to_string());
            });
            None
        }
    };

    // --- API server ---
    let mut state = AppState::new(ctx);
    if let Some(repository) = repository {
        state = state.with_repository(repository);
    }
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }
    match FaceMeshDetector::new(&dms_config) {
        Ok(detector) => state = state.with_frame_detector(Box::new(detector)),
        Err(e) => warn!(error = %e, "Frame upload endpoint disabled"),
    }

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("API server listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    info!("Server stopped accepting connections, cleaning up");

    if let Some(mut monitor) = monitor.take() {
        if let Err(e) = tokio::task::spawn_blocking(move || monitor.stop()).await {
            error!(error = %e, "Monitor shutdown task failed");
        }
    }

    // The worker drains what is queued once the last publisher is gone.
    if tokio::time::timeout(Duration::from_secs(5), sink_worker)
        .await
        .is_err()
    {
        warn!("Sink worker did not drain within 5s");
    }

    info!("Shutdown complete");
    Ok(())
}

fn load_affect_classifier(config: &AppConfig) -> Option<Box<dyn AffectClassifier>> {
    if !config.affect.enabled {
        info!("Affect analysis disabled by configuration");
        return None;
    }
    let path = config.models.emotion.as_deref()?;
    match OnnxEmotionClassifier::new(path) {
        Ok(classifier) => Some(Box::new(classifier)),
        Err(e) => {
            warn!(error = %e, "Emotion model unavailable, affect analysis disabled");
            None
        }
    }
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
