use parkwatch::api::{self, ApiState};
use parkwatch::capture::{FileFrameSource, FrameSource};
use parkwatch::config;
use parkwatch::detection::remote::RemoteDetectionClient;
use parkwatch::notify::TracingAlertSink;
use parkwatch::scheduler::PollingScheduler;
use parkwatch::state::Engine;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "parkwatch starting"
    );

    let engine = Engine::new(config.threshold_secs(), config.interval_ms());
    engine.write(|state| state.set_label_offset(config.label_offset()))?;

    let source = Arc::new(FileFrameSource::new(config.frame_path()));
    if !source.is_ready() {
        tracing::warn!("No [capture].frame_path configured, detection cannot start");
    }

    let client = Arc::new(RemoteDetectionClient::new(
        config.detection_endpoint().to_string(),
        config.detection_timeout(),
    )?);
    tracing::info!(
        endpoint = client.endpoint(),
        threshold_secs = config.threshold_secs(),
        interval_ms = config.interval_ms(),
        "Detection client ready"
    );

    let scheduler = PollingScheduler::new(
        engine.clone(),
        source,
        client,
        Arc::new(TracingAlertSink),
        config.interval_ms(),
    );
    let scheduler = Arc::new(Mutex::new(scheduler));

    let app = api::router(ApiState {
        engine,
        scheduler: Arc::clone(&scheduler),
        zones_dir: config.coordinate_dir().to_path_buf(),
        zones_filename: config.zones_filename().to_string(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.lock().await.stop()?;
    tracing::info!("parkwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
