use crate::capture::FrameSource;
use crate::detection::DetectionClient;
use crate::scheduler::PollingScheduler;
use crate::state::Engine;
use axum::Router;
use axum::routing::{get, post, put};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod handlers;
pub mod responses;

pub struct ApiState<S, D> {
    pub engine: Engine,
    pub scheduler: Arc<Mutex<PollingScheduler<S, D>>>,
    pub zones_dir: PathBuf,
    pub zones_filename: String,
}

impl<S, D> Clone for ApiState<S, D> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            scheduler: Arc::clone(&self.scheduler),
            zones_dir: self.zones_dir.clone(),
            zones_filename: self.zones_filename.clone(),
        }
    }
}

pub fn router<S, D>(state: ApiState<S, D>) -> Router
where
    S: FrameSource,
    D: DetectionClient,
{
    Router::new()
        .route("/api/status", get(handlers::get_status::<S, D>))
        .route("/api/history", get(handlers::get_history::<S, D>))
        .route(
            "/api/zones",
            post(handlers::add_zone::<S, D>).delete(handlers::clear_zones::<S, D>),
        )
        .route("/api/zones/save", post(handlers::save_zones::<S, D>))
        .route("/api/detection/start", post(handlers::start_detection::<S, D>))
        .route("/api/detection/stop", post(handlers::stop_detection::<S, D>))
        .route("/api/settings", put(handlers::update_settings::<S, D>))
        .with_state(state)
}
