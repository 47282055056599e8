use crate::api::ApiState;
use crate::api::responses::{
    AddZoneRequest, AddZoneResponse, ClearZonesResponse, DetectionResponse,
    DetectionStateResponse, ErrorCode, ErrorResponse, HistoryResponse, SaveZonesResponse,
    SettingsRequest, SettingsResponse, StatusResponse, ZoneState, ZoneStatusResponse,
};
use crate::capture::FrameSource;
use crate::detection::DetectionClient;
use crate::error::AppError;
use crate::state::{Engine, EngineState};
use crate::zone::{ClearOutcome, persist};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// [`AppError`] rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            AppError::InvalidZone { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::InvalidZone,
                self.0.to_string(),
            ),
            AppError::Precondition(_) => (
                StatusCode::CONFLICT,
                ErrorCode::PreconditionFailed,
                self.0.to_string(),
            ),
            AppError::InvalidSetting(_) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidSetting,
                self.0.to_string(),
            ),
            AppError::Persist(_) => {
                error!(error = %self.0, "Saving zones failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::PersistFailed,
                    self.0.to_string(),
                )
            }
            AppError::StateLock => {
                error!(error = %self.0, "Internal error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::InternalError,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };
        let body = ErrorResponse {
            error_code,
            error_message: message,
            timestamp: now_timestamp(),
        };
        (status, Json(body)).into_response()
    }
}

fn format_timestamp(timestamp: SystemTime) -> String {
    OffsetDateTime::from(timestamp)
        .format(&Rfc3339)
        .unwrap_or_else(|err| {
            error!(error = %err, "Failed to format timestamp");
            "1970-01-01T00:00:00Z".to_string()
        })
}

fn now_timestamp() -> String {
    format_timestamp(SystemTime::now())
}

pub async fn get_status<S, D>(State(api): State<ApiState<S, D>>) -> Result<Json<StatusResponse>, ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    Ok(Json(build_status_response(&api.engine, SystemTime::now())?))
}

fn build_status_response(engine: &Engine, now: SystemTime) -> Result<StatusResponse, AppError> {
    engine.read(|state| {
        let threshold = state.threshold_secs();
        let zones = state
            .zones()
            .iter()
            .zip(state.records())
            .enumerate()
            .map(|(index, (zone, record))| ZoneStatusResponse {
                zone_number: index + 1,
                coordinates: zone.as_array(),
                state: if record.is_violating(threshold) {
                    ZoneState::Illegal
                } else if record.occupied {
                    ZoneState::Occupied
                } else {
                    ZoneState::Available
                },
                occupied: record.occupied,
                violation_seconds: record.violation_seconds,
            })
            .collect();
        let detections = state
            .detections()
            .iter()
            .map(|d| DetectionResponse {
                coordinates: [d.x1, d.y1, d.x2, d.y2],
                confidence: d.confidence,
                label: d.vehicle_class().label(),
            })
            .collect();

        StatusResponse {
            running: state.is_running(),
            interval_ms: state.interval_ms(),
            threshold_secs: threshold,
            zone_count: state.zone_count(),
            occupied_count: state.occupied_count(),
            illegal_count: state.illegal_count(),
            vehicles_detected: state.detections().len(),
            zones,
            detections,
            last_tick: state.status().clone(),
            ticks_completed: state.ticks_completed(),
            ticks_failed: state.ticks_failed(),
            timestamp: format_timestamp(now),
        }
    })
}

pub async fn get_history<S, D>(State(api): State<ApiState<S, D>>) -> Result<Json<HistoryResponse>, ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    let history = api.engine.read(EngineState::history)?;
    Ok(Json(HistoryResponse {
        history,
        timestamp: now_timestamp(),
    }))
}

pub async fn add_zone<S, D>(
    State(api): State<ApiState<S, D>>,
    Json(request): Json<AddZoneRequest>,
) -> Result<(StatusCode, Json<AddZoneResponse>), ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    let (index, count) = api
        .engine
        .add_zone((request.x1, request.y1), (request.x2, request.y2))
        .await
        .inspect_err(|err| warn!(error = %err, "Zone rejected"))?;
    Ok((
        StatusCode::CREATED,
        Json(AddZoneResponse {
            zone_number: index + 1,
            zone_count: count,
            timestamp: now_timestamp(),
        }),
    ))
}

pub async fn clear_zones<S, D>(State(api): State<ApiState<S, D>>) -> Result<Json<ClearZonesResponse>, ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    let (cleared, message) = match api.engine.clear_zones().await? {
        ClearOutcome::Cleared { previous } => (previous, "All parking zones cleared".to_string()),
        ClearOutcome::EmptyZoneSet => (0, "No zones to clear".to_string()),
    };
    Ok(Json(ClearZonesResponse {
        cleared,
        message,
        timestamp: now_timestamp(),
    }))
}

pub async fn save_zones<S, D>(State(api): State<ApiState<S, D>>) -> Result<Json<SaveZonesResponse>, ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    let zones = api.engine.read(|state| state.zones().to_vec())?;
    if zones.is_empty() {
        return Err(AppError::Precondition("no zones to save".to_string()).into());
    }
    let path = persist::save_zones(&api.zones_dir, &api.zones_filename, &zones).await?;
    Ok(Json(SaveZonesResponse {
        success: true,
        filepath: path.display().to_string(),
        count: zones.len(),
        timestamp: now_timestamp(),
    }))
}

pub async fn start_detection<S, D>(
    State(api): State<ApiState<S, D>>,
) -> Result<Json<DetectionStateResponse>, ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    let mut scheduler = api.scheduler.lock().await;
    scheduler
        .ensure_ready()
        .inspect_err(|err| warn!(error = %err, "Detection not started"))?;
    let interval_ms = api.engine.read(EngineState::interval_ms)?;
    scheduler.start(interval_ms)?;
    Ok(Json(DetectionStateResponse {
        running: true,
        interval_ms,
        timestamp: now_timestamp(),
    }))
}

pub async fn stop_detection<S, D>(
    State(api): State<ApiState<S, D>>,
) -> Result<Json<DetectionStateResponse>, ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    let mut scheduler = api.scheduler.lock().await;
    scheduler.stop()?;
    Ok(Json(DetectionStateResponse {
        running: false,
        interval_ms: api.engine.read(EngineState::interval_ms)?,
        timestamp: now_timestamp(),
    }))
}

pub async fn update_settings<S, D>(
    State(api): State<ApiState<S, D>>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError>
where
    S: FrameSource,
    D: DetectionClient,
{
    if let Some(interval_ms) = request.interval_ms {
        api.scheduler.lock().await.reconfigure_interval(interval_ms)?;
    }
    if let Some(threshold_secs) = request.threshold_secs {
        api.engine.set_threshold_secs(threshold_secs)?;
    }
    let (threshold_secs, interval_ms) = api
        .engine
        .read(|state| (state.threshold_secs(), state.interval_ms()))?;
    Ok(Json(SettingsResponse {
        threshold_secs,
        interval_ms,
        timestamp: now_timestamp(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::MockFrameSource;
    use crate::detection::mock::MockDetectionClient;
    use crate::notify::TracingAlertSink;
    use crate::scheduler::PollingScheduler;
    use std::sync::Arc;
    use std::time::UNIX_EPOCH;
    use tokio::sync::Mutex;

    fn api_state(source: MockFrameSource) -> ApiState<MockFrameSource, MockDetectionClient> {
        let engine = Engine::new(2, 1000);
        let scheduler = PollingScheduler::new(
            engine.clone(),
            Arc::new(source),
            Arc::new(MockDetectionClient::default()),
            Arc::new(TracingAlertSink),
            1000,
        );
        ApiState {
            engine,
            scheduler: Arc::new(Mutex::new(scheduler)),
            zones_dir: std::env::temp_dir(),
            zones_filename: "parkwatch-handler-test".to_string(),
        }
    }

    #[tokio::test]
    async fn status_reports_zone_states() -> Result<(), AppError> {
        let api = api_state(MockFrameSource::ready());
        api.engine.add_zone((0, 0), (40, 40)).await?;
        api.engine.add_zone((50, 0), (90, 40)).await?;
        api.engine.add_zone((100, 0), (140, 40)).await?;
        api.engine.write(|state| {
            for _ in 0..4 {
                state.apply_detection(Vec::new(), &[true, true, false], UNIX_EPOCH);
            }
            state.apply_detection(Vec::new(), &[true, false, false], UNIX_EPOCH);
        })?;

        let status = build_status_response(&api.engine, UNIX_EPOCH)?;

        let states: Vec<ZoneState> = status.zones.iter().map(|z| z.state).collect();
        assert_eq!(
            states,
            vec![ZoneState::Illegal, ZoneState::Available, ZoneState::Available]
        );
        assert_eq!(status.zones[0].violation_seconds, 4);
        assert_eq!(status.illegal_count, 1);
        assert_eq!(status.timestamp, "1970-01-01T00:00:00Z");
        Ok(())
    }

    #[tokio::test]
    async fn add_zone_rejects_small_rectangle_with_422() {
        let api = api_state(MockFrameSource::ready());

        let result = add_zone(
            State(api.clone()),
            Json(AddZoneRequest {
                x1: 5,
                y1: 5,
                x2: 10,
                y2: 10,
            }),
        )
        .await;

        match result {
            Err(err) => {
                assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY)
            }
            Ok(_) => panic!("expected invalid zone"),
        }
        assert_eq!(api.engine.read(EngineState::zone_count).ok(), Some(0));
    }

    #[tokio::test]
    async fn add_zone_accepts_corners_at_integer_limits() {
        let api = api_state(MockFrameSource::ready());

        let result = add_zone(
            State(api.clone()),
            Json(AddZoneRequest {
                x1: i32::MIN,
                y1: 0,
                x2: i32::MAX,
                y2: 100,
            }),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(api.engine.read(EngineState::zone_count).ok(), Some(1));
    }

    #[tokio::test]
    async fn start_without_zones_is_conflict() {
        let api = api_state(MockFrameSource::ready());

        let result = start_detection(State(api.clone())).await;

        match result {
            Err(err) => assert_eq!(err.into_response().status(), StatusCode::CONFLICT),
            Ok(_) => panic!("expected precondition failure"),
        }
        assert!(!api.scheduler.lock().await.is_running());
    }

    #[tokio::test]
    async fn start_and_stop_toggle_running() -> Result<(), AppError> {
        let api = api_state(MockFrameSource::ready());
        api.engine.add_zone((0, 0), (40, 40)).await?;

        let started = start_detection(State(api.clone())).await;
        assert!(matches!(started, Ok(Json(DetectionStateResponse { running: true, .. }))));
        assert!(api.scheduler.lock().await.is_running());

        let stopped = stop_detection(State(api.clone())).await;
        assert!(matches!(stopped, Ok(Json(DetectionStateResponse { running: false, .. }))));
        assert!(!api.engine.read(EngineState::is_running)?);
        Ok(())
    }

    #[tokio::test]
    async fn settings_update_threshold_and_reject_zero_interval() -> Result<(), AppError> {
        let api = api_state(MockFrameSource::ready());

        let updated = update_settings(
            State(api.clone()),
            Json(SettingsRequest {
                threshold_secs: Some(30),
                interval_ms: Some(2000),
            }),
        )
        .await;
        assert!(matches!(
            updated,
            Ok(Json(SettingsResponse {
                threshold_secs: 30,
                interval_ms: 2000,
                ..
            }))
        ));

        let rejected = update_settings(
            State(api.clone()),
            Json(SettingsRequest {
                threshold_secs: None,
                interval_ms: Some(0),
            }),
        )
        .await;
        match rejected {
            Err(err) => assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST),
            Ok(_) => panic!("expected invalid setting"),
        }
        assert_eq!(api.engine.read(EngineState::interval_ms)?, 2000);
        Ok(())
    }

    #[tokio::test]
    async fn clear_with_no_zones_is_informational() {
        let api = api_state(MockFrameSource::ready());

        let result = clear_zones(State(api)).await;

        match result {
            Ok(Json(body)) => {
                assert_eq!(body.cleared, 0);
                assert_eq!(body.message, "No zones to clear");
            }
            Err(_) => panic!("clearing an empty set is not an error"),
        }
    }

    #[tokio::test]
    async fn save_without_zones_is_conflict() {
        let api = api_state(MockFrameSource::ready());

        match save_zones(State(api)).await {
            Err(err) => assert_eq!(err.into_response().status(), StatusCode::CONFLICT),
            Ok(_) => panic!("expected precondition failure"),
        }
    }
}
