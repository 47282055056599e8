use crate::history::HistorySnapshot;
use crate::state::TickStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ZoneState {
    Available,
    Occupied,
    Illegal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ZoneStatusResponse {
    pub zone_number: usize,
    pub coordinates: [i32; 4],
    pub state: ZoneState,
    pub occupied: bool,
    pub violation_seconds: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DetectionResponse {
    pub coordinates: [i32; 4],
    pub confidence: f32,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusResponse {
    pub running: bool,
    pub interval_ms: u64,
    pub threshold_secs: u32,
    pub zone_count: usize,
    pub occupied_count: usize,
    pub illegal_count: usize,
    pub vehicles_detected: usize,
    pub zones: Vec<ZoneStatusResponse>,
    pub detections: Vec<DetectionResponse>,
    pub last_tick: TickStatus,
    pub ticks_completed: u64,
    pub ticks_failed: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HistoryResponse {
    #[serde(flatten)]
    pub history: HistorySnapshot,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct AddZoneRequest {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AddZoneResponse {
    pub zone_number: usize,
    pub zone_count: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ClearZonesResponse {
    pub cleared: usize,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SaveZonesResponse {
    pub success: bool,
    pub filepath: String,
    pub count: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DetectionStateResponse {
    pub running: bool,
    pub interval_ms: u64,
    pub timestamp: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct SettingsRequest {
    pub threshold_secs: Option<u32>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SettingsResponse {
    pub threshold_secs: u32,
    pub interval_ms: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidZone,
    PreconditionFailed,
    InvalidSetting,
    PersistFailed,
    InternalError,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}
