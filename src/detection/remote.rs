use crate::capture::EncodedFrame;
use crate::detection::{
    Detection, DetectionClient, DetectionError, DetectionResult, check_alignment,
};
use crate::zone::Zone;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the detection service's JSON endpoint.
pub struct RemoteDetectionClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl RemoteDetectionClient {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, DetectionError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DetectionError::Network(format!("failed to build client: {err}")))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for RemoteDetectionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDetectionClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl DetectionClient for RemoteDetectionClient {
    async fn detect(
        &self,
        frame: &EncodedFrame,
        zones: &[Zone],
    ) -> Result<DetectionResult, DetectionError> {
        let request = DetectRequest::new(frame, zones);

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| DetectionError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::Server(format!(
                "http status {} ({})",
                status.as_u16(),
                body.trim()
            )));
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|err| DetectionError::Server(format!("invalid response body: {err}")))?;

        let result = body.into_result()?;
        check_alignment(&result, zones)?;
        debug!(
            detections = result.detections.len(),
            zones = zones.len(),
            "Detection response received"
        );
        Ok(result)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectRequest {
    image: String,
    parking_zones: Vec<[i32; 4]>,
}

impl DetectRequest {
    fn new(frame: &EncodedFrame, zones: &[Zone]) -> Self {
        Self {
            image: data_url(frame),
            parking_zones: zones.iter().map(Zone::as_array).collect(),
        }
    }
}

fn data_url(frame: &EncodedFrame) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&frame.bytes);
    format!("data:{};base64,{encoded}", frame.mime_type)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectResponse {
    success: bool,
    #[serde(default)]
    detections: Vec<Detection>,
    #[serde(default)]
    parking_status: Vec<ZoneStatus>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZoneStatus {
    occupied: bool,
}

impl DetectResponse {
    fn into_result(self) -> Result<DetectionResult, DetectionError> {
        if !self.success {
            let reason = self
                .error
                .unwrap_or_else(|| "detection reported failure".to_string());
            return Err(DetectionError::Server(reason));
        }
        Ok(DetectionResult {
            detections: self.detections,
            per_zone_occupied: self.parking_status.iter().map(|s| s.occupied).collect(),
        })
    }
}
