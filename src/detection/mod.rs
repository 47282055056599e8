//! Remote vehicle detection contract.
//!
//! Implement [`DetectionClient`] to plug in a detection backend. The result's
//! `per_zone_occupied` must be index-aligned with the zones passed in.

use crate::capture::EncodedFrame;
use crate::zone::Zone;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

pub mod mock;
pub mod remote;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    #[serde(rename = "conf")]
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_id: u32,
}

impl Detection {
    pub fn vehicle_class(&self) -> VehicleClass {
        VehicleClass::from_class_id(self.class_id)
    }
}

/// COCO class ids reported by the detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Bus,
    Truck,
    Vehicle,
}

impl VehicleClass {
    pub fn from_class_id(class_id: u32) -> Self {
        match class_id {
            2 => Self::Car,
            5 => Self::Bus,
            7 => Self::Truck,
            _ => Self::Vehicle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Car => "Car",
            Self::Bus => "Bus",
            Self::Truck => "Truck",
            Self::Vehicle => "Vehicle",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub per_zone_occupied: Vec<bool>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("expected {expected} zone statuses, got {actual}")]
    ZoneCountMismatch { expected: usize, actual: usize },
}

pub trait DetectionClient: Send + Sync + 'static {
    fn detect(
        &self,
        frame: &EncodedFrame,
        zones: &[Zone],
    ) -> impl Future<Output = Result<DetectionResult, DetectionError>> + Send;
}

/// Reject results whose zone statuses are not aligned with `zones`.
pub fn check_alignment(result: &DetectionResult, zones: &[Zone]) -> Result<(), DetectionError> {
    if result.per_zone_occupied.len() != zones.len() {
        return Err(DetectionError::ZoneCountMismatch {
            expected: zones.len(),
            actual: result.per_zone_occupied.len(),
        });
    }
    Ok(())
}
