use crate::capture::EncodedFrame;
use crate::detection::{Detection, DetectionClient, DetectionError, DetectionResult};
use crate::zone::Zone;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted reply of [`MockDetectionClient`].
#[derive(Debug, Clone)]
pub enum MockDetectionBehavior {
    Occupancy {
        per_zone_occupied: Vec<bool>,
        vehicles: usize,
    },
    Fail(DetectionError),
    /// Reply after `delay` with the given occupancy.
    Delayed {
        delay: Duration,
        per_zone_occupied: Vec<bool>,
    },
}

impl MockDetectionBehavior {
    pub fn occupied(per_zone_occupied: Vec<bool>) -> Self {
        let vehicles = per_zone_occupied.iter().filter(|o| **o).count();
        Self::Occupancy {
            per_zone_occupied,
            vehicles,
        }
    }

    pub fn network_failure() -> Self {
        Self::Fail(DetectionError::Network("mock connection refused".to_string()))
    }

    pub fn server_failure() -> Self {
        Self::Fail(DetectionError::Server("mock http status 500".to_string()))
    }
}

/// Detection client that replays scripted behaviors in order. Once the script
/// is exhausted every zone is reported vacant.
#[derive(Debug, Default)]
pub struct MockDetectionClient {
    behaviors: Mutex<VecDeque<MockDetectionBehavior>>,
    calls: AtomicUsize,
}

impl MockDetectionClient {
    pub fn new(behaviors: Vec<MockDetectionBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_behavior(&self, zone_count: usize) -> MockDetectionBehavior {
        self.behaviors
            .lock()
            .ok()
            .and_then(|mut guard| guard.pop_front())
            .unwrap_or_else(|| MockDetectionBehavior::occupied(vec![false; zone_count]))
    }
}

fn mock_detections(count: usize) -> Vec<Detection> {
    (0..count)
        .map(|i| {
            let offset = i as i32 * 50;
            Detection {
                x1: offset,
                y1: 0,
                x2: offset + 40,
                y2: 40,
                confidence: 0.9,
                class_id: 2,
            }
        })
        .collect()
}

impl DetectionClient for MockDetectionClient {
    async fn detect(
        &self,
        _frame: &EncodedFrame,
        zones: &[Zone],
    ) -> Result<DetectionResult, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_behavior(zones.len()) {
            MockDetectionBehavior::Occupancy {
                per_zone_occupied,
                vehicles,
            } => Ok(DetectionResult {
                detections: mock_detections(vehicles),
                per_zone_occupied,
            }),
            MockDetectionBehavior::Fail(err) => Err(err),
            MockDetectionBehavior::Delayed {
                delay,
                per_zone_occupied,
            } => {
                tokio::time::sleep(delay).await;
                let vehicles = per_zone_occupied.iter().filter(|o| **o).count();
                Ok(DetectionResult {
                    detections: mock_detections(vehicles),
                    per_zone_occupied,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_reports_vacant() {
        let client = MockDetectionClient::new(vec![
            MockDetectionBehavior::occupied(vec![true, false]),
            MockDetectionBehavior::server_failure(),
        ]);
        let frame = EncodedFrame::jpeg(Vec::new());
        let zones = [Zone {
            x1: 0,
            y1: 0,
            x2: 30,
            y2: 30,
        }; 2];

        let first = client.detect(&frame, &zones).await;
        let second = client.detect(&frame, &zones).await;
        let third = client.detect(&frame, &zones).await;

        assert_eq!(
            first.map(|r| (r.detections.len(), r.per_zone_occupied)),
            Ok((1, vec![true, false]))
        );
        assert!(matches!(second, Err(DetectionError::Server(_))));
        assert_eq!(
            third.map(|r| r.per_zone_occupied),
            Ok(vec![false, false])
        );
        assert_eq!(client.calls(), 3);
    }
}
