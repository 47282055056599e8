use serde::Serialize;
use std::collections::VecDeque;
use std::time::SystemTime;
use time::{OffsetDateTime, UtcOffset};
use time::macros::format_description;

pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySample {
    pub time_label: String,
    pub vehicle_count: usize,
    pub violation_count: usize,
}

/// Chart-ready view of the window, three sequences aligned by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HistorySnapshot {
    pub labels: Vec<String>,
    pub vehicle_counts: Vec<usize>,
    pub violation_counts: Vec<usize>,
}

/// Fixed-capacity FIFO of per-tick counts, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    samples: VecDeque<HistorySample>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, vehicle_count: usize, violation_count: usize, label: String) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(HistorySample {
            time_label: label,
            vehicle_count,
            violation_count,
        });
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let mut snapshot = HistorySnapshot {
            labels: Vec::with_capacity(self.samples.len()),
            vehicle_counts: Vec::with_capacity(self.samples.len()),
            violation_counts: Vec::with_capacity(self.samples.len()),
        };
        for sample in &self.samples {
            snapshot.labels.push(sample.time_label.clone());
            snapshot.vehicle_counts.push(sample.vehicle_count);
            snapshot.violation_counts.push(sample.violation_count);
        }
        snapshot
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// 24-hour `HH:MM:SS` label for a history sample, as wall-clock time at `offset`.
pub fn time_label(timestamp: SystemTime, offset: UtcOffset) -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    OffsetDateTime::from(timestamp)
        .to_offset(offset)
        .format(&format)
        .unwrap_or_else(|_| "--:--:--".to_string())
}
