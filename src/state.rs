use crate::detection::Detection;
use crate::error::AppError;
use crate::history::{HistorySnapshot, HistoryWindow};
use crate::reconcile::{Reconciliation, reconcile};
use crate::zone::{ClearOutcome, OccupancyRecord, Zone, ZoneStore};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::UtcOffset;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::info;

/// Transient outcome of the most recent tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TickStatus {
    Idle,
    Ok { detection_ms: u64 },
    CaptureFailed { reason: String },
    DetectionFailed { reason: String },
}

/// Everything the rendering side needs to redraw after a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub zones: Vec<Zone>,
    pub records: Vec<OccupancyRecord>,
    pub detections: Vec<Detection>,
    pub occupied_count: usize,
    pub illegal_count: usize,
    pub threshold_secs: u32,
}

#[derive(Debug)]
pub struct EngineState {
    zones: ZoneStore,
    threshold_secs: u32,
    interval_ms: u64,
    running: bool,
    detections: Vec<Detection>,
    occupied_count: usize,
    illegal_count: usize,
    history: HistoryWindow,
    label_offset: UtcOffset,
    status: TickStatus,
    ticks_completed: u64,
    ticks_failed: u64,
    frame_tx: watch::Sender<FrameSnapshot>,
    history_tx: watch::Sender<HistorySnapshot>,
}

impl EngineState {
    pub fn new(threshold_secs: u32, interval_ms: u64) -> Self {
        let (frame_tx, _frame_rx) = watch::channel(FrameSnapshot {
            zones: Vec::new(),
            records: Vec::new(),
            detections: Vec::new(),
            occupied_count: 0,
            illegal_count: 0,
            threshold_secs,
        });
        let (history_tx, _history_rx) = watch::channel(HistorySnapshot::default());
        Self {
            zones: ZoneStore::new(),
            threshold_secs,
            interval_ms,
            running: false,
            detections: Vec::new(),
            occupied_count: 0,
            illegal_count: 0,
            history: HistoryWindow::new(),
            label_offset: UtcOffset::UTC,
            status: TickStatus::Idle,
            ticks_completed: 0,
            ticks_failed: 0,
            frame_tx,
            history_tx,
        }
    }

    pub fn zones(&self) -> &[Zone] {
        self.zones.zones()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.count()
    }

    pub fn records(&self) -> &[OccupancyRecord] {
        self.zones.records()
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied_count
    }

    pub fn illegal_count(&self) -> usize {
        self.illegal_count
    }

    pub fn threshold_secs(&self) -> u32 {
        self.threshold_secs
    }

    /// Takes effect from the next reconciliation; past crossings are not re-alerted.
    pub fn set_threshold_secs(&mut self, threshold_secs: u32) {
        self.threshold_secs = threshold_secs;
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn set_interval_ms(&mut self, interval_ms: u64) -> Result<(), AppError> {
        if interval_ms == 0 {
            return Err(AppError::InvalidSetting(
                "interval_ms must be greater than zero".to_string(),
            ));
        }
        self.interval_ms = interval_ms;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn status(&self) -> &TickStatus {
        &self.status
    }

    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed
    }

    pub fn ticks_failed(&self) -> u64 {
        self.ticks_failed
    }

    /// Offset applied to history time labels (UTC unless configured).
    pub fn label_offset(&self) -> UtcOffset {
        self.label_offset
    }

    pub fn set_label_offset(&mut self, offset: UtcOffset) {
        self.label_offset = offset;
    }

    pub fn history(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    pub fn subscribe_frames(&self) -> watch::Receiver<FrameSnapshot> {
        self.frame_tx.subscribe()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<HistorySnapshot> {
        self.history_tx.subscribe()
    }

    /// Fold a detection result into the zone records and aggregate counts.
    pub fn apply_detection(
        &mut self,
        detections: Vec<Detection>,
        per_zone_occupied: &[bool],
        now: SystemTime,
    ) -> Reconciliation {
        let reconciliation = reconcile(
            self.zones.records(),
            per_zone_occupied,
            self.threshold_secs,
            now,
        );
        self.zones.set_records(reconciliation.next.clone());
        self.detections = detections;
        self.occupied_count = reconciliation.occupied_count;
        self.illegal_count = reconciliation.illegal_count;
        reconciliation
    }

    pub fn record_history(&mut self, vehicle_count: usize, violation_count: usize, label: String) {
        self.history.record(vehicle_count, violation_count, label);
        self.history_tx.send_replace(self.history.snapshot());
    }

    pub fn mark_tick_ok(&mut self, detection_ms: u64) {
        self.ticks_completed += 1;
        self.status = TickStatus::Ok { detection_ms };
    }

    pub fn mark_tick_failed(&mut self, status: TickStatus) {
        self.ticks_failed += 1;
        self.status = status;
    }

    pub fn publish_frame(&self) {
        self.frame_tx.send_replace(FrameSnapshot {
            zones: self.zones.zones().to_vec(),
            records: self.zones.records().to_vec(),
            detections: self.detections.clone(),
            occupied_count: self.occupied_count,
            illegal_count: self.illegal_count,
            threshold_secs: self.threshold_secs,
        });
    }

    /// Fresh records and aggregates for every zone, and the running flag raised.
    pub(crate) fn begin_detection(&mut self, now: SystemTime) {
        self.zones.reset_records(now);
        self.detections.clear();
        self.occupied_count = 0;
        self.illegal_count = 0;
        self.running = true;
        self.status = TickStatus::Idle;
        self.publish_frame();
    }

    pub(crate) fn end_detection(&mut self) {
        self.running = false;
        self.status = TickStatus::Idle;
    }

    fn add_zone(
        &mut self,
        a: (i32, i32),
        b: (i32, i32),
        now: SystemTime,
    ) -> Result<(usize, usize), AppError> {
        let added = self.zones.add_zone(a, b, now)?;
        self.publish_frame();
        Ok(added)
    }

    fn clear_zones(&mut self) -> ClearOutcome {
        let outcome = self.zones.clear();
        if let ClearOutcome::Cleared { .. } = outcome {
            self.occupied_count = 0;
            self.illegal_count = 0;
            self.publish_frame();
        }
        outcome
    }
}

/// Shared handle to the engine state.
///
/// Zone edits and ticks both take the tick gate, so a tick never sees the
/// zone list change underneath it.
#[derive(Debug, Clone)]
pub struct Engine {
    state: Arc<RwLock<EngineState>>,
    tick_gate: Arc<Mutex<()>>,
}

impl Engine {
    pub fn new(threshold_secs: u32, interval_ms: u64) -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::new(threshold_secs, interval_ms))),
            tick_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&EngineState) -> T) -> Result<T, AppError> {
        let guard = self.state.read().map_err(|_| AppError::StateLock)?;
        Ok(f(&guard))
    }

    pub fn write<T>(&self, f: impl FnOnce(&mut EngineState) -> T) -> Result<T, AppError> {
        let mut guard = self.state.write().map_err(|_| AppError::StateLock)?;
        Ok(f(&mut guard))
    }

    pub(crate) async fn lock_tick(&self) -> MutexGuard<'_, ()> {
        self.tick_gate.lock().await
    }

    /// Add a zone from two drag corners. Returns `(index, count)`.
    pub async fn add_zone(&self, a: (i32, i32), b: (i32, i32)) -> Result<(usize, usize), AppError> {
        let _gate = self.lock_tick().await;
        let (index, count) = self.write(|state| state.add_zone(a, b, SystemTime::now()))??;
        info!(zone = index + 1, count, "Zone added");
        Ok((index, count))
    }

    pub async fn clear_zones(&self) -> Result<ClearOutcome, AppError> {
        let _gate = self.lock_tick().await;
        let outcome = self.write(EngineState::clear_zones)?;
        match outcome {
            ClearOutcome::Cleared { previous } => info!(previous, "All zones cleared"),
            ClearOutcome::EmptyZoneSet => info!("No zones to clear"),
        }
        Ok(outcome)
    }

    pub fn set_threshold_secs(&self, threshold_secs: u32) -> Result<(), AppError> {
        self.write(|state| state.set_threshold_secs(threshold_secs))?;
        info!(threshold_secs, "Violation threshold updated");
        Ok(())
    }
}
