//! User-drawn rectangular zones and their per-zone occupancy records.
//!
//! A zone's identity is its position in the store. Records are kept
//! index-aligned with zones; clearing the store drops both.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

pub mod persist;

/// Smallest accepted extent, in capture-frame pixels, along either axis.
pub const MIN_ZONE_EXTENT_PX: u32 = 20;

/// Axis-aligned rectangle with `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Zone {
    /// Build a zone from two opposite corners given in any drag direction.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Result<Self, AppError> {
        let zone = Self {
            x1: a.0.min(b.0),
            y1: a.1.min(b.1),
            x2: a.0.max(b.0),
            y2: a.1.max(b.1),
        };
        if zone.width() < MIN_ZONE_EXTENT_PX || zone.height() < MIN_ZONE_EXTENT_PX {
            return Err(AppError::InvalidZone {
                width: zone.width(),
                height: zone.height(),
                min: MIN_ZONE_EXTENT_PX,
            });
        }
        Ok(zone)
    }

    /// Horizontal extent. Widened so corners at the `i32` limits cannot overflow.
    pub fn width(&self) -> u32 {
        self.x2.abs_diff(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.abs_diff(self.y1)
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Occupancy bookkeeping for one zone. `violation_seconds` is zero whenever
/// `occupied` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyRecord {
    pub occupied: bool,
    pub violation_seconds: u32,
    pub last_updated: SystemTime,
}

impl OccupancyRecord {
    pub fn vacant(now: SystemTime) -> Self {
        Self {
            occupied: false,
            violation_seconds: 0,
            last_updated: now,
        }
    }

    pub fn is_violating(&self, threshold_secs: u32) -> bool {
        self.occupied && self.violation_seconds > threshold_secs
    }
}

/// Outcome of [`ZoneStore::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared { previous: usize },
    /// Nothing to clear. Informational only.
    EmptyZoneSet,
}

#[derive(Debug, Default, Clone)]
pub struct ZoneStore {
    zones: Vec<Zone>,
    records: Vec<OccupancyRecord>,
}

impl ZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a zone drawn between two corners. Returns `(index, count)`.
    pub fn add_zone(
        &mut self,
        a: (i32, i32),
        b: (i32, i32),
        now: SystemTime,
    ) -> Result<(usize, usize), AppError> {
        let zone = Zone::from_corners(a, b)?;
        self.zones.push(zone);
        self.records.push(OccupancyRecord::vacant(now));
        Ok((self.zones.len() - 1, self.zones.len()))
    }

    pub fn clear(&mut self) -> ClearOutcome {
        if self.zones.is_empty() {
            return ClearOutcome::EmptyZoneSet;
        }
        let previous = self.zones.len();
        self.zones.clear();
        self.records.clear();
        ClearOutcome::Cleared { previous }
    }

    pub fn count(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn records(&self) -> &[OccupancyRecord] {
        &self.records
    }

    /// Replace the records wholesale with a reconciled set.
    pub fn set_records(&mut self, records: Vec<OccupancyRecord>) {
        self.records = records;
    }

    /// Reset every record to vacant, as done when detection (re)starts.
    pub fn reset_records(&mut self, now: SystemTime) {
        self.records = vec![OccupancyRecord::vacant(now); self.zones.len()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn add_zone_normalizes_drag_direction() -> Result<(), AppError> {
        let mut store = ZoneStore::new();

        let (index, count) = store.add_zone((120, 90), (40, 10), UNIX_EPOCH)?;

        assert_eq!((index, count), (0, 1));
        assert_eq!(
            store.zones()[0],
            Zone {
                x1: 40,
                y1: 10,
                x2: 120,
                y2: 90
            }
        );
        assert_eq!(store.records(), &[OccupancyRecord::vacant(UNIX_EPOCH)]);
        Ok(())
    }

    #[test]
    fn add_zone_rejects_small_rectangles() {
        let mut store = ZoneStore::new();

        let result = store.add_zone((5, 5), (10, 10), UNIX_EPOCH);

        assert!(matches!(
            result,
            Err(AppError::InvalidZone {
                width: 5,
                height: 5,
                ..
            })
        ));
        assert_eq!(store.count(), 0);
        assert!(store.records().is_empty());
    }

    #[test]
    fn add_zone_rejects_when_only_one_axis_is_too_small() {
        let mut store = ZoneStore::new();

        assert!(store.add_zone((0, 0), (100, 19), UNIX_EPOCH).is_err());
        assert!(store.add_zone((0, 0), (20, 20), UNIX_EPOCH).is_ok());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn extreme_corners_do_not_overflow() -> Result<(), AppError> {
        let mut store = ZoneStore::new();

        store.add_zone((i32::MIN, 0), (i32::MAX, 100), UNIX_EPOCH)?;

        let zone = store.zones()[0];
        assert_eq!(zone.width(), u32::MAX);
        assert_eq!(zone.height(), 100);
        assert!(matches!(
            store.add_zone((i32::MAX, i32::MIN), (i32::MAX - 5, i32::MAX), UNIX_EPOCH),
            Err(AppError::InvalidZone {
                width: 5,
                height: u32::MAX,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn clear_reports_previous_count_then_empty_notice() -> Result<(), AppError> {
        let mut store = ZoneStore::new();
        store.add_zone((0, 0), (50, 50), UNIX_EPOCH)?;
        store.add_zone((60, 0), (120, 50), UNIX_EPOCH)?;

        assert_eq!(store.clear(), ClearOutcome::Cleared { previous: 2 });
        assert_eq!(store.count(), 0);
        assert!(store.records().is_empty());
        assert_eq!(store.clear(), ClearOutcome::EmptyZoneSet);
        Ok(())
    }

    #[test]
    fn indices_restart_after_clear() -> Result<(), AppError> {
        let mut store = ZoneStore::new();
        store.add_zone((0, 0), (50, 50), UNIX_EPOCH)?;
        store.clear();

        let (index, count) = store.add_zone((0, 0), (30, 30), UNIX_EPOCH)?;

        assert_eq!((index, count), (0, 1));
        Ok(())
    }
}
